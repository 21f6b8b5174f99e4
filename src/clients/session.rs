use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session cookies keyed by client instance id.
///
/// Cloning shares the underlying map. Two tasks racing to log in for the same
/// client both store a valid cookie; the later one wins.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    inner: Arc<RwLock<HashMap<i32, String>>>,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, client_id: i32) -> Option<String> {
        self.inner.read().await.get(&client_id).cloned()
    }

    pub async fn store(&self, client_id: i32, cookie: String) {
        self.inner.write().await.insert(client_id, cookie);
    }

    pub async fn invalidate(&self, client_id: i32) {
        self.inner.write().await.remove(&client_id);
    }
}
