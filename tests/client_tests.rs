//! Client adapters against local fake servers.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fetcharr::clients::{
    AddRequest, ClientError, ClientSettings, DownloadClient, QBitClient, RemoteState,
    SabnzbdClient, SessionCache,
};
use fetcharr::domain::ClientKind;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn settings(kind: ClientKind, port: u16) -> ClientSettings {
    ClientSettings {
        id: 7,
        name: "fake".to_string(),
        kind,
        host: "127.0.0.1".to_string(),
        port,
        use_tls: false,
        url_base: None,
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        api_key: Some("good".to_string()),
        default_category: None,
        movie_category: None,
        tv_category: None,
        movie_directory: None,
        tv_directory: None,
        priority: 1,
        enabled: true,
        remove_completed: false,
        remove_failed: false,
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[derive(Default)]
struct QbitState {
    logins: AtomicUsize,
    list_calls: AtomicUsize,
    reject_everything: bool,
}

async fn qbit_login(State(state): State<Arc<QbitState>>) -> impl IntoResponse {
    let n = state.logins.fetch_add(1, Ordering::SeqCst) + 1;
    (
        [(header::SET_COOKIE, format!("SID=session{n}; HttpOnly; path=/"))],
        "Ok.",
    )
}

async fn qbit_torrents(State(state): State<Arc<QbitState>>, headers: HeaderMap) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if state.reject_everything || !cookie.starts_with("SID=session") {
        return StatusCode::FORBIDDEN.into_response();
    }

    Json(json!([{
        "hash": "ABCDEF0123456789ABCDEF0123456789ABCDEF01",
        "name": "Movie.2020.1080p.BluRay",
        "state": "stalledDL",
        "progress": 0.5,
        "size": 1000,
        "amount_left": 500,
        "num_seeds": 0,
        "save_path": "/data/torrents/movies",
        "category": "movies",
        "content_path": "/data/torrents/movies/Movie.2020.1080p.BluRay",
        "added_on": 1_700_000_000
    }]))
    .into_response()
}

async fn qbit_server(reject_everything: bool) -> (SocketAddr, Arc<QbitState>) {
    let state = Arc::new(QbitState {
        reject_everything,
        ..Default::default()
    });
    let app = Router::new()
        .route("/api/v2/auth/login", post(qbit_login))
        .route("/api/v2/torrents/info", get(qbit_torrents))
        .with_state(Arc::clone(&state));
    (serve(app).await, state)
}

#[tokio::test]
async fn test_qbit_stale_session_relogs_once() {
    let (addr, state) = qbit_server(false).await;
    let sessions = SessionCache::new();
    sessions.store(7, "SID=stale".to_string()).await;

    let client = QBitClient::new(settings(ClientKind::Torrent, addr.port()), sessions.clone())
        .unwrap();
    let items = client.list_active().await.unwrap();

    assert_eq!(state.logins.load(Ordering::SeqCst), 1);
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(sessions.get(7).await.as_deref(), Some("SID=session1"));

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.remote_id, "abcdef0123456789abcdef0123456789abcdef01");
    assert_eq!(item.client_id, 7);
    assert_eq!(item.state, RemoteState::Stalled);
    assert!((item.progress - 50.0).abs() < f64::EPSILON);
    assert_eq!(item.seeds, Some(0));
    assert_eq!(
        item.reported_path(),
        Some("/data/torrents/movies/Movie.2020.1080p.BluRay")
    );
}

#[tokio::test]
async fn test_qbit_persistent_forbidden_surfaces_auth_error() {
    let (addr, state) = qbit_server(true).await;
    let client =
        QBitClient::new(settings(ClientKind::Torrent, addr.port()), SessionCache::new()).unwrap();

    let err = client.list_active().await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(_)), "{err}");
    // Initial login, then exactly one re-login.
    assert_eq!(state.logins.load(Ordering::SeqCst), 2);
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refused_connection_is_classified() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = QBitClient::new(settings(ClientKind::Torrent, port), SessionCache::new()).unwrap();
    let err = client.test_connection().await.unwrap_err();
    assert!(
        matches!(err, ClientError::ConnectionRefused { .. }),
        "unexpected error: {err}"
    );
    assert!(err.is_transient());
}

async fn sab_api(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    if params.get("apikey").map(String::as_str) != Some("good") {
        return Json(json!({ "status": false, "error": "API Key Incorrect" }));
    }

    let body = match params.get("mode").map(String::as_str) {
        Some("version") => json!({ "version": "4.3.2" }),
        Some("queue") => json!({ "queue": { "slots": [
            {
                "nzo_id": "SABnzbd_nzo_1",
                "filename": "Show.S01E01.720p",
                "status": "Downloading",
                "percentage": "40",
                "mb": "100",
                "mbleft": "60",
                "cat": "tv"
            },
            {
                "nzo_id": "SABnzbd_nzo_2",
                "filename": "Movie.2020.1080p",
                "status": "Extracting",
                "percentage": "100",
                "cat": "*"
            }
        ]}}),
        Some("history") => json!({ "history": { "slots": [
            {
                "nzo_id": "SABnzbd_nzo_2",
                "name": "Movie.2020.1080p",
                "status": "Completed",
                "storage": "/downloads/complete/movies/Movie.2020.1080p",
                "category": "movies",
                "bytes": "1048576"
            },
            {
                "nzo_id": "SABnzbd_nzo_3",
                "name": "Broken.Release",
                "status": "Failed",
                "fail_message": "Repair failed, not enough repair blocks"
            }
        ]}}),
        Some("addurl") => json!({ "status": true, "nzo_ids": ["SABnzbd_nzo_9"] }),
        _ => json!({ "status": true }),
    };
    Json(body)
}

async fn sab_server() -> SocketAddr {
    serve(Router::new().route("/api", get(sab_api))).await
}

#[tokio::test]
async fn test_sabnzbd_history_overrides_queue() {
    let addr = sab_server().await;
    let client = SabnzbdClient::new(settings(ClientKind::Usenet, addr.port())).unwrap();

    let items = client.list_active().await.unwrap();
    assert_eq!(items.len(), 3);

    let by_id = |id: &str| items.iter().find(|i| i.remote_id == id).unwrap();

    let downloading = by_id("SABnzbd_nzo_1");
    assert_eq!(downloading.state, RemoteState::Downloading);
    assert!((downloading.progress - 40.0).abs() < f64::EPSILON);
    assert_eq!(downloading.category.as_deref(), Some("tv"));

    let finished = by_id("SABnzbd_nzo_2");
    assert_eq!(finished.state, RemoteState::Completed);
    assert!(finished.is_complete());
    assert_eq!(
        finished.reported_path(),
        Some("/downloads/complete/movies/Movie.2020.1080p")
    );

    let failed = by_id("SABnzbd_nzo_3");
    assert_eq!(
        failed.state,
        RemoteState::Failed("Repair failed, not enough repair blocks".to_string())
    );
}

#[tokio::test]
async fn test_sabnzbd_bad_api_key_is_auth_error() {
    let addr = sab_server().await;
    let mut s = settings(ClientKind::Usenet, addr.port());
    s.api_key = Some("wrong".to_string());
    let client = SabnzbdClient::new(s).unwrap();

    let err = client.test_connection().await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(_)), "{err}");
    assert!(!err.to_string().contains("wrong"));
}

#[tokio::test]
async fn test_sabnzbd_add_returns_job_id() {
    let addr = sab_server().await;
    let client = SabnzbdClient::new(settings(ClientKind::Usenet, addr.port())).unwrap();

    assert_eq!(client.test_connection().await.unwrap(), "4.3.2");

    let result = client
        .add(&AddRequest {
            url: "https://indexer.example/get/123.nzb".to_string(),
            category: None,
            save_path: None,
            title: Some("Movie.2020.1080p".to_string()),
        })
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.remote_id.as_deref(), Some("SABnzbd_nzo_9"));
}
