use crate::services::DownloadError;
use crate::state::SharedState;

pub async fn cmd_cancel(state: &SharedState, id: i32, delete_files: bool) -> anyhow::Result<()> {
    match state.downloads.cancel(id, delete_files).await {
        Ok(download) => {
            println!("✓ Cancelled download {id}: {}", download.title);
            Ok(())
        }
        Err(DownloadError::NotFound(_)) => {
            println!("Download {id} not found.");
            println!("Use 'fetcharr history' to see IDs");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
