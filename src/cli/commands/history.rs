use crate::config::Config;
use crate::db::Store;

pub async fn cmd_history(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let downloads = store.recent_downloads(limit).await?;

    if downloads.is_empty() {
        println!("No download history.");
        return Ok(());
    }

    println!("Recent Downloads (last {}):", downloads.len());
    println!("{:-<70}", "");

    for dl in downloads {
        println!("• [{}] {} ({})", dl.id, dl.title, dl.target);
        println!(
            "  Status: {} | Progress: {:.1}% | {}",
            dl.status, dl.progress, dl.updated_at
        );
        if let Some(error) = dl.error_message.as_deref() {
            println!("  Error: {error}");
        }
    }

    Ok(())
}
