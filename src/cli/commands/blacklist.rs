use crate::config::Config;
use crate::db::Store;

pub async fn cmd_blacklist(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let entries = store.recent_blacklist(limit).await?;

    if entries.is_empty() {
        println!("Blacklist is empty.");
        return Ok(());
    }

    println!("Blacklisted Releases (last {}):", entries.len());
    println!("{:-<70}", "");

    for entry in entries {
        let target = match (entry.movie_id, entry.series_id) {
            (Some(movie_id), _) => format!("movie #{movie_id}"),
            (None, Some(series_id)) => format!(
                "series #{series_id} S{:02}E{:02}",
                entry.season_number.unwrap_or_default(),
                entry.episode_number.unwrap_or_default()
            ),
            (None, None) => "unknown".to_string(),
        };
        println!("• {} ({target})", entry.source_title);
        println!(
            "  Reason: {} | Indexer: {} | {}",
            entry.reason,
            entry.indexer.as_deref().unwrap_or("-"),
            entry.created_at
        );
    }

    Ok(())
}
