use crate::domain::MediaTarget;
use crate::entities::{blacklist, prelude::*};
use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};

pub use crate::entities::blacklist::Model as BlacklistEntry;

#[derive(Debug, Clone)]
pub struct NewBlacklistEntry {
    pub target: MediaTarget,
    pub source_title: String,
    pub reason: String,
    pub indexer: Option<String>,
}

/// Lowercases and folds every run of non-alphanumerics into one dot, so
/// `The Movie (2020) 1080p` and `the.movie.2020.1080p` compare equal.
#[must_use]
pub fn normalize_release_title(title: &str) -> String {
    let mut normalized = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            normalized.extend(c.to_lowercase());
        } else if !normalized.is_empty() && !normalized.ends_with('.') {
            normalized.push('.');
        }
    }
    normalized.trim_end_matches('.').to_string()
}

pub struct BlacklistRepository {
    conn: DatabaseConnection,
}

impl BlacklistRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn filter_target(query: Select<Blacklist>, target: MediaTarget) -> Select<Blacklist> {
        match target {
            MediaTarget::Movie { movie_id } => {
                query.filter(blacklist::Column::MovieId.eq(movie_id))
            }
            MediaTarget::Episode {
                series_id,
                season_number,
                episode_number,
            } => query
                .filter(blacklist::Column::SeriesId.eq(series_id))
                .filter(blacklist::Column::SeasonNumber.eq(season_number))
                .filter(blacklist::Column::EpisodeNumber.eq(episode_number)),
        }
    }

    pub async fn is_blacklisted(&self, target: MediaTarget, title: &str) -> Result<bool> {
        let count = Self::filter_target(Blacklist::find(), target)
            .filter(blacklist::Column::ReleaseTitle.eq(normalize_release_title(title)))
            .count(&self.conn)
            .await?;

        Ok(count > 0)
    }

    /// Returns `false` when the same release is already blacklisted for the target.
    pub async fn add(&self, entry: NewBlacklistEntry) -> Result<bool> {
        if self
            .is_blacklisted(entry.target, &entry.source_title)
            .await?
        {
            return Ok(false);
        }

        let (movie_id, series_id, season_number, episode_number) = match entry.target {
            MediaTarget::Movie { movie_id } => (Some(movie_id), None, None, None),
            MediaTarget::Episode {
                series_id,
                season_number,
                episode_number,
            } => (None, Some(series_id), Some(season_number), Some(episode_number)),
        };

        let active_model = blacklist::ActiveModel {
            movie_id: Set(movie_id),
            series_id: Set(series_id),
            season_number: Set(season_number),
            episode_number: Set(episode_number),
            release_title: Set(normalize_release_title(&entry.source_title)),
            source_title: Set(entry.source_title),
            reason: Set(entry.reason),
            indexer: Set(entry.indexer),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        Blacklist::insert(active_model)
            .exec_without_returning(&self.conn)
            .await?;

        Ok(true)
    }

    pub async fn list_for_target(&self, target: MediaTarget) -> Result<Vec<BlacklistEntry>> {
        let rows = Self::filter_target(Blacklist::find(), target)
            .order_by_desc(blacklist::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<BlacklistEntry>> {
        let rows = Blacklist::find()
            .order_by_desc(blacklist::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_release_title() {
        assert_eq!(
            normalize_release_title("The Great Movie (2020) [1080p] BluRay"),
            "the.great.movie.2020.1080p.bluray"
        );
        assert_eq!(
            normalize_release_title("The.Great.Movie.2020.1080p.BluRay"),
            "the.great.movie.2020.1080p.bluray"
        );
        assert_eq!(normalize_release_title("  --x264-GRP--  "), "x264.grp");
    }
}
