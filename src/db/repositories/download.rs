use crate::domain::{Download, DownloadStatus, InvalidTransition, MediaTarget};
use crate::entities::{downloads, prelude::*};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::warn;

/// Fields supplied by whoever hands a release to a client.
#[derive(Debug, Clone)]
pub struct NewDownload {
    pub target: MediaTarget,
    pub title: String,
    pub download_url: String,
    pub size: Option<i64>,
    pub seeders: Option<i32>,
    pub indexer: Option<String>,
    pub quality: Option<String>,
    pub remote_id: Option<String>,
    pub client_id: Option<i32>,
    pub save_path: Option<String>,
}

pub struct DownloadRepository {
    conn: DatabaseConnection,
}

impl DownloadRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: downloads::Model) -> Option<Download> {
        let Some(target) = MediaTarget::from_columns(
            m.media_type,
            m.movie_id,
            m.series_id,
            m.season_number,
            m.episode_number,
        ) else {
            warn!(download_id = m.id, "Download row has an inconsistent target, skipping");
            return None;
        };

        Some(Download {
            id: m.id,
            target,
            title: m.title,
            download_url: m.download_url,
            size: m.size,
            seeders: m.seeders,
            indexer: m.indexer,
            quality: m.quality,
            status: m.status,
            progress: m.progress,
            remote_id: m.remote_id,
            client_id: m.client_id,
            save_path: m.save_path,
            error_message: m.error_message,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub async fn create(&self, new: NewDownload) -> Result<Download> {
        let (movie_id, series_id, season_number, episode_number) = match new.target {
            MediaTarget::Movie { movie_id } => (Some(movie_id), None, None, None),
            MediaTarget::Episode {
                series_id,
                season_number,
                episode_number,
            } => (None, Some(series_id), Some(season_number), Some(episode_number)),
        };
        let now = Self::now();

        let active_model = downloads::ActiveModel {
            media_type: Set(new.target.media_type()),
            movie_id: Set(movie_id),
            series_id: Set(series_id),
            season_number: Set(season_number),
            episode_number: Set(episode_number),
            title: Set(new.title),
            download_url: Set(new.download_url),
            size: Set(new.size),
            seeders: Set(new.seeders),
            indexer: Set(new.indexer),
            quality: Set(new.quality),
            status: Set(DownloadStatus::Queued),
            progress: Set(0.0),
            remote_id: Set(new.remote_id),
            client_id: Set(new.client_id),
            save_path: Set(new.save_path),
            error_message: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = Downloads::insert(active_model).exec(&self.conn).await?;
        self.get(result.last_insert_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Download vanished right after insert"))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Download>> {
        let row = Downloads::find_by_id(id).one(&self.conn).await?;
        Ok(row.and_then(Self::map_model))
    }

    pub async fn list_active(&self) -> Result<Vec<Download>> {
        let rows = Downloads::find()
            .filter(downloads::Column::Status.is_in(DownloadStatus::ACTIVE))
            .order_by_asc(downloads::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().filter_map(Self::map_model).collect())
    }

    /// Remote ids held by any recorded download, whatever its status.
    pub async fn claimed_remote_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<Option<String>> = Downloads::find()
            .select_only()
            .column(downloads::Column::RemoteId)
            .filter(downloads::Column::RemoteId.is_not_null())
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(ids.into_iter().flatten().collect())
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<Download>> {
        let rows = Downloads::find()
            .order_by_desc(downloads::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().filter_map(Self::map_model).collect())
    }

    /// Records the remote identity of an unmatched download. A remote id that
    /// is already set is left untouched.
    pub async fn set_remote(&self, id: i32, remote_id: &str, client_id: i32) -> Result<bool> {
        let result = Downloads::update_many()
            .col_expr(downloads::Column::RemoteId, Expr::value(remote_id))
            .col_expr(downloads::Column::ClientId, Expr::value(client_id))
            .col_expr(downloads::Column::UpdatedAt, Expr::value(Self::now()))
            .filter(downloads::Column::Id.eq(id))
            .filter(downloads::Column::RemoteId.is_null())
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Moves a download from `from` to `to`. Returns `false` when the row is
    /// gone or no longer in `from`.
    pub async fn transition(
        &self,
        id: i32,
        from: DownloadStatus,
        to: DownloadStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { id, from, to }.into());
        }

        let mut update = Downloads::update_many()
            .col_expr(downloads::Column::Status, Expr::value(to.as_str()))
            .col_expr(downloads::Column::UpdatedAt, Expr::value(Self::now()));

        if let Some(message) = error_message {
            update = update.col_expr(downloads::Column::ErrorMessage, Expr::value(message));
        }
        if to == DownloadStatus::Completed {
            update = update.col_expr(downloads::Column::Progress, Expr::value(100.0));
        }

        let result = update
            .filter(downloads::Column::Id.eq(id))
            .filter(downloads::Column::Status.eq(from))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Updates progress and, when `next` differs from `current`, the status.
    pub async fn update_progress(
        &self,
        id: i32,
        current: DownloadStatus,
        next: DownloadStatus,
        progress: f64,
    ) -> Result<bool> {
        if current != next && !current.can_transition_to(next) {
            return Err(InvalidTransition {
                id,
                from: current,
                to: next,
            }
            .into());
        }

        let result = Downloads::update_many()
            .col_expr(downloads::Column::Progress, Expr::value(progress.clamp(0.0, 100.0)))
            .col_expr(downloads::Column::Status, Expr::value(next.as_str()))
            .col_expr(downloads::Column::UpdatedAt, Expr::value(Self::now()))
            .filter(downloads::Column::Id.eq(id))
            .filter(downloads::Column::Status.eq(current))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Downloads::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
