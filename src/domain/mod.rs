//! Domain types for the download lifecycle.
//!
//! Persistence rows are converted into these types at the repository boundary so
//! the reconciliation loop never sees a half-specified target.

pub mod events;

pub use crate::entities::download_clients::ClientKind;
pub use crate::entities::downloads::{DownloadStatus, MediaType};

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a download is meant to fill in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaTarget {
    Movie {
        movie_id: i32,
    },
    Episode {
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    },
}

impl MediaTarget {
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::Movie { .. } => MediaType::Movie,
            Self::Episode { .. } => MediaType::Tv,
        }
    }

    /// Rebuilds a target from the nullable storage columns, rejecting rows
    /// whose columns disagree with their media type.
    #[must_use]
    pub fn from_columns(
        media_type: MediaType,
        movie_id: Option<i32>,
        series_id: Option<i32>,
        season_number: Option<i32>,
        episode_number: Option<i32>,
    ) -> Option<Self> {
        match (media_type, movie_id, series_id, season_number, episode_number) {
            (MediaType::Movie, Some(movie_id), None, None, None) => Some(Self::Movie { movie_id }),
            (MediaType::Tv, None, Some(series_id), Some(season_number), Some(episode_number)) => {
                Some(Self::Episode {
                    series_id,
                    season_number,
                    episode_number,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for MediaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie { movie_id } => write!(f, "movie #{movie_id}"),
            Self::Episode {
                series_id,
                season_number,
                episode_number,
            } => write!(
                f,
                "series #{series_id} S{season_number:02}E{episode_number:02}"
            ),
        }
    }
}

impl DownloadStatus {
    /// Statuses the reconciliation loop still has to look at.
    pub const ACTIVE: [Self; 3] = [Self::Queued, Self::Downloading, Self::Importing];

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Downloading | Self::Importing)
    }

    /// Forward-only lifecycle. `Importing -> Importing` is accepted so an import
    /// interrupted by a crash can be re-entered.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Queued,
                Self::Downloading | Self::Importing | Self::Failed
            ) | (Self::Downloading, Self::Importing | Self::Failed)
                | (Self::Importing, Self::Importing | Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClientKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Torrent => "torrent",
            Self::Usenet => "usenet",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One acquisition attempt as seen by the reconciliation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub id: i32,
    pub target: MediaTarget,
    pub title: String,
    pub download_url: String,
    pub size: Option<i64>,
    pub seeders: Option<i32>,
    pub indexer: Option<String>,
    pub quality: Option<String>,
    pub status: DownloadStatus,
    pub progress: f64,
    pub remote_id: Option<String>,
    pub client_id: Option<i32>,
    pub save_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Download {
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.target.media_type()
    }
}

/// How to treat a proper/repack of the quality already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProperPreference {
    #[default]
    PreferAndUpgrade,
    DoNotUpgrade,
    DoNotPrefer,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("download {id}: invalid status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub id: i32,
    pub from: DownloadStatus,
    pub to: DownloadStatus,
}
