pub mod activity;
pub use activity::ActivityLog;

pub mod downloads;
pub use downloads::{DownloadError, DownloadService, GrabRequest};

pub mod failure;
pub use failure::{FailureHandler, FailureStage};

pub mod import;
pub use import::{ImportError, ImportPipeline, ImportSummary, ImportedFile};

pub mod matcher;
pub use matcher::{TitleMatcher, TokenMatcher};

pub mod media;
pub use media::{FfprobeProbe, MediaProbe};

pub mod monitor;
pub use monitor::Monitor;

pub mod monitoring;
pub use monitoring::{MonitorTree, UnmonitorOutcome};

pub mod reconcile;
pub use reconcile::{CycleReport, Reconciler};

pub mod search;
pub use search::{NoSearch, SearchCollaborator};
