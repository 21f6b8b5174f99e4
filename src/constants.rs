pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "webm", "mov", "wmv", "flv", "m4v", "ts", "m2ts", "mpg", "mpeg",
];

/// Files above this size keep a source folder alive during post-import cleanup.
pub const TRIVIAL_FILE_MAX_BYTES: u64 = 50 * 1024 * 1024;

pub mod intervals {
    use std::time::Duration;

    pub const RECONCILE: Duration = Duration::from_secs(60);

    pub const STARTUP_DELAY: Duration = Duration::from_secs(10);

    pub const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

pub mod categories {
    pub const TORRENT_MOVIES: &str = "movies";

    pub const TORRENT_TV: &str = "tv";
}

pub mod matching {
    /// Shorter tokens are ignored by the title matcher.
    pub const MIN_TOKEN_LEN: usize = 3;

    pub const MAX_REQUIRED_TOKENS: usize = 3;

    pub const REQUIRED_TOKEN_RATIO: f64 = 0.6;
}

pub mod limits {
    pub const DEFAULT_BLACKLIST_LIMIT: u64 = 25;

    pub const MAX_ERROR_BODY_CHARS: usize = 500;
}
