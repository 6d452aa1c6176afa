//! Error types for map initialization and track loading.
//!
//! Cancellation is not an error and has no variant here: an aborted archive
//! load simply yields nothing.

use thiserror::Error;

/// Errors produced while loading tracks and posts.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("corrupt lowres track archive: track {track_number} expects '{expected}', archive has '{found}'")]
    CorruptArchive {
        track_number: usize,
        expected: String,
        found: String,
    },

    #[error("corrupt lowres track archive: no entry for track {track_number} ({entries} entries)")]
    MissingArchiveEntry { track_number: usize, entries: usize },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("invalid GPX: {0}")]
    Gpx(String),

    #[error("route '{0}' has no points")]
    EmptyRoute(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("invalid post {anchor}: {reason}")]
    InvalidPost { anchor: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for map operations.
pub type Result<T> = std::result::Result<T, MapError>;
