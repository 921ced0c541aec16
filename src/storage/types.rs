use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::Headers;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by a [`super::Repository`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt subscriptions file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not find feed {0}")]
    NotFound(String),

    /// SEC-008: Content names must be a single plain file name.
    #[error("Invalid content file name: {0}")]
    InvalidContentName(String),
}

// ============================================================================
// Records
// ============================================================================

/// A feed the user is subscribed to.
///
/// Field names serialize in the layout of `feeds.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// UUID identifying the subscription
    pub id: String,
    pub title: String,
    pub url: String,
    /// File holding the most recently fetched copy of the feed
    pub read_from: String,
    /// Validators from the last successful fetch, replayed when polling
    #[serde(default)]
    pub last_fetch: LastFetch,
}

/// HTTP caching validators captured from a feed response.
///
/// Empty strings mean the server did not send the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastFetch {
    #[serde(rename = "Last-Modified", default)]
    pub last_modified: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
}

impl LastFetch {
    /// Captures validators from lower-cased response headers.
    pub fn from_headers(headers: &Headers) -> Self {
        Self {
            last_modified: headers.get("last-modified").cloned().unwrap_or_default(),
            etag: headers.get("etag").cloned().unwrap_or_default(),
        }
    }
}
