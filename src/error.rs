//! Error types.
//!
//! Two families exist. [`AuditError`] covers loading a manifest and is the
//! only error that surfaces in an audit result. [`LookupError`] covers the
//! registry and vulnerability source; the walker logs and absorbs it so that
//! a partial outage degrades to missing data instead of a failed audit.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to load a manifest file.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Can't load {}: file not found", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("Can't read {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't parse {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a single registry or advisory lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{name} not found")]
    NotFound { name: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("malformed response from {url}: {details}")]
    Decode { url: String, details: String },

    #[error("{what} timed out after {}s", after.as_secs())]
    TimedOut { what: String, after: Duration },
}

impl LookupError {
    /// Missing data is expected for unpublished or private packages and is not
    /// worth a warning.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}
