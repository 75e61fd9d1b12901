//! File-based caching for registry metadata.
//!
//! Registry documents for popular packages are large and change rarely, so
//! the reduced form the walker needs is cached on disk with a TTL.
//!
//! # Cache Location
//!
//! - Linux: `~/.cache/depaudit/`
//! - macOS: `~/Library/Caches/depaudit/`
//! - Windows: `%LOCALAPPDATA%\depaudit\`
//!
//! # Example
//!
//! ```no_run
//! use depaudit::Cache;
//!
//! let cache = Cache::new();
//! cache.set("my_key", &"cached value".to_string()).unwrap();
//!
//! let value: Option<String> = cache.get("my_key");
//! assert_eq!(value, Some("cached value".to_string()));
//! ```

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Default cache TTL in hours.
const CACHE_TTL_HOURS: u64 = 24;

/// Returns the platform cache directory for depaudit.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depaudit")
}

/// A file-based cache with TTL support.
///
/// Values are stored as JSON files in the cache directory. Each entry
/// expires after the configured TTL period.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Creates a cache in the platform directory with the default 24-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl_hours(CACHE_TTL_HOURS)
    }

    /// Creates a cache in the platform directory with a custom TTL.
    ///
    /// ```
    /// use depaudit::Cache;
    ///
    /// let cache = Cache::with_ttl_hours(1);
    /// ```
    pub fn with_ttl_hours(hours: u64) -> Self {
        Self::in_dir(cache_dir(), Duration::from_secs(hours * 3600))
    }

    /// Creates a cache rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Converts a cache key to a safe filename.
    fn cache_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe_key))
    }

    /// Retrieves a value from the cache.
    ///
    /// Returns `None` if the key doesn't exist, has expired, or no longer
    /// deserializes into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.cache_path(key);

        if !path.exists() {
            return None;
        }

        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            if let Ok(elapsed) = SystemTime::now().duration_since(modified) {
                if elapsed > self.ttl {
                    debug!("Cache entry {} expired", key);
                    let _ = fs::remove_file(&path);
                    return None;
                }
            }
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Stores a value in the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or
    /// the file cannot be written.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.ensure_dir()?;
        let path = self.cache_path(key);
        let content = serde_json::to_string(value)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Removes all cached entries.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)?.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let _ = fs::remove_file(path);
                }
            }
        }
        Ok(())
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
