//! Configuration file handling.
//!
//! # Configuration Location
//!
//! - Linux: `~/.config/depaudit/config.toml`
//! - macOS: `~/Library/Application Support/depaudit/config.toml`
//! - Windows: `%APPDATA%\depaudit\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! registry_url = "https://registry.npmjs.org"
//! advisory_url = "https://api.osv.dev/v1/query"
//! request_timeout_secs = 30
//! cache_ttl_hours = 24
//! use_cache = true
//! max_depth = 64
//! max_concurrent_requests = 16
//! files = ["package.json", "packages/api/package.json"]
//! fail_behavior = "warn"
//! default_format = "table"
//!
//! [ignore]
//! packages = ["@types/*"]
//! advisories = ["GHSA-29mw-wpgm-hmr9"]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::audit::{AuditOptions, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_DEPTH};
use crate::checker::OSV_QUERY_URL;
use crate::model::{AuditReport, Finding};
use crate::registry::NPM_REGISTRY_URL;

/// What to do when an audit finds vulnerable packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailBehavior {
    /// Exit with a non-zero status.
    Fail,
    /// Print a warning and exit successfully.
    Warn,
}

impl FailBehavior {
    /// An explicit choice wins. Otherwise a single file fails hard and a batch
    /// of files only warns.
    pub fn resolve(explicit: Option<FailBehavior>, file_count: usize) -> FailBehavior {
        match explicit {
            Some(behavior) => behavior,
            None if file_count == 1 => FailBehavior::Fail,
            None => FailBehavior::Warn,
        }
    }
}

/// Application configuration.
///
/// ```no_run
/// use depaudit::Config;
///
/// let config = Config::load().unwrap();
/// println!("Registry: {}", config.registry_url);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of an npm-compatible registry.
    pub registry_url: String,

    /// OSV query endpoint used for advisories.
    pub advisory_url: String,

    /// Deadline for each registry or advisory request.
    ///
    /// Default: 30 seconds
    pub request_timeout_secs: u64,

    /// How long registry metadata stays cached, in hours.
    ///
    /// Default: 24 hours
    pub cache_ttl_hours: u64,

    /// Whether registry metadata is cached on disk at all.
    pub use_cache: bool,

    /// How many levels below the root manifest are expanded.
    pub max_depth: usize,

    /// Registry and advisory requests allowed in flight at once.
    ///
    /// Default: 16
    pub max_concurrent_requests: usize,

    /// Manifests to audit when none are given on the command line.
    pub files: Vec<PathBuf>,

    /// Overrides the default fail/warn policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_behavior: Option<FailBehavior>,

    /// Valid values: "table", "json"
    pub default_format: String,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Findings to leave out of reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names, `*` acts as a wildcard (e.g. "@types/*").
    pub packages: Vec<String>,

    /// Advisory ids (e.g. "GHSA-xxxx-xxxx-xxxx", "CVE-2021-12345").
    pub advisories: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    pub fn should_ignore_advisory(&self, id: &str) -> bool {
        self.advisories.iter().any(|ignored| ignored == id)
    }

    pub fn should_ignore(&self, finding: &Finding) -> bool {
        self.should_ignore_package(&finding.name) || self.should_ignore_advisory(&finding.advisory.id)
    }

    /// Drops ignored findings from a report.
    pub fn apply(&self, report: &mut AuditReport) {
        report.findings.retain(|finding| !self.should_ignore(finding));
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: NPM_REGISTRY_URL.to_string(),
            advisory_url: OSV_QUERY_URL.to_string(),
            request_timeout_secs: 30,
            cache_ttl_hours: 24,
            use_cache: true,
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            files: Vec::new(),
            fail_behavior: None,
            default_format: "table".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file, or defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Writes the config file, creating its directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depaudit")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_depth: self.max_depth,
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }

    /// Files named on the command line, else the configured list, else
    /// `package.json` in the working directory.
    pub fn manifest_files(&self, from_cli: Vec<PathBuf>) -> Vec<PathBuf> {
        if !from_cli.is_empty() {
            from_cli
        } else if !self.files.is_empty() {
            self.files.clone()
        } else {
            vec![PathBuf::from("package.json")]
        }
    }
}
