use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A vulnerability record as returned by an advisory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Range of versions that are not affected, e.g. `>=4.17.21`.
    pub patched_versions: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
}

impl Advisory {
    /// The link to show a user: the short form when one is known.
    pub fn link(&self) -> &str {
        self.short_url.as_deref().unwrap_or(&self.url)
    }
}

/// A vulnerable package found during an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    pub version: String,
    pub advisory: Advisory,
    /// Ancestors from the audit root down to this package, oldest first.
    /// The root itself is not included, so a direct dependency has an empty
    /// chain.
    pub dependency_of: Vec<String>,
}

impl Finding {
    pub fn dependency_path(&self) -> String {
        self.dependency_of.join(" > ")
    }
}

/// Findings for one manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub file: PathBuf,
    pub package: String,
    pub findings: Vec<Finding>,
    pub audited_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn new(file: impl Into<PathBuf>, package: impl Into<String>, findings: Vec<Finding>) -> Self {
        Self {
            file: file.into(),
            package: package.into(),
            findings,
            audited_at: Utc::now(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}
