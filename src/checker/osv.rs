use crate::error::LookupError;
use crate::model::Advisory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const OSV_QUERY_URL: &str = "https://api.osv.dev/v1/query";

/// Patched range npm advisories use when no fixed release exists.
const NO_PATCH: &str = "<0.0.0";

pub struct OsvChecker {
    client: reqwest::Client,
    query_url: String,
}

impl OsvChecker {
    pub fn new() -> Self {
        Self::with_url(OSV_QUERY_URL)
    }

    pub fn with_url(query_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            query_url: query_url.into(),
        }
    }
}

impl Default for OsvChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

#[derive(Deserialize)]
struct OsvQueryResponse {
    #[serde(default)]
    vulns: Vec<OsvVuln>,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
    #[serde(default)]
    references: Vec<OsvReference>,
}

#[derive(Deserialize)]
struct OsvAffected {
    package: Option<OsvAffectedPackage>,
    #[serde(default)]
    ranges: Vec<OsvRange>,
}

#[derive(Deserialize)]
struct OsvAffectedPackage {
    name: String,
}

#[derive(Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Vec<OsvEvent>,
}

#[derive(Deserialize)]
struct OsvEvent {
    fixed: Option<String>,
}

#[derive(Deserialize)]
struct OsvReference {
    #[serde(rename = "type")]
    reference_type: Option<String>,
    url: Option<String>,
}

#[async_trait]
impl super::VulnerabilityChecker for OsvChecker {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn lookup(&self, package: &str, version: &str) -> Result<Vec<Advisory>, LookupError> {
        let query = OsvQuery {
            package: OsvPackage {
                name: package,
                ecosystem: "npm",
            },
            version,
        };

        let response = self
            .client
            .post(&self.query_url)
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::Status {
                status: response.status().as_u16(),
                url: self.query_url.clone(),
            });
        }

        let body: OsvQueryResponse = response.json().await.map_err(|e| LookupError::Decode {
            url: self.query_url.clone(),
            details: e.to_string(),
        })?;

        Ok(body
            .vulns
            .into_iter()
            .map(|vuln| to_advisory(package, vuln))
            .collect())
    }
}

fn to_advisory(package: &str, vuln: OsvVuln) -> Advisory {
    let patched_versions = patched_versions(package, &vuln);
    let url = advisory_url(&vuln);

    Advisory {
        id: vuln.id,
        title: vuln.summary,
        patched_versions,
        url,
        short_url: None,
    }
}

/// Every fixed release for `package`, as an npm range.
fn patched_versions(package: &str, vuln: &OsvVuln) -> String {
    let mut fixed: Vec<&str> = Vec::new();

    for affected in &vuln.affected {
        let other_package = affected
            .package
            .as_ref()
            .map(|p| p.name != package)
            .unwrap_or(false);
        if other_package {
            continue;
        }

        for event in affected.ranges.iter().flat_map(|r| &r.events) {
            if let Some(version) = event.fixed.as_deref() {
                if !fixed.contains(&version) {
                    fixed.push(version);
                }
            }
        }
    }

    if fixed.is_empty() {
        return NO_PATCH.to_string();
    }

    fixed
        .iter()
        .map(|v| format!(">={}", v))
        .collect::<Vec<_>>()
        .join(" || ")
}

fn advisory_url(vuln: &OsvVuln) -> String {
    let advisory = vuln
        .references
        .iter()
        .find(|r| r.reference_type.as_deref() == Some("ADVISORY"))
        .and_then(|r| r.url.clone());

    advisory
        .or_else(|| vuln.references.iter().find_map(|r| r.url.clone()))
        .unwrap_or_else(|| format!("https://osv.dev/vulnerability/{}", vuln.id))
}
