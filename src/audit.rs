//! Recursive dependency audit.
//!
//! [`Auditor`] expands a manifest's dependency tree against a
//! [`RegistryClient`], checks every resolved package with a
//! [`VulnerabilityChecker`], and returns one [`Finding`] per vulnerable
//! package per path it was reached through.
//!
//! Sibling dependencies are checked concurrently and each branch returns its
//! own findings, which the parent concatenates once every branch is done.
//! Lookup failures are logged and treated as missing data: one unreachable
//! package never aborts the rest of the audit.
//!
//! # Example
//!
//! ```no_run
//! use depaudit::{Auditor, Manifest, NpmRegistry, OsvChecker};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(NpmRegistry::new("https://registry.npmjs.org")?);
//!     let auditor = Auditor::new(registry, Arc::new(OsvChecker::new()));
//!
//!     let manifest = Manifest::new("my-app").with_dependency("lodash", "4.17.15");
//!     for finding in auditor.audit_manifest(&manifest).await {
//!         println!("{}@{}: {}", finding.name, finding.version, finding.advisory.id);
//!     }
//!     Ok(())
//! }
//! ```

use crate::ancestry::AncestryIndex;
use crate::checker::VulnerabilityChecker;
use crate::error::{AuditError, LookupError};
use crate::model::{AuditReport, Finding, Manifest, ResolvedDependency};
use crate::registry::RegistryClient;
use crate::resolver::resolve_version;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default deadline for a single registry or advisory request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on how many levels below the root are expanded.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default limit on registry and advisory requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOptions {
    pub timeout: Duration,
    pub max_depth: usize,
    /// Shared by every branch of every file being audited. Values below 1
    /// are treated as 1.
    pub max_concurrent_requests: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Outcome of auditing one manifest file.
#[derive(Debug)]
pub struct FileAudit {
    pub file: PathBuf,
    pub outcome: Result<AuditReport, AuditError>,
}

/// State for one root manifest. Never shared between roots, so concurrent
/// audits of different files cannot see each other's ancestry.
struct AuditRun {
    root: String,
    ancestry: AncestryIndex,
}

/// A resolved package on the current expansion path.
type PathEntry = (String, String);

pub struct Auditor {
    registry: Arc<dyn RegistryClient>,
    checker: Arc<dyn VulnerabilityChecker>,
    options: AuditOptions,
    limiter: Arc<Semaphore>,
}

impl Auditor {
    pub fn new(registry: Arc<dyn RegistryClient>, checker: Arc<dyn VulnerabilityChecker>) -> Self {
        let options = AuditOptions::default();
        Self {
            registry,
            checker,
            limiter: request_limiter(&options),
            options,
        }
    }

    pub fn with_options(mut self, options: AuditOptions) -> Self {
        self.limiter = request_limiter(&options);
        self.options = options;
        self
    }

    pub fn options(&self) -> AuditOptions {
        self.options
    }

    /// Audits every file concurrently. Results come back in input order.
    pub async fn audit_files(&self, files: &[PathBuf]) -> Vec<FileAudit> {
        let audits = files.iter().map(|file| async move {
            FileAudit {
                file: file.clone(),
                outcome: self.audit_file(file).await,
            }
        });
        join_all(audits).await
    }

    /// Loads a `package.json` and audits it.
    ///
    /// # Errors
    ///
    /// Only manifest loading can fail; lookup failures during the walk are
    /// absorbed.
    pub async fn audit_file(&self, file: &Path) -> Result<AuditReport, AuditError> {
        let manifest = Manifest::load(file)?;
        let findings = self.audit_manifest(&manifest).await;
        Ok(AuditReport::new(file, manifest.name, findings))
    }

    /// Audits a manifest and all of its transitive dependencies.
    ///
    /// The order of the returned findings is unspecified.
    pub async fn audit_manifest(&self, manifest: &Manifest) -> Vec<Finding> {
        info!(
            "Auditing {} ({} direct dependencies)",
            display_name(&manifest.name),
            manifest.dependencies.len()
        );

        let run = AuditRun {
            root: manifest.name.clone(),
            ancestry: AncestryIndex::new(),
        };
        let findings = self.walk(&run, manifest, Vec::new()).await;

        info!(
            "Found {} vulnerable packages under {}",
            findings.len(),
            display_name(&manifest.name)
        );
        findings
    }

    fn walk<'a>(
        &'a self,
        run: &'a AuditRun,
        manifest: &'a Manifest,
        path: Vec<PathEntry>,
    ) -> BoxFuture<'a, Vec<Finding>> {
        async move {
            if manifest.dependencies.is_empty() {
                return Vec::new();
            }

            let branches = manifest
                .dependencies
                .iter()
                .map(|(name, range)| self.check_dependency(run, &manifest.name, name, range, &path));

            join_all(branches).await.into_iter().flatten().collect()
        }
        .boxed()
    }

    async fn check_dependency(
        &self,
        run: &AuditRun,
        parent: &str,
        name: &str,
        range: &str,
        path: &[PathEntry],
    ) -> Vec<Finding> {
        run.ancestry.record_parent(name, parent);

        let published = match self
            .deadline(format!("registry lookup for {}", name), self.registry.versions(name))
            .await
        {
            Ok(published) => published,
            Err(e) => {
                absorb(&format!("{} ({})", name, self.registry.name()), &e);
                return Vec::new();
            }
        };

        let Some(version) = resolve_version(&published, range) else {
            debug!("No published version of {} satisfies '{}'", name, range);
            return Vec::new();
        };

        let advisory_lookup = self.deadline(
            format!("advisory lookup for {}@{}", name, version),
            self.checker.lookup(name, &version),
        );

        // A package already on its own path is still checked, never expanded.
        let (advisories, dependencies) = if path.iter().any(|(n, v)| n == name && *v == version) {
            debug!("{}@{} is its own ancestor; not expanding again", name, version);
            (advisory_lookup.await, None)
        } else {
            let (advisories, dependencies) = tokio::join!(
                advisory_lookup,
                self.deadline(
                    format!("dependency lookup for {}@{}", name, version),
                    self.registry.dependencies(name, &version),
                ),
            );
            (advisories, Some(dependencies))
        };

        let mut findings = Vec::new();

        match advisories {
            Ok(advisories) => {
                // One finding per package even when several advisories apply.
                if let Some(advisory) = advisories.into_iter().next() {
                    debug!("{}@{} is vulnerable: {}", name, version, advisory.id);
                    findings.push(Finding {
                        name: name.to_string(),
                        version: version.clone(),
                        advisory,
                        dependency_of: run.ancestry.resolve_chain(name, &run.root),
                    });
                }
            }
            Err(e) => absorb(&format!("{}@{} ({})", name, version, self.checker.name()), &e),
        }

        let dependencies = match dependencies {
            Some(Ok(dependencies)) => Some(dependencies),
            Some(Err(e)) => {
                absorb(&format!("{}@{} ({})", name, version, self.registry.name()), &e);
                None
            }
            None => None,
        };

        let resolved = ResolvedDependency {
            name: name.to_string(),
            version: Some(version),
            dependencies,
        };
        let Some(nested) = resolved.nested_manifest() else {
            return findings;
        };

        if path.len() >= self.options.max_depth {
            warn!(
                "Not expanding {}: depth limit of {} reached",
                name, self.options.max_depth
            );
            return findings;
        }

        let mut child_path = path.to_vec();
        child_path.push((resolved.name, resolved.version.unwrap_or_default()));

        findings.extend(self.walk(run, &nested, child_path).await);
        findings
    }

    /// Runs one external call under the request limit and the deadline.
    /// Waiting for a permit does not count against the deadline.
    async fn deadline<T>(
        &self,
        what: String,
        call: impl Future<Output = Result<T, LookupError>>,
    ) -> Result<T, LookupError> {
        // The semaphore is never closed, so a permit always arrives.
        let _permit = self.limiter.acquire().await.ok();

        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::TimedOut {
                what,
                after: self.options.timeout,
            }),
        }
    }
}

fn request_limiter(options: &AuditOptions) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(options.max_concurrent_requests.max(1)))
}

/// Logs a lookup failure that the walk is going to treat as "no data".
fn absorb(context: &str, error: &LookupError) {
    if error.is_not_found() {
        debug!("Skipping {}: {}", context, error);
    } else {
        warn!("Skipping {}: {}", context, error);
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "<unnamed package>"
    } else {
        name
    }
}
