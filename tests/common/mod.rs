//! In-memory registry and advisory doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use depaudit::{Advisory, LookupError, RegistryClient, VulnerabilityChecker};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Versions = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Default)]
pub struct MockRegistry {
    packages: HashMap<String, Versions>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    latency: Duration,
    version_requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(mut self, name: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        let dependencies = dependencies
            .iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect();
        self.packages
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string(), dependencies);
        self
    }

    /// Every request for `name` fails with a server error.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Every request for `name` never completes.
    pub fn hanging(mut self, name: &str) -> Self {
        self.hanging.insert(name.to_string());
        self
    }

    /// Every request takes at least `latency` to answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn version_requests(&self) -> usize {
        self.version_requests.load(Ordering::SeqCst)
    }

    /// Most requests that were ever being answered at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn answer<T>(&self, lookup: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = lookup.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn check(&self, name: &str) -> Result<&Versions, LookupError> {
        if self.hanging.contains(name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(name) {
            return Err(LookupError::Status {
                status: 503,
                url: format!("https://registry.test/{}", name),
            });
        }
        self.packages.get(name).ok_or_else(|| LookupError::NotFound {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    fn name(&self) -> &'static str {
        "mock registry"
    }

    async fn versions(&self, package: &str) -> Result<Vec<String>, LookupError> {
        self.version_requests.fetch_add(1, Ordering::SeqCst);
        let versions = self.answer(self.check(package)).await?;
        Ok(versions.keys().cloned().collect())
    }

    async fn dependencies(
        &self,
        package: &str,
        version: &str,
    ) -> Result<BTreeMap<String, String>, LookupError> {
        self.answer(self.check(package))
            .await?
            .get(version)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                name: format!("{}@{}", package, version),
            })
    }
}

#[derive(Default)]
pub struct MockChecker {
    advisories: HashMap<(String, String), Vec<Advisory>>,
    failing: HashSet<String>,
}

impl MockChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vulnerable(mut self, name: &str, version: &str, advisory: Advisory) -> Self {
        self.advisories
            .entry((name.to_string(), version.to_string()))
            .or_default()
            .push(advisory);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

#[async_trait]
impl VulnerabilityChecker for MockChecker {
    fn name(&self) -> &'static str {
        "mock advisories"
    }

    async fn lookup(&self, package: &str, version: &str) -> Result<Vec<Advisory>, LookupError> {
        if self.failing.contains(package) {
            return Err(LookupError::Status {
                status: 500,
                url: "https://advisories.test/query".to_string(),
            });
        }
        Ok(self
            .advisories
            .get(&(package.to_string(), version.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn advisory(id: &str, patched: &str) -> Advisory {
    Advisory {
        id: id.to_string(),
        title: Some(format!("Advisory {}", id)),
        patched_versions: patched.to_string(),
        url: format!("https://osv.dev/vulnerability/{}", id),
        short_url: None,
    }
}
