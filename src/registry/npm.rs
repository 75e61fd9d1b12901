use super::RegistryClient;
use crate::cache::Cache;
use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Abbreviated metadata: versions and dependencies only, a fraction of the
/// full document size.
const ABBREVIATED_METADATA: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8";

/// The parts of a registry document the walker uses: version to dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Packument {
    versions: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct NpmPackageResponse {
    #[serde(default)]
    versions: BTreeMap<String, NpmVersion>,
}

#[derive(Deserialize)]
struct NpmVersion {
    // Very old publishes use arrays or non-string values here.
    dependencies: Option<serde_json::Value>,
}

impl From<NpmPackageResponse> for Packument {
    fn from(response: NpmPackageResponse) -> Self {
        let versions = response
            .versions
            .into_iter()
            .map(|(version, meta)| {
                let dependencies = match meta.dependencies {
                    Some(serde_json::Value::Object(map)) => map
                        .into_iter()
                        .filter_map(|(name, range)| match range {
                            serde_json::Value::String(range) => Some((name, range)),
                            _ => None,
                        })
                        .collect(),
                    _ => BTreeMap::new(),
                };
                (version, dependencies)
            })
            .collect();

        Packument { versions }
    }
}

/// Client for an npm-compatible registry.
///
/// Documents are memoized for the life of the client and, when a [`Cache`] is
/// attached, persisted between runs. Concurrent lookups of the same package
/// share a single request.
pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    cache: Option<Cache>,
    /// A cell stays empty after a failed fetch, so the next lookup retries.
    fetched: Mutex<HashMap<String, Arc<OnceCell<Arc<Packument>>>>>,
}

impl NpmRegistry {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("depaudit/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: None,
            fetched: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn package_url(&self, package: &str) -> String {
        // Scoped packages (@scope/name) keep the @ but encode the slash.
        let encoded = if package.starts_with('@') {
            package.replace('/', "%2F")
        } else {
            package.to_string()
        };
        format!("{}/{}", self.base_url, encoded)
    }

    async fn packument(&self, package: &str) -> Result<Arc<Packument>, LookupError> {
        let cell = Arc::clone(
            self.fetched
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entry(package.to_string())
                .or_default(),
        );

        cell.get_or_try_init(|| self.load(package))
            .await
            .map(Arc::clone)
    }

    async fn load(&self, package: &str) -> Result<Arc<Packument>, LookupError> {
        let cache_key = format!("npm_{}", package);
        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get::<Packument>(&cache_key))
        {
            debug!("Registry cache hit for {}", package);
            return Ok(Arc::new(cached));
        }

        let url = self.package_url(package);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, ABBREVIATED_METADATA)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound {
                name: package.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(LookupError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: NpmPackageResponse =
            response.json().await.map_err(|e| LookupError::Decode {
                url: url.clone(),
                details: e.to_string(),
            })?;
        let packument = Packument::from(body);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&cache_key, &packument) {
                debug!("Could not cache registry data for {}: {}", package, e);
            }
        }

        Ok(Arc::new(packument))
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    fn name(&self) -> &'static str {
        "npm registry"
    }

    async fn versions(&self, package: &str) -> Result<Vec<String>, LookupError> {
        let packument = self.packument(package).await?;
        Ok(packument.versions.keys().cloned().collect())
    }

    async fn dependencies(
        &self,
        package: &str,
        version: &str,
    ) -> Result<BTreeMap<String, String>, LookupError> {
        let packument = self.packument(package).await?;
        packument
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                name: format!("{}@{}", package, version),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `body` for every request, slowly enough that concurrent
    /// lookups overlap. Returns the base URL and a request counter.
    async fn serve(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf[read..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => read += n,
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        (format!("http://{}", addr), requests)
    }

    fn parse(json: &str) -> Packument {
        let response: NpmPackageResponse = serde_json::from_str(json).unwrap();
        Packument::from(response)
    }

    #[test]
    fn test_packument_keeps_string_dependencies() {
        let packument = parse(
            r#"{
                "name": "body-parser",
                "dist-tags": { "latest": "1.20.2" },
                "versions": {
                    "1.20.2": {
                        "name": "body-parser",
                        "dependencies": { "bytes": "3.1.2", "qs": "6.11.0" }
                    },
                    "1.0.0": { "name": "body-parser" }
                }
            }"#,
        );

        assert_eq!(packument.versions.len(), 2);
        assert_eq!(packument.versions["1.20.2"]["qs"], "6.11.0");
        assert!(packument.versions["1.0.0"].is_empty());
    }

    #[test]
    fn test_packument_tolerates_legacy_dependency_shapes() {
        let packument = parse(
            r#"{
                "versions": {
                    "0.0.1": { "dependencies": ["coffee-script"] },
                    "0.0.2": { "dependencies": { "a": "1.0.0", "b": null } }
                }
            }"#,
        );

        assert!(packument.versions["0.0.1"].is_empty());
        assert_eq!(packument.versions["0.0.2"].len(), 1);
    }

    #[test]
    fn test_package_url() {
        let registry = NpmRegistry::new("https://registry.example.com/").unwrap();
        assert_eq!(
            registry.package_url("lodash"),
            "https://registry.example.com/lodash"
        );
        assert_eq!(
            registry.package_url("@types/node"),
            "https://registry.example.com/@types%2Fnode"
        );
    }

    #[tokio::test]
    async fn test_served_from_cache_without_network() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::in_dir(dir.path(), Duration::from_secs(3600));
        let packument = Packument {
            versions: BTreeMap::from([
                ("1.0.0".to_string(), BTreeMap::new()),
                (
                    "1.1.0".to_string(),
                    BTreeMap::from([("ms".to_string(), "^2.1.1".to_string())]),
                ),
            ]),
        };
        cache.set("npm_debug", &packument).unwrap();

        // Unroutable base URL: any request would fail.
        let registry = NpmRegistry::new("http://127.0.0.1:9").unwrap().with_cache(cache);

        let versions = registry.versions("debug").await.unwrap();
        assert_eq!(versions, vec!["1.0.0", "1.1.0"]);

        let deps = registry.dependencies("debug", "1.1.0").await.unwrap();
        assert_eq!(deps["ms"], "^2.1.1");

        let missing = registry.dependencies("debug", "9.9.9").await;
        assert!(matches!(missing, Err(LookupError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_request() {
        let (url, requests) =
            serve(r#"{ "versions": { "2.1.3": { "dependencies": {} } } }"#).await;
        let registry = NpmRegistry::new(url).unwrap();

        let lookups = (0..10).map(|_| registry.versions("ms"));
        let results = futures::future::join_all(lookups).await;

        for versions in results {
            assert_eq!(versions.unwrap(), vec!["2.1.3"]);
        }
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        registry.dependencies("ms", "2.1.3").await.unwrap();
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let (url, requests) = serve("not json").await;
        let registry = NpmRegistry::new(url).unwrap();

        assert!(matches!(
            registry.versions("ms").await,
            Err(LookupError::Decode { .. })
        ));
        assert!(registry.versions("ms").await.is_err());
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }
}
