//! Package registry access.
//!
//! The walker only needs two questions answered about a package: which
//! versions exist, and what a given version depends on. [`RegistryClient`]
//! captures that; [`NpmRegistry`] answers it from an npm-compatible registry.

mod npm;

pub use npm::{NpmRegistry, NPM_REGISTRY_URL};

use crate::error::LookupError;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Human-readable name used in log messages.
    fn name(&self) -> &'static str;

    /// All published versions of `package`.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] if the registry has no such package, or any
    /// other variant if the request fails.
    async fn versions(&self, package: &str) -> Result<Vec<String>, LookupError>;

    /// Runtime dependencies declared by `package` at exactly `version`.
    async fn dependencies(
        &self,
        package: &str,
        version: &str,
    ) -> Result<BTreeMap<String, String>, LookupError>;
}
