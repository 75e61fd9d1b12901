use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A package name and the version ranges it declares for its dependencies.
///
/// The root manifest is read from a `package.json`; nested manifests come from
/// registry metadata for a resolved version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), range.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: BTreeMap<String, String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Reads a `package.json`. Fields other than `name` and `dependencies` are
    /// ignored.
    pub fn load(path: &Path) -> Result<Self, AuditError> {
        if !path.exists() {
            return Err(AuditError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| AuditError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| AuditError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A declared dependency after its range was matched against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: String,
    /// `None` when no published version satisfies the declared range.
    pub version: Option<String>,
    /// Dependencies declared by the resolved version, when known.
    pub dependencies: Option<BTreeMap<String, String>>,
}

impl ResolvedDependency {
    /// The resolved version viewed as a manifest of its own, if it declares
    /// anything to walk into.
    pub fn nested_manifest(&self) -> Option<Manifest> {
        self.version.as_ref()?;
        let dependencies = self.dependencies.as_ref()?;
        if dependencies.is_empty() {
            return None;
        }
        Some(Manifest::new(&self.name).with_dependencies(dependencies.clone()))
    }
}
