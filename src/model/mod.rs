//! Core data types for manifests, advisories, and audit results.
//!
//! - [`Manifest`] - A package name plus its declared dependency ranges
//! - [`ResolvedDependency`] - A dependency after version resolution
//! - [`Advisory`] - A vulnerability record from a [`VulnerabilityChecker`](crate::checker::VulnerabilityChecker)
//! - [`Finding`] - One vulnerable resolved package and how it was reached
//! - [`AuditReport`] - All findings for one audited manifest file
//!
//! # Example
//!
//! ```
//! use depaudit::Manifest;
//!
//! let manifest = Manifest::new("my-app")
//!     .with_dependency("express", "^4.17.0")
//!     .with_dependency("lodash", "~4.17.20");
//!
//! assert_eq!(manifest.dependencies.len(), 2);
//! ```

mod finding;
mod manifest;

pub use finding::*;
pub use manifest::*;
