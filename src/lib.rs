pub mod ancestry;
pub mod audit;
pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod registry;
pub mod resolver;

pub use ancestry::AncestryIndex;
pub use audit::{AuditOptions, Auditor, FileAudit};
pub use cache::Cache;
pub use checker::{OsvChecker, VulnerabilityChecker};
pub use config::{Config, FailBehavior};
pub use error::{AuditError, LookupError};
pub use model::{Advisory, AuditReport, Finding, Manifest, ResolvedDependency};
pub use registry::{NpmRegistry, RegistryClient};
