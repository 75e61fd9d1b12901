mod osv;

pub use osv::{OsvChecker, OSV_QUERY_URL};

use crate::error::LookupError;
use crate::model::Advisory;
use async_trait::async_trait;

/// A source of known vulnerabilities for exact package versions.
#[async_trait]
pub trait VulnerabilityChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advisories affecting `package` at `version`, in the order the source
    /// reports them. Empty when the version is not known to be vulnerable.
    async fn lookup(&self, package: &str, version: &str) -> Result<Vec<Advisory>, LookupError>;
}
