//! Version range resolution.
//!
//! Picks the highest published version that satisfies an npm range, the same
//! policy `npm` applies when it installs a fresh tree. Ranges use npm syntax
//! (`^1.2.0`, `~1.2`, `1.x || >=2.5.0`, `1.0.0 - 1.4.0`), so they are parsed
//! with `node-semver` rather than Cargo's `semver`.

use node_semver::{Range, Version};
use tracing::debug;

/// Returns the maximum version in `published` satisfying `range`.
///
/// Published entries that are not valid semver are ignored. Returns `None` if
/// the range cannot be parsed (git URLs, file paths, dist-tags) or no version
/// satisfies it.
///
/// # Example
///
/// ```
/// use depaudit::resolver::resolve_version;
///
/// let published = vec!["1.2.0".to_string(), "1.4.1".to_string(), "2.0.0".to_string()];
/// assert_eq!(resolve_version(&published, "^1.2.0"), Some("1.4.1".to_string()));
/// assert_eq!(resolve_version(&published, "^3.0.0"), None);
/// ```
pub fn resolve_version(published: &[String], range: &str) -> Option<String> {
    if published.is_empty() {
        return None;
    }

    let range = parse_range(range)?;

    published
        .iter()
        .filter_map(|raw| Version::parse(raw).ok().map(|version| (version, raw)))
        .filter(|(version, _)| range.satisfies(version))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone())
}

/// Parses an npm range. An empty range means any version, as in npm.
pub fn parse_range(raw: &str) -> Option<Range> {
    let trimmed = raw.trim();
    let normalized = if trimmed.is_empty() { "*" } else { trimmed };

    match Range::parse(normalized) {
        Ok(range) => Some(range),
        Err(e) => {
            debug!("Unsupported version range '{}': {}", raw, e);
            None
        }
    }
}
