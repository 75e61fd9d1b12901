//! Parent tracking for dependency chains.
//!
//! The walker records every (child, parent) edge it discovers. Chains are
//! rebuilt by following the first parent recorded for each package, so a
//! package reachable from several parents is always attributed to whichever
//! one was discovered first. The chain is an approximation: it names one real
//! path to the package, not necessarily the path that led to a given finding.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Package name to parent names, in discovery order.
///
/// Shared by all branches of one audit. Writes only ever append.
#[derive(Debug, Default)]
pub struct AncestryIndex {
    parents: Mutex<HashMap<String, Vec<String>>>,
}

impl AncestryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        // Appends cannot leave the map half-written, so a poisoned lock is
        // still consistent.
        self.parents.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records `parent` as a parent of `child`. Repeated edges are ignored.
    pub fn record_parent(&self, child: &str, parent: &str) {
        let mut parents = self.lock();
        let entry = parents.entry(child.to_string()).or_default();
        if !entry.iter().any(|p| p == parent) {
            entry.push(parent.to_string());
        }
    }

    /// All recorded parents of `name`, first-discovered first.
    pub fn parents_of(&self, name: &str) -> Vec<String> {
        self.lock().get(name).cloned().unwrap_or_default()
    }

    /// Rebuilds the chain of ancestors leading to `name`, oldest first.
    ///
    /// Follows first-recorded parents until there is none, the parent is
    /// `root`, or the parent already appears in the chain. The last condition
    /// terminates circular graphs.
    pub fn resolve_chain(&self, name: &str, root: &str) -> Vec<String> {
        let parents = self.lock();
        let mut chain: Vec<String> = Vec::new();
        let mut current = name;

        while let Some(parent) = parents.get(current).and_then(|p| p.first()) {
            if parent == root || chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent.as_str();
        }

        chain.reverse();
        chain
    }
}
