//! Scope exclusion applied before persistence

use tracing::debug;

use super::CassetteEntry;
use crate::fingerprint::normalize_scope;

/// Drops entries whose scope is excluded
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    excluded: Vec<String>,
}

impl ScopeFilter {
    /// Create a filter excluding the given scopes
    #[must_use]
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: excluded
                .into_iter()
                .map(|s| normalize_scope(s.as_ref()))
                .collect(),
        }
    }

    /// Whether `scope` is excluded
    #[must_use]
    pub fn excludes(&self, scope: &str) -> bool {
        let scope = normalize_scope(scope);
        self.excluded.iter().any(|e| *e == scope)
    }

    /// Normalized excluded scopes
    #[must_use]
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Keep entries whose scope is not excluded, preserving order
    #[must_use]
    pub fn apply(&self, entries: Vec<CassetteEntry>) -> Vec<CassetteEntry> {
        if self.excluded.is_empty() {
            return entries;
        }

        let before = entries.len();
        let kept: Vec<CassetteEntry> = entries
            .into_iter()
            .filter(|entry| !self.excludes(&entry.scope))
            .collect();

        debug!("Scope filter dropped {} of {} entries", before - kept.len(), before);

        kept
    }
}
