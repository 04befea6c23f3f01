//! Source-based routing policy

use std::collections::HashSet;

/// Decides which stages an entry may visit based on its source.
///
/// Legacy sources produce messages the deterministic stages were never
/// built for, so they skip straight to the fallback reasoner.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    legacy_sources: HashSet<String>,
    embedding_enabled: bool,
}

impl RoutingPolicy {
    /// Create a policy
    pub fn new<I, S>(legacy_sources: I, embedding_enabled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legacy_sources: legacy_sources.into_iter().map(Into::into).collect(),
            embedding_enabled,
        }
    }

    /// Whether entries from `source` bypass the deterministic stages
    pub fn forces_fallback(&self, source: &str) -> bool {
        self.legacy_sources.contains(source)
    }

    /// Whether the embedding stage participates at all
    pub fn embedding_enabled(&self) -> bool {
        self.embedding_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_sources_force_fallback() {
        let policy = RoutingPolicy::new(["LegacyCRM"], true);
        assert!(policy.forces_fallback("LegacyCRM"));
        assert!(!policy.forces_fallback("WebServer"));
    }

    #[test]
    fn source_matching_is_exact() {
        let policy = RoutingPolicy::new(["LegacyCRM"], true);
        assert!(!policy.forces_fallback("legacycrm"));
        assert!(!policy.forces_fallback("LegacyCRM2"));
    }
}
