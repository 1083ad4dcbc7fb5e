use crate::locator::volatility::VolatilityPolicy;
use serde::{Deserialize, Serialize};

/// Tuning knobs for locator synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    /// How digits in attribute values and text are treated
    pub policy: VolatilityPolicy,

    /// Ancestor levels searched by the fast path pass
    pub fast_depth: usize,

    /// Ancestor levels searched by the deep path pass
    pub deep_depth: usize,

    /// Anchor candidates tried per level in the fast pass
    pub fast_candidates: usize,

    /// Anchor candidates tried per level in the deep pass
    pub deep_candidates: usize,

    /// Longest own text used as a self text anchor
    pub self_text_max: usize,

    /// Longest text used inside a path segment
    pub segment_text_max: usize,

    /// Longest text appended to the target segment
    pub padded_text_max: usize,

    /// Longest text considered as a unique container anchor
    pub anchor_text_max: usize,

    /// Containers with this many child elements or more skip semantic anchoring
    pub semantic_child_limit: usize,

    /// Ancestors above the current level searched for a text anchor
    pub ancestor_text_levels: usize,

    /// Ancestors tried when a path is still ambiguous after both passes
    pub verify_parent_attempts: usize,

    /// Longest role name reported for role-based lookup
    pub role_name_max: usize,

    /// Longest visible text reported for text-based lookup
    pub visible_text_max: usize,

    /// Characters of outer HTML kept in the node snapshot
    pub snapshot_limit: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            policy: VolatilityPolicy::Aggressive,
            fast_depth: 10,
            deep_depth: 30,
            fast_candidates: 5,
            deep_candidates: 15,
            self_text_max: 50,
            segment_text_max: 35,
            padded_text_max: 60,
            anchor_text_max: 100,
            semantic_child_limit: 50,
            ancestor_text_levels: 3,
            verify_parent_attempts: 5,
            role_name_max: 50,
            visible_text_max: 60,
            snapshot_limit: 3000,
        }
    }
}

impl SynthesisOptions {
    /// Create new options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the volatility policy
    pub fn policy(mut self, policy: VolatilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method: set fast and deep pass depths
    pub fn depths(mut self, fast: usize, deep: usize) -> Self {
        self.fast_depth = fast;
        self.deep_depth = deep;
        self
    }

    /// Builder method: set fast and deep candidate limits
    pub fn candidate_limits(mut self, fast: usize, deep: usize) -> Self {
        self.fast_candidates = fast;
        self.deep_candidates = deep;
        self
    }

    /// Builder method: set the snapshot size
    pub fn snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Load options from a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SynthesisOptions::default();
        assert_eq!(opts.fast_depth, 10);
        assert_eq!(opts.deep_depth, 30);
        assert_eq!(opts.fast_candidates, 5);
        assert_eq!(opts.deep_candidates, 15);
        assert_eq!(opts.policy, VolatilityPolicy::Aggressive);
    }

    #[test]
    fn test_builder() {
        let opts = SynthesisOptions::new().policy(VolatilityPolicy::Lenient).depths(4, 8).candidate_limits(2, 3);

        assert_eq!(opts.policy, VolatilityPolicy::Lenient);
        assert_eq!((opts.fast_depth, opts.deep_depth), (4, 8));
        assert_eq!((opts.fast_candidates, opts.deep_candidates), (2, 3));
    }

    #[test]
    fn test_partial_json() {
        let opts = SynthesisOptions::from_json(r#"{"policy": "lenient", "snapshot_limit": 500}"#).unwrap();
        assert_eq!(opts.policy, VolatilityPolicy::Lenient);
        assert_eq!(opts.snapshot_limit, 500);
        assert_eq!(opts.deep_depth, 30);
    }
}
