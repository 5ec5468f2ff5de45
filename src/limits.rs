//! Limits and configuration knobs for schema compilation
//!
//! These bound the resources a single compile may consume: the number of
//! DFA states subset construction may create and the largest occurrence
//! bound a particle or facet may use.

use serde::{Deserialize, Serialize};

use crate::components::MaxOccurs;
use crate::error::{CompileError, CompileErrorKind, Error, Result};

/// Compile configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Limits {
    /// Abort compilation when a content model needs more DFA states than this
    #[serde(rename = "maxDFAStates")]
    pub max_dfa_states: usize,

    /// Cap on any maxOccurs value; larger values saturate to unbounded
    #[serde(rename = "maxOccursLimit")]
    pub max_occurs_limit: u32,

    /// Passed through to the loader, which is outside this crate
    #[serde(rename = "allowMissingImportLocations")]
    pub allow_missing_import_locations: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dfa_states: 10_000,
            max_occurs_limit: 5_000,
            allow_missing_import_locations: false,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_dfa_states: 1_000,
            max_occurs_limit: 1_000,
            allow_missing_import_locations: false,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_dfa_states: 1_000_000,
            max_occurs_limit: 1_000_000,
            allow_missing_import_locations: true,
        }
    }

    /// Load limits from a JSON configuration document
    ///
    /// Missing keys keep their default value; unknown keys are rejected.
    pub fn from_json(text: &str) -> Result<Self> {
        let limits: Limits = serde_json::from_str(text)?;
        if limits.max_dfa_states == 0 {
            return Err(Error::LimitExceeded(
                "maxDFAStates must be at least 1".to_string(),
            ));
        }
        Ok(limits)
    }

    /// Check that a content model's state count is within limits
    pub fn check_dfa_states(&self, count: usize) -> std::result::Result<(), CompileError> {
        if count > self.max_dfa_states {
            Err(CompileError::new(
                CompileErrorKind::DFAStateLimitExceeded,
                format!(
                    "DFA state count {} exceeds maximum {}",
                    count, self.max_dfa_states
                ),
            ))
        } else {
            Ok(())
        }
    }

    /// Saturate a maxOccurs value above the limit to unbounded
    pub fn cap_max_occurs(&self, max: MaxOccurs) -> MaxOccurs {
        match max {
            MaxOccurs::Bounded(n) if n > self.max_occurs_limit => MaxOccurs::Unbounded,
            other => other,
        }
    }

    /// Clamp a minOccurs value to the limit
    pub fn cap_min_occurs(&self, min: u32) -> u32 {
        min.min(self.max_occurs_limit)
    }

    /// Check that an integer facet bound is within limits
    pub fn check_facet_bound(&self, facet: &str, value: u64) -> std::result::Result<(), CompileError> {
        if value > u64::from(self.max_occurs_limit) {
            Err(CompileError::new(
                CompileErrorKind::FacetInconsistent,
                format!(
                    "{} value {} exceeds maximum {}",
                    facet, value, self.max_occurs_limit
                ),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_dfa_states, 10_000);
        assert_eq!(limits.max_occurs_limit, 5_000);
        assert!(!limits.allow_missing_import_locations);
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_dfa_states < Limits::default().max_dfa_states);
        assert!(limits.check_dfa_states(1_000).is_ok());
        let err = limits.check_dfa_states(1_001).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::DFAStateLimitExceeded);
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.allow_missing_import_locations);
        assert!(limits.check_dfa_states(500_000).is_ok());
    }

    #[test]
    fn test_cap_max_occurs() {
        let limits = Limits::strict();
        assert_eq!(
            limits.cap_max_occurs(MaxOccurs::Bounded(10)),
            MaxOccurs::Bounded(10)
        );
        assert_eq!(
            limits.cap_max_occurs(MaxOccurs::Bounded(1_001)),
            MaxOccurs::Unbounded
        );
        assert_eq!(limits.cap_min_occurs(2_000), 1_000);
    }

    #[test]
    fn test_check_facet_bound() {
        let limits = Limits::strict();
        assert!(limits.check_facet_bound("maxLength", 1_000).is_ok());
        assert!(limits.check_facet_bound("maxLength", 1_001).is_err());
    }

    #[test]
    fn test_from_json() {
        let limits = Limits::from_json(r#"{"maxDFAStates": 50, "allowMissingImportLocations": true}"#)
            .unwrap();
        assert_eq!(limits.max_dfa_states, 50);
        assert_eq!(limits.max_occurs_limit, 5_000);
        assert!(limits.allow_missing_import_locations);

        assert!(Limits::from_json(r#"{"maxStates": 5}"#).is_err());
        assert!(Limits::from_json(r#"{"maxDFAStates": 0}"#).is_err());
    }
}
