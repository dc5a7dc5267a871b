//! Policy registry: the configured set of known policy codes plus the
//! per-jurisdiction default sets used by the `policy-discovery` amendment.
//!
//! Policy codes are configuration, not ontology rows; the server seeds the
//! registry at bootstrap and passes it by reference wherever policies are
//! checked.

use std::collections::{BTreeMap, BTreeSet};

pub const GLOBAL_JURISDICTION: &str = "GLOBAL";

#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    known: BTreeSet<String>,
    jurisdiction_defaults: BTreeMap<String, Vec<String>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped default registry: a global baseline plus the
    /// jurisdictions the platform onboards most.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.set_jurisdiction_defaults(
            GLOBAL_JURISDICTION,
            ["CIP-VERIFY", "CDD-STANDARD", "SANCTIONS-SCREEN"],
        );
        registry.set_jurisdiction_defaults(
            "LU",
            ["CIP-VERIFY", "CDD-STANDARD", "SANCTIONS-SCREEN", "UBO-REGISTER-LU"],
        );
        registry.set_jurisdiction_defaults(
            "GB",
            ["CIP-VERIFY", "CDD-STANDARD", "SANCTIONS-SCREEN", "PSC-REGISTER-GB"],
        );
        registry.set_jurisdiction_defaults(
            "US",
            ["CIP-VERIFY", "CDD-STANDARD", "SANCTIONS-SCREEN", "FINCEN-BOI-US"],
        );
        registry.insert("EDD-HIGH-RISK");
        registry
    }

    pub fn insert(&mut self, code: impl Into<String>) {
        self.known.insert(code.into());
    }

    pub fn contains(&self, code: &str) -> bool {
        self.known.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Replace the default set for a jurisdiction; all codes become known.
    pub fn set_jurisdiction_defaults<I, S>(&mut self, jurisdiction: &str, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        self.known.extend(codes.iter().cloned());
        self.jurisdiction_defaults
            .insert(jurisdiction.to_string(), codes);
    }

    /// Default policy codes for a jurisdiction, falling back to the global
    /// set.
    pub fn defaults_for(&self, jurisdiction: &str) -> &[String] {
        self.jurisdiction_defaults
            .get(jurisdiction)
            .or_else(|| self.jurisdiction_defaults.get(GLOBAL_JURISDICTION))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fall_back_to_global() {
        let registry = PolicyRegistry::with_defaults();
        assert!(registry.defaults_for("LU").contains(&"UBO-REGISTER-LU".to_string()));
        assert_eq!(
            registry.defaults_for("ZZ"),
            registry.defaults_for(GLOBAL_JURISDICTION)
        );
    }

    #[test]
    fn jurisdiction_defaults_become_known() {
        let registry = PolicyRegistry::with_defaults();
        assert!(registry.contains("PSC-REGISTER-GB"));
        assert!(registry.contains("EDD-HIGH-RISK"));
        assert!(!registry.contains("NOT-A-POLICY"));
    }
}
