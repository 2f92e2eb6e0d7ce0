//! Per-resource-type extraction rules.
//!
//! Every resource type resolves to a [`ResourceFamily`] through a single
//! lookup in [`ReferenceRules`]:
//!
//! - `Patient` - the resource is the patient itself
//! - `List` - the resource is the caller's own compartment list
//! - registered types - compartment-owned resources with a [`ReferenceRule`]
//! - everything else - [`ResourceFamily::Unsupported`], always denied
//!
//! The default table is a subset of the FHIR Patient compartment
//! (<https://hl7.org/fhir/R4/compartmentdefinition-patient.html>). Deployments
//! add types through configuration without touching the decision logic.

use std::collections::HashMap;

use crate::config::ReferenceRuleConfig;

/// How patient references are found for one compartment-owned resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRule {
    /// Search parameters whose values name the patient.
    pub search_params: Vec<String>,
    /// Dotted body paths holding references.
    pub reference_paths: Vec<String>,
}

impl ReferenceRule {
    /// Builds a rule from string slices.
    #[must_use]
    pub fn new(search_params: &[&str], reference_paths: &[&str]) -> Self {
        Self {
            search_params: search_params.iter().map(|s| s.to_string()).collect(),
            reference_paths: reference_paths.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<ReferenceRuleConfig> for ReferenceRule {
    fn from(config: ReferenceRuleConfig) -> Self {
        Self {
            search_params: config.search_params,
            reference_paths: config.reference_paths,
        }
    }
}

/// Resource-type family selecting the extraction behaviour.
#[derive(Debug, Clone, Copy)]
pub enum ResourceFamily<'a> {
    /// `Patient`: the target patient is the addressed resource.
    Patient,
    /// `List`: only the caller's own compartment list is accessible.
    List,
    /// A compartment-owned type with reference fields.
    Compartment(&'a ReferenceRule),
    /// No rule registered; never allowed.
    Unsupported,
}

/// Registry of extraction rules keyed by resource type.
#[derive(Debug, Clone)]
pub struct ReferenceRules {
    rules: HashMap<String, ReferenceRule>,
}

impl Default for ReferenceRules {
    fn default() -> Self {
        Self::patient_compartment()
    }
}

impl ReferenceRules {
    /// An empty registry. Only Patient and List are resolvable.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Default rules for common Patient-compartment resources.
    #[must_use]
    pub fn patient_compartment() -> Self {
        let mut rules = Self::empty();

        rules.register(
            "Observation",
            ReferenceRule::new(&["subject", "patient"], &["subject", "performer"]),
        );
        rules.register(
            "Encounter",
            ReferenceRule::new(&["subject", "patient"], &["subject"]),
        );
        // Condition's "patient" search param reads Condition.subject
        rules.register(
            "Condition",
            ReferenceRule::new(&["subject", "patient"], &["subject", "asserter"]),
        );
        rules.register(
            "DiagnosticReport",
            ReferenceRule::new(&["subject", "patient"], &["subject", "performer"]),
        );
        rules.register(
            "MedicationRequest",
            ReferenceRule::new(&["subject", "patient"], &["subject"]),
        );
        rules.register(
            "Procedure",
            ReferenceRule::new(&["subject", "patient"], &["subject", "performer.actor"]),
        );
        rules.register(
            "Immunization",
            ReferenceRule::new(&["patient"], &["patient"]),
        );
        rules.register(
            "AllergyIntolerance",
            ReferenceRule::new(&["patient"], &["patient", "recorder", "asserter"]),
        );
        rules.register(
            "CarePlan",
            ReferenceRule::new(&["subject", "patient"], &["subject"]),
        );
        rules.register(
            "DocumentReference",
            ReferenceRule::new(&["subject", "patient"], &["subject", "author"]),
        );

        rules
    }

    /// Registers or replaces the rule for `resource_type`.
    ///
    /// Rules for `Patient` and `List` are ignored; those families are built in.
    pub fn register(&mut self, resource_type: impl Into<String>, rule: ReferenceRule) {
        let resource_type = resource_type.into();
        if matches!(resource_type.as_str(), "Patient" | "List") {
            tracing::warn!(%resource_type, "Ignoring rule for built-in resource family");
            return;
        }
        self.rules.insert(resource_type, rule);
    }

    /// Adds configured rules on top of the current table.
    #[must_use]
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, ReferenceRuleConfig)>,
    {
        for (resource_type, rule) in overrides {
            self.register(resource_type, rule.into());
        }
        self
    }

    /// Resolves the family for `resource_type`.
    #[must_use]
    pub fn family(&self, resource_type: &str) -> ResourceFamily<'_> {
        match resource_type {
            "Patient" => ResourceFamily::Patient,
            "List" => ResourceFamily::List,
            other => self
                .rules
                .get(other)
                .map_or(ResourceFamily::Unsupported, ResourceFamily::Compartment),
        }
    }

    /// The rule for `resource_type`, if registered.
    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<&ReferenceRule> {
        self.rules.get(resource_type)
    }

    /// Number of registered compartment-owned types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no compartment-owned type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_families() {
        let rules = ReferenceRules::default();
        assert!(matches!(rules.family("Patient"), ResourceFamily::Patient));
        assert!(matches!(rules.family("List"), ResourceFamily::List));
    }

    #[test]
    fn test_observation_rule() {
        let rules = ReferenceRules::default();
        let ResourceFamily::Compartment(rule) = rules.family("Observation") else {
            panic!("Observation should be compartment-owned");
        };
        assert!(rule.search_params.contains(&"subject".to_string()));
        assert_eq!(rule.reference_paths, vec!["subject", "performer"]);
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let rules = ReferenceRules::default();
        assert!(matches!(rules.family("Organization"), ResourceFamily::Unsupported));
        assert!(matches!(
            ReferenceRules::empty().family("Observation"),
            ResourceFamily::Unsupported
        ));
    }

    #[test]
    fn test_overrides() {
        let rules = ReferenceRules::empty().with_overrides([
            (
                "Flag".to_string(),
                ReferenceRuleConfig {
                    search_params: vec!["patient".to_string()],
                    reference_paths: vec!["subject".to_string()],
                },
            ),
            (
                "Patient".to_string(),
                ReferenceRuleConfig {
                    search_params: vec!["_id".to_string()],
                    reference_paths: vec![],
                },
            ),
        ]);

        assert_eq!(rules.len(), 1);
        assert!(matches!(rules.family("Flag"), ResourceFamily::Compartment(_)));
        assert!(matches!(rules.family("Patient"), ResourceFamily::Patient));
    }
}
