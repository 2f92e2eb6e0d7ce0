//! Patient reference extraction.
//!
//! Turns a classified request into the set of patients it touches. Any
//! ambiguity (unparsable body, body type that does not match the path,
//! references that are not local `Patient/...`) yields no candidates, which
//! the checker turns into a denial.

use std::fmt;
use std::sync::Arc;

use fhirgate_core::{is_valid_id, parse_reference};
use indexmap::IndexSet;

use super::body::{BodyError, ParsedResource};
use super::classifier::Strategy;
use super::request::{HttpMethod, IncomingRequest};
use super::rules::{ReferenceRule, ReferenceRules, ResourceFamily};

/// A reference to a Patient resource. Equality is by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientReference {
    id: String,
}

impl PatientReference {
    /// Creates a reference to `Patient/{id}`.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The patient id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for PatientReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Patient/{}", self.id)
    }
}

/// Ordered, de-duplicated candidate patients.
pub type PatientSet = IndexSet<PatientReference>;

/// What the checker has to establish for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Allowed iff any of these patients is in the caller's compartment.
    /// Empty means no anchor was found.
    Patients(PatientSet),
    /// A Patient written by id. Allowed outright if the backend has no such
    /// patient yet, otherwise subject to the membership check.
    PatientUpsert(PatientReference),
}

impl Targets {
    /// No candidates at all.
    #[must_use]
    pub fn none() -> Self {
        Self::Patients(PatientSet::new())
    }
}

/// Extracts candidate patients according to [`ReferenceRules`].
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    rules: Arc<ReferenceRules>,
    base_url: Option<String>,
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceRules::default()))
    }
}

impl ReferenceExtractor {
    /// Creates an extractor over `rules`.
    #[must_use]
    pub fn new(rules: Arc<ReferenceRules>) -> Self {
        Self {
            rules,
            base_url: None,
        }
    }

    /// Treats absolute references under `base_url` as local.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The rule registry in use.
    #[must_use]
    pub fn rules(&self) -> &ReferenceRules {
        &self.rules
    }

    /// Resolves the family of `resource_type`.
    #[must_use]
    pub fn family(&self, resource_type: &str) -> ResourceFamily<'_> {
        self.rules.family(resource_type)
    }

    /// Extracts the patients `request` touches.
    #[must_use]
    pub fn extract(&self, strategy: Strategy, request: &IncomingRequest) -> Targets {
        match self.rules.family(&request.resource_type) {
            ResourceFamily::Patient => self.extract_patient(strategy, request),
            ResourceFamily::Compartment(rule) => self.extract_compartment(rule, strategy, request),
            ResourceFamily::List | ResourceFamily::Unsupported => Targets::none(),
        }
    }

    fn extract_patient(&self, strategy: Strategy, request: &IncomingRequest) -> Targets {
        match strategy {
            Strategy::DirectId => {
                let Some(id) = request.resource_id.as_deref().filter(|id| is_valid_id(id)) else {
                    return Targets::none();
                };
                let target = PatientReference::new(id);
                if request.method == HttpMethod::Put {
                    Targets::PatientUpsert(target)
                } else {
                    Targets::Patients(PatientSet::from([target]))
                }
            }
            Strategy::Search => {
                let values = request.search_param("_id").unwrap_or_default();
                single_search_patient(
                    &request.resource_type,
                    values.iter().flat_map(|v| split_values(v)).map(|id| {
                        is_valid_id(id).then(|| PatientReference::new(id))
                    }),
                )
            }
            Strategy::BodyWrite => {
                let Some(id) = request.resource_id.as_deref().filter(|id| is_valid_id(id)) else {
                    // Creation; the checker allows it before extraction.
                    return Targets::none();
                };
                // PATCH bodies are patch documents, not resources.
                if request.method != HttpMethod::Patch
                    && let Some(body) = request.body.as_deref().filter(|b| !b.is_empty())
                {
                    match ParsedResource::parse(body, "Patient") {
                        Ok(patient) if patient.id().is_none_or(|body_id| body_id == id) => {}
                        Ok(patient) => {
                            tracing::warn!(
                                path_id = id,
                                body_id = patient.id(),
                                "Patient body id does not match request path"
                            );
                            return Targets::none();
                        }
                        Err(e) => {
                            log_body_error(&request.resource_type, &e);
                            return Targets::none();
                        }
                    }
                }
                if request.method == HttpMethod::Put {
                    Targets::PatientUpsert(PatientReference::new(id))
                } else {
                    Targets::Patients(PatientSet::from([PatientReference::new(id)]))
                }
            }
        }
    }

    fn extract_compartment(
        &self,
        rule: &ReferenceRule,
        strategy: Strategy,
        request: &IncomingRequest,
    ) -> Targets {
        let mut patients = PatientSet::new();

        match strategy {
            // A single resource by id carries no patient anchor in its path.
            Strategy::DirectId => {}
            Strategy::Search => {
                let values = rule
                    .search_params
                    .iter()
                    .filter_map(|param| request.search_param(param))
                    .flatten()
                    .flat_map(|value| split_values(value))
                    .map(|v| self.search_patient(v));
                return single_search_patient(&request.resource_type, values);
            }
            Strategy::BodyWrite => {
                let Some(body) = request.body.as_deref() else {
                    return Targets::none();
                };
                let resource = match ParsedResource::parse(body, &request.resource_type) {
                    Ok(resource) => resource,
                    Err(e) => {
                        log_body_error(&request.resource_type, &e);
                        return Targets::none();
                    }
                };
                for path in &rule.reference_paths {
                    patients.extend(
                        resource
                            .references(path)
                            .into_iter()
                            .filter_map(|r| self.body_patient(r)),
                    );
                }
            }
        }

        Targets::Patients(patients)
    }

    /// Search values may be a bare id (`p1`) or a typed reference (`Patient/p1`).
    fn search_patient(&self, value: &str) -> Option<PatientReference> {
        if value.contains('/') {
            self.body_patient(value)
        } else if is_valid_id(value) {
            Some(PatientReference::new(value))
        } else {
            None
        }
    }

    fn body_patient(&self, reference: &str) -> Option<PatientReference> {
        parse_reference(reference, self.base_url.as_deref())
            .ok()
            .filter(|r| r.is_type("Patient"))
            .map(|r| PatientReference::new(r.id))
    }
}

/// Anchors a search on exactly one patient.
///
/// Comma-separated values and repeated patient parameters widen a search to
/// every patient named, so a search is only anchored when all of its values
/// resolve to the same patient. `None` items are values that do not name a
/// local patient (`Group/g1`, malformed ids); they leave the search unanchored.
fn single_search_patient<I>(resource_type: &str, values: I) -> Targets
where
    I: IntoIterator<Item = Option<PatientReference>>,
{
    let mut patients = PatientSet::new();
    for value in values {
        let Some(patient) = value else {
            tracing::debug!(%resource_type, "Search value does not name a local patient");
            return Targets::none();
        };
        patients.insert(patient);
    }

    if patients.len() > 1 {
        tracing::warn!(
            %resource_type,
            candidates = patients.len(),
            "Search spans several patients"
        );
        return Targets::none();
    }
    Targets::Patients(patients)
}

/// Splits a comma-separated search value (FHIR OR semantics).
fn split_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn log_body_error(resource_type: &str, error: &BodyError) {
    match error {
        BodyError::TypeMismatch { expected, found } => tracing::warn!(
            %resource_type,
            %expected,
            %found,
            "Request body type does not match request path"
        ),
        other => tracing::debug!(%resource_type, error = %other, "Unusable request body"),
    }
}
