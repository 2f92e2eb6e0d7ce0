//! Compartment list membership queries.
//!
//! Membership is asked of the backend as a List search restricted to the
//! caller's list and to the candidate items:
//!
//! ```text
//! GET /List?_id=test-list&item=Patient/p1,Patient/p2&_elements=id
//! ```
//!
//! Any returned entry means at least one candidate is in the list. Results are
//! never cached; lists change between requests.

use std::sync::Arc;

use super::extractor::{PatientReference, PatientSet};
use crate::backend::{BackendError, FhirClient, SearchQuery};

/// A membership question: is any candidate an item of list `list_id`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipQuery<'a> {
    /// Caller's compartment list.
    pub list_id: &'a str,
    /// Candidate patients. Never empty when sent.
    pub candidates: &'a PatientSet,
}

impl MembershipQuery<'_> {
    /// Backend search answering this question.
    #[must_use]
    pub fn to_search(&self) -> SearchQuery {
        SearchQuery::new("List")
            .param("_id", self.list_id)
            .param("item", join_references(self.candidates))
            .ids_only()
    }
}

/// Existence check for a patient id: `GET /Patient?_id=p1&_elements=id`.
#[must_use]
pub fn patient_existence_search(patient: &PatientReference) -> SearchQuery {
    SearchQuery::new("Patient").param("_id", patient.id()).ids_only()
}

/// Answers membership and existence questions against the backend.
#[derive(Clone)]
pub struct ListMembershipClient {
    client: Arc<dyn FhirClient>,
}

impl ListMembershipClient {
    /// Wraps a shared backend client.
    #[must_use]
    pub fn new(client: Arc<dyn FhirClient>) -> Self {
        Self { client }
    }

    /// Returns `true` if any of `candidates` is an item of list `list_id`.
    ///
    /// An empty candidate set is `false` without a backend call.
    ///
    /// # Errors
    ///
    /// Propagates [`BackendError`] when the query does not complete.
    pub async fn is_any_member_of_list(
        &self,
        list_id: &str,
        candidates: &PatientSet,
    ) -> Result<bool, BackendError> {
        if candidates.is_empty() {
            return Ok(false);
        }

        let query = MembershipQuery {
            list_id,
            candidates,
        }
        .to_search();
        let bundle = self.client.search(&query).await?;

        tracing::debug!(
            list_id,
            candidates = candidates.len(),
            matched = bundle.has_matches(),
            "List membership query"
        );
        Ok(bundle.has_matches())
    }

    /// Returns `true` if the backend already has a Patient with this id.
    ///
    /// # Errors
    ///
    /// Propagates [`BackendError`] when the query does not complete.
    pub async fn patient_exists(&self, patient: &PatientReference) -> Result<bool, BackendError> {
        let bundle = self.client.search(&patient_existence_search(patient)).await?;
        tracing::debug!(patient = %patient, exists = bundle.has_matches(), "Patient existence check");
        Ok(bundle.has_matches())
    }
}

/// `Patient/a,Patient/b` in set order.
fn join_references(candidates: &PatientSet) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
