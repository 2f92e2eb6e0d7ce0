//! List-compartment access checker.
//!
//! One [`AccessChecker`] is bound to one caller's compartment list. Every
//! [`check_access`](AccessChecker::check_access) call runs the same ordered
//! policy and falls through to denial whenever the request cannot be tied to
//! a patient in that list:
//!
//! 1. Classify the request
//! 2. `List`: allow only the caller's own list, no backend call
//! 3. `Patient` create without id: allow, no backend call
//! 4. Unregistered resource type: deny, no backend call
//! 5. Extract candidate patients
//! 6. `Patient` upsert by id: allow if the backend has no such patient yet
//! 7. No candidates: deny, no backend call
//! 8. Ask the backend whether any candidate is in the list
//!
//! Backend failures are returned as [`AccessError::BackendUnavailable`] and
//! never turned into a decision.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::classifier::{Strategy, classify};
use super::decision::{AccessDecision, DenyReason};
use super::extractor::{PatientSet, ReferenceExtractor, Targets};
use super::membership::ListMembershipClient;
use super::request::{HttpMethod, IncomingRequest};
use super::rules::ResourceFamily;
use crate::backend::{BackendError, FhirClient};
use crate::error::AccessError;

/// Decides whether one caller may access the resources a request touches.
///
/// Holds no mutable state; safe to share across concurrent requests as long
/// as the backend client is (every [`FhirClient`] is `Send + Sync`).
#[derive(Clone)]
pub struct AccessChecker {
    list_id: String,
    membership: ListMembershipClient,
    extractor: Arc<ReferenceExtractor>,
}

impl std::fmt::Debug for AccessChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessChecker")
            .field("list_id", &self.list_id)
            .field("rules", &self.extractor.rules().len())
            .finish_non_exhaustive()
    }
}

impl AccessChecker {
    /// Creates a checker for compartment list `list_id` with the default
    /// extraction rules.
    #[must_use]
    pub fn new(list_id: impl Into<String>, client: Arc<dyn FhirClient>) -> Self {
        Self {
            list_id: list_id.into(),
            membership: ListMembershipClient::new(client),
            extractor: Arc::new(ReferenceExtractor::default()),
        }
    }

    /// Replaces the reference extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<ReferenceExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// The caller's compartment list id.
    #[must_use]
    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Renders a decision for `request`.
    ///
    /// Makes at most one backend round trip, two for a `Patient` upsert of an
    /// existing patient. Results are never cached.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::BackendUnavailable`] if a backend query does not
    /// complete.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, resource_type = %request.resource_type)
    )]
    pub async fn check_access(
        &self,
        request: &IncomingRequest,
    ) -> Result<AccessDecision, AccessError> {
        let strategy = classify(request);
        tracing::debug!(%strategy, "Classified request");

        match self.decide(strategy, request).await {
            Ok(decision) => {
                match decision.deny_reason() {
                    None => tracing::info!(list_id = %self.list_id, decision = "allow", "Access decided"),
                    Some(reason) => tracing::info!(
                        list_id = %self.list_id,
                        decision = "deny",
                        code = %reason.code,
                        "Access decided"
                    ),
                }
                Ok(decision)
            }
            Err(e) => {
                let err = AccessError::from(e);
                tracing::warn!(
                    list_id = %self.list_id,
                    category = %err.category(),
                    error = %err,
                    "Backend query failed"
                );
                Err(err)
            }
        }
    }

    /// Like [`check_access`](Self::check_access), abandoning the check when
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Cancellation yields [`AccessError::BackendUnavailable`] with
    /// [`BackendError::Cancelled`]; it is never an allow or a deny.
    pub async fn check_access_with_cancel(
        &self,
        request: &IncomingRequest,
        cancel: &CancellationToken,
    ) -> Result<AccessDecision, AccessError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!(list_id = %self.list_id, "Access check cancelled");
                Err(BackendError::Cancelled.into())
            }
            result = self.check_access(request) => result,
        }
    }

    async fn decide(
        &self,
        strategy: Strategy,
        request: &IncomingRequest,
    ) -> Result<AccessDecision, BackendError> {
        let resource_type = request.resource_type.as_str();

        match self.extractor.family(resource_type) {
            ResourceFamily::List => return Ok(self.decide_list(request)),
            ResourceFamily::Patient
                if request.method == HttpMethod::Post && request.resource_id.is_none() =>
            {
                tracing::debug!("Patient creation without id");
                return Ok(AccessDecision::Allow);
            }
            ResourceFamily::Unsupported => {
                return Ok(DenyReason::unsupported_resource_type(resource_type).into());
            }
            ResourceFamily::Patient | ResourceFamily::Compartment(_) => {}
        }

        let candidates = match self.extractor.extract(strategy, request) {
            Targets::PatientUpsert(patient) => {
                if !self.membership.patient_exists(&patient).await? {
                    tracing::debug!(patient = %patient, "Patient does not exist yet, upsert creates it");
                    return Ok(AccessDecision::Allow);
                }
                PatientSet::from([patient])
            }
            Targets::Patients(candidates) => candidates,
        };

        tracing::debug!(candidates = candidates.len(), "Extracted patient references");
        if candidates.is_empty() {
            return Ok(DenyReason::no_patient_reference(resource_type).into());
        }

        if self
            .membership
            .is_any_member_of_list(&self.list_id, &candidates)
            .await?
        {
            Ok(AccessDecision::Allow)
        } else {
            tracing::warn!(
                list_id = %self.list_id,
                candidates = candidates.len(),
                "No referenced patient is in the compartment list"
            );
            Ok(DenyReason::not_in_compartment(candidates.len()).into())
        }
    }

    fn decide_list(&self, request: &IncomingRequest) -> AccessDecision {
        match request.resource_id.as_deref() {
            Some(id) if id == self.list_id => AccessDecision::Allow,
            requested => {
                let requested = requested.unwrap_or_default();
                tracing::warn!(list_id = %self.list_id, requested, "List access outside compartment");
                DenyReason::list_mismatch(requested).into()
            }
        }
    }
}
