//! Per-caller checker construction.

use std::sync::Arc;

use fhirgate_core::validate_id;

use super::checker::AccessChecker;
use super::extractor::ReferenceExtractor;
use super::rules::ReferenceRules;
use crate::backend::FhirClient;
use crate::config::{AccessConfig, DEFAULT_LIST_CLAIM};
use crate::error::AccessError;
use crate::token::{ClaimReader, string_claim};

/// Builds an [`AccessChecker`] from a verified token.
///
/// The factory itself is shared; the extraction rules are built once and
/// every checker it creates points at the same table.
#[derive(Debug, Clone)]
pub struct AccessCheckerFactory {
    claim_name: String,
    extractor: Arc<ReferenceExtractor>,
}

impl Default for AccessCheckerFactory {
    fn default() -> Self {
        Self {
            claim_name: DEFAULT_LIST_CLAIM.to_string(),
            extractor: Arc::new(ReferenceExtractor::default()),
        }
    }
}

impl AccessCheckerFactory {
    /// Factory reading the `patient_list` claim with default rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory for a loaded configuration.
    ///
    /// Configured rules are layered on top of the default compartment rules,
    /// and absolute references under the backend base URL count as local.
    #[must_use]
    pub fn from_config(config: &AccessConfig) -> Self {
        let rules = ReferenceRules::default().with_overrides(config.rules.clone());
        let extractor =
            ReferenceExtractor::new(Arc::new(rules)).with_base_url(config.backend.base_url.as_str());

        Self {
            claim_name: config.list_claim.clone(),
            extractor: Arc::new(extractor),
        }
    }

    /// Reads the compartment list id from `claim_name` instead.
    #[must_use]
    pub fn with_claim_name(mut self, claim_name: impl Into<String>) -> Self {
        self.claim_name = claim_name.into();
        self
    }

    /// Name of the claim holding the compartment list id.
    #[must_use]
    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }

    /// Creates a checker bound to the caller's compartment list.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Configuration`] if the claim is missing, is not
    /// a string, or is not a valid FHIR id.
    pub fn create<T>(
        &self,
        token: &T,
        client: Arc<dyn FhirClient>,
    ) -> Result<AccessChecker, AccessError>
    where
        T: ClaimReader + ?Sized,
    {
        let list_id = string_claim(token, &self.claim_name)?;
        validate_id(list_id).map_err(|e| {
            AccessError::configuration(format!(
                "token claim `{}` is not a valid List id: {e}",
                self.claim_name
            ))
        })?;

        tracing::debug!(claim = %self.claim_name, list_id, "Created access checker");
        Ok(AccessChecker::new(list_id, client).with_extractor(Arc::clone(&self.extractor)))
    }
}
