//! HTTP implementation of [`FhirClient`].
//!
//! # Example
//!
//! ```ignore
//! use fhirgate_auth::backend::{HttpFhirClient, SearchQuery};
//! use fhirgate_auth::config::BackendConfig;
//!
//! let client = HttpFhirClient::new(BackendConfig::new(base_url))?;
//! let bundle = client
//!     .search(&SearchQuery::new("Patient").param("_id", "123").ids_only())
//!     .await?;
//! ```

use async_trait::async_trait;
use url::Url;

use super::{BackendError, FhirClient, SearchBundle, SearchQuery};
use crate::config::BackendConfig;
use crate::error::AccessError;

const FHIR_JSON: &str = "application/fhir+json";

/// Backend client over HTTP.
///
/// Cloning is cheap and clones share one connection pool. Safe for
/// concurrent use by multiple callers.
#[derive(Debug, Clone)]
pub struct HttpFhirClient {
    http_client: reqwest::Client,
    base_url: Url,
    max_response_size: usize,
}

impl HttpFhirClient {
    /// Creates a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Configuration`] if the base URL scheme is not
    /// allowed or the underlying HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, AccessError> {
        match config.base_url.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            scheme => {
                return Err(AccessError::configuration(format!(
                    "backend scheme `{scheme}` is not allowed"
                )));
            }
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccessError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
            max_response_size: config.max_response_size,
        })
    }

    /// Base URL queries are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{resource_type}?{params}`.
    fn query_url(&self, query: &SearchQuery) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(&query.resource_type);
        url.set_query(None);
        if !query.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&query.params);
        }
        Ok(url)
    }
}

#[async_trait]
impl FhirClient for HttpFhirClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchBundle, BackendError> {
        let url = self.query_url(query)?;

        tracing::debug!(%url, "Querying backend");

        let response = self
            .http_client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "Backend request failed");
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "Backend returned an error status");
            return Err(BackendError::Http(status.as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_response_size
        {
            return Err(BackendError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Network(e.to_string())
            }
        })?;
        if body.len() > self.max_response_size {
            return Err(BackendError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        let bundle = SearchBundle::from_slice(&body).inspect_err(|e| {
            tracing::warn!(%url, error = %e, "Backend returned an unparsable bundle");
        })?;

        tracing::debug!(%url, matches = bundle.ids.len(), "Backend query complete");
        Ok(bundle)
    }
}
