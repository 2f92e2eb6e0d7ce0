//! Backend FHIR API access.
//!
//! The engine only ever asks the backend one kind of question: "does a search
//! return anything?". [`FhirClient`] is the seam for that; [`HttpFhirClient`]
//! is the production implementation and tests plug in their own.
//!
//! - [`SearchQuery`] - resource-type-scoped search with ordered parameters
//! - [`SearchBundle`] - the parts of a search result `Bundle` the engine reads
//! - [`BackendError`] - transport/protocol failures, distinct from "no results"

pub mod bundle;
pub mod http;

use std::fmt;

use async_trait::async_trait;

pub use bundle::SearchBundle;
pub use http::HttpFhirClient;

/// Errors from a backend query. Zero results is never an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request could not be sent or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend did not answer within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a non-success status code.
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// The response was not a parsable search `Bundle`.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The response exceeded the configured size limit.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The query could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The surrounding request was cancelled before the query completed.
    #[error("Query cancelled")]
    Cancelled,
}

/// A search against one resource type, e.g. `/List?_id=x&item=Patient/1&_elements=id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Resource type the search is scoped to.
    pub resource_type: String,
    /// Search parameters, in the order they are sent.
    pub params: Vec<(String, String)>,
}

impl SearchQuery {
    /// Starts a search on `resource_type`.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            params: Vec::new(),
        }
    }

    /// Appends a search parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Restricts the returned resources to the `id` element.
    #[must_use]
    pub fn ids_only(self) -> Self {
        self.param("_elements", "id")
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.resource_type)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

/// Read-only search access to the backend FHIR API.
///
/// Implementations must be safe for concurrent use by multiple callers; one
/// instance is shared by every checker built for a proxy.
#[async_trait]
pub trait FhirClient: Send + Sync {
    /// Runs a search and returns the matching resource ids.
    async fn search(&self, query: &SearchQuery) -> Result<SearchBundle, BackendError>;
}
