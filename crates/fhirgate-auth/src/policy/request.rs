//! Inbound request accessor.
//!
//! The proxy hands the engine a read-only [`IncomingRequest`]. It is either
//! assembled field by field or parsed from the FHIR-relative request target:
//!
//! ```
//! use fhirgate_auth::policy::{HttpMethod, IncomingRequest};
//!
//! let request = IncomingRequest::from_path(HttpMethod::Get, "Observation?subject=Patient/p1", None)?;
//! assert_eq!(request.resource_type, "Observation");
//! assert_eq!(request.search_param("subject"), Some(&["Patient/p1".to_string()][..]));
//! # Ok::<(), fhirgate_auth::AccessError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use url::form_urlencoded;

use crate::error::AccessError;

/// HTTP method of the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Returns `true` for methods that carry a resource body to the backend.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// Upper-case method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(AccessError::invalid_request(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

/// Search parameters in arrival order; a repeated name collects every value.
pub type SearchParams = IndexMap<String, Vec<String>>;

/// A request as seen by the access engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Resource type addressed by the path, e.g. `Observation`.
    pub resource_type: String,
    /// Resource id when the path addresses a single resource.
    pub resource_id: Option<String>,
    /// Search parameters from the query string.
    pub search_params: SearchParams,
    /// Raw request body.
    pub body: Option<Vec<u8>>,
}

impl IncomingRequest {
    /// Creates a request with no id, parameters or body.
    pub fn new(method: HttpMethod, resource_type: impl Into<String>) -> Self {
        Self {
            method,
            resource_type: resource_type.into(),
            resource_id: None,
            search_params: SearchParams::new(),
            body: None,
        }
    }

    /// Sets the addressed resource id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Adds a value for search parameter `name`.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Parses a FHIR-relative target such as `Patient/123` or `Observation?subject=p1`.
    ///
    /// A leading `/` is ignored. Query values are percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidRequest`] if the target has no resource
    /// type, the resource type is not capitalized, or the path has more than
    /// two segments.
    pub fn from_path(
        method: HttpMethod,
        target: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Self, AccessError> {
        let target = target.trim().trim_start_matches('/');
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let resource_type = segments
            .next()
            .ok_or_else(|| AccessError::invalid_request("request path has no resource type"))?;
        if !resource_type
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
        {
            return Err(AccessError::invalid_request(format!(
                "invalid resource type: {resource_type}"
            )));
        }
        let resource_id = segments.next().map(str::to_string);
        if let Some(extra) = segments.next() {
            return Err(AccessError::invalid_request(format!(
                "unsupported path segment `{extra}` in {path}"
            )));
        }

        let mut request = Self::new(method, resource_type);
        request.resource_id = resource_id;
        request.body = body;

        if let Some(query) = query {
            for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                request
                    .search_params
                    .entry(name.into_owned())
                    .or_default()
                    .push(value.into_owned());
            }
        }

        Ok(request)
    }

    /// Values of search parameter `name`.
    #[must_use]
    pub fn search_param(&self, name: &str) -> Option<&[String]> {
        self.search_params.get(name).map(Vec::as_slice)
    }

    /// Returns `true` if a non-empty body is attached.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|b| !b.is_empty())
    }
}
