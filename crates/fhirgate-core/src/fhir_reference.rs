//! FHIR reference parsing.
//!
//! References show up in resource bodies (`{"reference": "Patient/123"}`) and in
//! search parameter values (`subject=Patient/123`). Only local references can
//! anchor an access decision, so everything else is reported as
//! [`UnresolvableReference`] and dropped by callers.
//!
//! Accepted local forms:
//! - Relative: `Patient/123`
//! - Versioned: `Patient/123/_history/1`
//! - Absolute URL on the configured base: `https://fhir.example.com/Patient/123`
//!
//! # Example
//!
//! ```
//! use fhirgate_core::fhir_reference::parse_reference;
//!
//! let reference = parse_reference("Patient/123/_history/2", None).unwrap();
//! assert_eq!(reference.resource_type, "Patient");
//! assert_eq!(reference.id, "123");
//! assert_eq!(reference.version.as_deref(), Some("2"));
//! ```

use std::fmt;

use crate::id::is_valid_id;

/// A local FHIR reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirReference {
    /// Resource type, e.g. `Patient`.
    pub resource_type: String,
    /// Logical id.
    pub id: String,
    /// Version from a `_history` suffix.
    pub version: Option<String>,
}

impl FhirReference {
    /// Creates an unversioned reference.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Returns `true` if this reference points at the given resource type.
    #[must_use]
    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type == resource_type
    }
}

impl fmt::Display for FhirReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A reference that cannot be resolved against the local server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnresolvableReference {
    /// `#id`, points into the enclosing resource.
    #[error("contained reference: #{0}")]
    Contained(String),
    /// `urn:uuid:..` / `urn:oid:..`.
    #[error("URN reference: {0}")]
    Urn(String),
    /// Absolute URL on another server.
    #[error("external reference: {0}")]
    External(String),
    /// Anything else that does not look like `Type/id`.
    #[error("invalid reference: {0}")]
    Invalid(String),
}

/// Parses a reference string.
///
/// `base_url` is the public base of the backend. Absolute URLs under it are
/// treated as local; all other absolute URLs are [`UnresolvableReference::External`].
///
/// # Errors
///
/// Returns [`UnresolvableReference`] when the value is not a local `Type/id`
/// reference with a valid FHIR id.
pub fn parse_reference(
    reference: &str,
    base_url: Option<&str>,
) -> Result<FhirReference, UnresolvableReference> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(UnresolvableReference::Invalid("empty reference".to_string()));
    }

    if let Some(contained) = reference.strip_prefix('#') {
        return Err(UnresolvableReference::Contained(contained.to_string()));
    }

    if reference.starts_with("urn:") {
        return Err(UnresolvableReference::Urn(reference.to_string()));
    }

    let path = if reference.contains("://") {
        let Some(base) = base_url else {
            return Err(UnresolvableReference::External(reference.to_string()));
        };
        match reference.strip_prefix(base.trim_end_matches('/')) {
            Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => return Err(UnresolvableReference::External(reference.to_string())),
        }
    } else {
        reference
    };

    let mut segments = path.split('/');
    let (Some(resource_type), Some(id)) = (segments.next(), segments.next()) else {
        return Err(UnresolvableReference::Invalid(format!(
            "expected Type/id: {reference}"
        )));
    };

    if !resource_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        || !resource_type.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(UnresolvableReference::Invalid(format!(
            "bad resource type: {resource_type}"
        )));
    }

    if !is_valid_id(id) {
        return Err(UnresolvableReference::Invalid(format!("bad id: {id}")));
    }

    let version = match (segments.next(), segments.next()) {
        (Some("_history"), Some(v)) if !v.is_empty() => Some(v.to_string()),
        (None, _) => None,
        _ => {
            return Err(UnresolvableReference::Invalid(format!(
                "unexpected path after id: {reference}"
            )));
        }
    };

    Ok(FhirReference {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        version,
    })
}
