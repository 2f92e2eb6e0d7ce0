//! FHIR logical id validation.
//!
//! Ids are 1-64 characters from `A-Z a-z 0-9 - .`
//! (<https://hl7.org/fhir/R4/datatypes.html#id>).

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("id regex is valid")
});

/// Why a string is not a FHIR id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The id is the empty string.
    #[error("id must not be empty")]
    Empty,

    /// The id is longer than 64 characters.
    #[error("id exceeds 64 characters: {0}")]
    TooLong(String),

    /// The id contains a character outside `[A-Za-z0-9-.]`.
    #[error("id contains characters outside [A-Za-z0-9-.]: {0}")]
    InvalidCharacters(String),
}

/// Returns `true` if `id` is a well-formed FHIR id.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    ID_REGEX.is_match(id)
}

/// Validates a FHIR id, reporting why it is malformed.
///
/// # Errors
///
/// Returns the first [`IdError`] found: emptiness, then length, then
/// characters.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.chars().count() > 64 {
        return Err(IdError::TooLong(id.to_string()));
    }
    if !is_valid_id(id) {
        return Err(IdError::InvalidCharacters(id.to_string()));
    }
    Ok(())
}
