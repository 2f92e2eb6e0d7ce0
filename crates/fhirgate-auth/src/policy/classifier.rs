//! Request classification.
//!
//! Classification only looks at the method and at whether an id, body or
//! search parameters are present. Bodies are parsed later, and only by the
//! strategy that needs them.

use std::fmt;

use super::request::IncomingRequest;

/// How the patient anchor of a request is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Path-addressed read, update or delete of a single resource.
    DirectId,
    /// Type-level search; the patient comes from search parameters.
    Search,
    /// Create or update carrying a resource body.
    BodyWrite,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectId => write!(f, "direct-id"),
            Self::Search => write!(f, "search"),
            Self::BodyWrite => write!(f, "body-write"),
        }
    }
}

/// Picks the [`Strategy`] for a request.
///
/// 1. Write method with a body, or without an id: [`Strategy::BodyWrite`]
/// 2. Id present: [`Strategy::DirectId`]
/// 3. Otherwise: [`Strategy::Search`]
#[must_use]
pub fn classify(request: &IncomingRequest) -> Strategy {
    let has_id = request.resource_id.is_some();

    if request.method.is_write() && (request.has_body() || !has_id) {
        Strategy::BodyWrite
    } else if has_id {
        Strategy::DirectId
    } else {
        Strategy::Search
    }
}
