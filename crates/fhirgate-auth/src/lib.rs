//! # fhirgate-auth
//!
//! Access decision engine for a FHIR reverse proxy.
//!
//! Callers present a verified token naming their compartment: a `List`
//! resource on the backend whose items are the patients they may access.
//! For each inbound request the engine works out which patients the request
//! touches and asks the backend whether any of them is in that list.
//!
//! ## Overview
//!
//! Decisions are fail-closed. A request that cannot be tied to a patient is
//! denied; a backend that cannot be reached is an error, never a decision.
//!
//! ## Modules
//!
//! - [`config`] - Engine configuration (claim name, backend, extraction rules)
//! - [`policy`] - Request classification, reference extraction and the checker
//! - [`backend`] - Backend search client trait and its HTTP implementation
//! - [`token`] - Claim lookup on verified tokens
//! - [`error`] - Engine errors

pub mod backend;
pub mod config;
pub mod error;
pub mod policy;
pub mod token;

pub use backend::{BackendError, FhirClient, HttpFhirClient, SearchBundle, SearchQuery};
pub use config::{AccessConfig, BackendConfig, ConfigError, ReferenceRuleConfig};
pub use error::{AccessError, ErrorCategory};
pub use policy::{
    AccessChecker, AccessCheckerFactory, AccessDecision, DenyReason, HttpMethod, IncomingRequest,
    PatientReference, ReferenceExtractor, ReferenceRule, ReferenceRules, Strategy,
};
pub use token::ClaimReader;

/// Type alias for access engine results.
pub type AccessResult<T> = Result<T, AccessError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use fhirgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AccessResult;
    pub use crate::backend::{BackendError, FhirClient, HttpFhirClient, SearchBundle, SearchQuery};
    pub use crate::config::{AccessConfig, BackendConfig, ConfigError};
    pub use crate::error::{AccessError, ErrorCategory};
    pub use crate::policy::{
        AccessChecker, AccessCheckerFactory, AccessDecision, DenyReason, HttpMethod,
        IncomingRequest,
    };
    pub use crate::token::ClaimReader;
}
