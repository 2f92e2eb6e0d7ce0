//! Access engine error types.
//!
//! A denied request is not an error: it is an
//! [`AccessDecision::Deny`](crate::policy::AccessDecision::Deny). Errors are
//! reserved for conditions where no decision can be rendered at all.

use std::fmt;

use crate::backend::BackendError;

/// Errors raised while building a checker or rendering a decision.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The caller's compartment claim is missing or malformed, or the engine
    /// configuration is unusable. The caller cannot be authorized.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The membership or existence query did not complete.
    ///
    /// Never coerced into allow or deny; the proxy picks the safe default.
    #[error("Backend unavailable: {source}")]
    BackendUnavailable {
        /// Underlying query failure.
        #[from]
        source: BackendError,
    },

    /// The inbound request could not be turned into an [`IncomingRequest`].
    ///
    /// [`IncomingRequest`]: crate::policy::IncomingRequest
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },
}

impl AccessError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns `true` if the backend could not be queried.
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::BackendUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
        }
    }
}

/// Categories of engine errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Checker could not be constructed for this caller.
    Configuration,
    /// Backend query failures.
    Infrastructure,
    /// Malformed inbound requests.
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Validation => write!(f, "validation"),
        }
    }
}
