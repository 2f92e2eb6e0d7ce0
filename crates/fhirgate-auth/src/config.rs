//! Access engine configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! list_claim = "patient_list"
//!
//! [backend]
//! base_url = "https://fhir.example.com/r4"
//! request_timeout = "10s"
//!
//! [rules.Encounter]
//! search_params = ["subject", "patient"]
//! reference_paths = ["subject", "participant.individual"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default name of the claim carrying the caller's compartment List id.
pub const DEFAULT_LIST_CLAIM: &str = "patient_list";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid TOML for [`AccessConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Root configuration for the access engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Token claim holding the caller's compartment List id.
    pub list_claim: String,

    /// Backend FHIR API the membership queries go to.
    pub backend: BackendConfig,

    /// Extra or overriding extraction rules, keyed by resource type.
    pub rules: BTreeMap<String, ReferenceRuleConfig>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            list_claim: DEFAULT_LIST_CLAIM.to_string(),
            backend: BackendConfig::default(),
            rules: BTreeMap::new(),
        }
    }
}

impl AccessConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded access config");
        Self::from_toml_str(&content)
    }

    /// Sets the compartment claim name.
    #[must_use]
    pub fn with_list_claim(mut self, claim: impl Into<String>) -> Self {
        self.list_claim = claim.into();
        self
    }

    /// Sets the backend configuration.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Adds an extraction rule for a resource type.
    #[must_use]
    pub fn with_rule(mut self, resource_type: impl Into<String>, rule: ReferenceRuleConfig) -> Self {
        self.rules.insert(resource_type.into(), rule);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list_claim.trim().is_empty() {
            return Err(ConfigError::invalid("list_claim must not be empty"));
        }

        self.backend.validate()?;

        for (resource_type, rule) in &self.rules {
            if matches!(resource_type.as_str(), "Patient" | "List") {
                return Err(ConfigError::invalid(format!(
                    "rules.{resource_type}: Patient and List access is built in and cannot be overridden"
                )));
            }
            if !resource_type
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase())
            {
                return Err(ConfigError::invalid(format!(
                    "rules.{resource_type}: resource type must start with an uppercase letter"
                )));
            }
            if rule.search_params.is_empty() && rule.reference_paths.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "rules.{resource_type}: needs at least one search param or reference path"
                )));
            }
        }

        Ok(())
    }
}

/// Backend FHIR API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the FHIR API, e.g. `https://fhir.example.com/r4`.
    pub base_url: Url,

    /// Per-request timeout for membership queries.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum accepted response body size in bytes.
    pub max_response_size: usize,

    /// Permit plain `http` base URLs. Testing only.
    pub allow_http: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://localhost:8443/fhir").expect("default base url is valid"),
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl BackendConfig {
    /// Creates a backend configuration for `base_url` with default limits.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Allows plain HTTP base URLs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.base_url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => {
                return Err(ConfigError::invalid(
                    "backend.base_url uses http; set backend.allow_http = true to permit it",
                ));
            }
            other => {
                return Err(ConfigError::invalid(format!(
                    "backend.base_url has unsupported scheme `{other}`"
                )));
            }
        }
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::invalid("backend.base_url cannot be a base URL"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("backend.request_timeout must be > 0"));
        }
        if self.max_response_size == 0 {
            return Err(ConfigError::invalid("backend.max_response_size must be > 0"));
        }
        Ok(())
    }
}

/// Extraction rule for one compartment-owned resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceRuleConfig {
    /// Search parameters naming the patient (e.g. `subject`).
    pub search_params: Vec<String>,

    /// Dotted body paths holding references (e.g. `performer`, `participant.individual`).
    pub reference_paths: Vec<String>,
}
