//! Access decision values.

use std::fmt;

use serde::Serialize;

// =============================================================================
// Access Decision
// =============================================================================

/// Outcome of one access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Alias of [`is_allowed`](Self::is_allowed).
    #[must_use]
    pub fn can_access(&self) -> bool {
        self.is_allowed()
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }
}

impl From<DenyReason> for AccessDecision {
    fn from(reason: DenyReason) -> Self {
        Self::Deny(reason)
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny(reason) => write!(f, "deny ({reason})"),
        }
    }
}

// =============================================================================
// Deny Reason
// =============================================================================

/// Reason for access denial. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Stable code for programmatic handling.
    pub code: String,

    /// Human-readable message.
    pub message: String,
}

impl DenyReason {
    /// The requested List is not the caller's compartment list.
    #[must_use]
    pub fn list_mismatch(requested: &str) -> Self {
        Self {
            code: "list-mismatch".to_string(),
            message: format!("List/{requested} is not the caller's compartment list"),
        }
    }

    /// Nothing in the request names a patient.
    #[must_use]
    pub fn no_patient_reference(resource_type: &str) -> Self {
        Self {
            code: "no-patient-reference".to_string(),
            message: format!("No patient reference found in {resource_type} request"),
        }
    }

    /// None of the referenced patients is in the caller's compartment.
    #[must_use]
    pub fn not_in_compartment(candidates: usize) -> Self {
        Self {
            code: "not-in-compartment".to_string(),
            message: format!(
                "None of {candidates} referenced patient(s) is in the caller's compartment"
            ),
        }
    }

    /// No extraction rule exists for the resource type.
    #[must_use]
    pub fn unsupported_resource_type(resource_type: &str) -> Self {
        Self {
            code: "unsupported-resource-type".to_string(),
            message: format!("Resource type {resource_type} is not covered by compartment rules"),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow() {
        let decision = AccessDecision::Allow;
        assert!(decision.is_allowed());
        assert!(decision.can_access());
        assert!(!decision.is_denied());
        assert!(decision.deny_reason().is_none());
        assert_eq!(decision.to_string(), "allow");
    }

    #[test]
    fn test_deny() {
        let decision = AccessDecision::from(DenyReason::list_mismatch("other-id"));
        assert!(!decision.can_access());
        assert!(decision.is_denied());
        assert_eq!(decision.deny_reason().unwrap().code, "list-mismatch");
        assert_eq!(
            decision.to_string(),
            "deny (list-mismatch: List/other-id is not the caller's compartment list)"
        );
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(AccessDecision::Deny(
            DenyReason::unsupported_resource_type("Organization"),
        ))
        .unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["code"], "unsupported-resource-type");

        let json = serde_json::to_value(AccessDecision::Allow).unwrap();
        assert_eq!(json, serde_json::json!({"decision": "allow"}));
    }
}
