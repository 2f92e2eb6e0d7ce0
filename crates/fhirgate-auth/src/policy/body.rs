//! Resource body parsing.
//!
//! Only what is needed to find references is read: the declared
//! `resourceType`, the `id`, and reference values at configured paths.

use serde_json::Value;

/// Why a body could not be used for reference extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    /// Not a JSON object.
    #[error("Malformed resource body: {0}")]
    Malformed(String),

    /// The object has no string `resourceType`.
    #[error("Resource body has no resourceType")]
    MissingResourceType,

    /// The body declares a different type than the request path.
    #[error("Resource type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type named by the request path.
        expected: String,
        /// Type declared in the body.
        found: String,
    },
}

/// A parsed resource body whose type matched the request.
#[derive(Debug, Clone)]
pub struct ParsedResource {
    resource: Value,
}

impl ParsedResource {
    /// Parses `bytes` and checks the declared type against `expected_type`.
    ///
    /// # Errors
    ///
    /// [`BodyError::TypeMismatch`] if the declared type differs from
    /// `expected_type`; other variants if the body is not a resource at all.
    pub fn parse(bytes: &[u8], expected_type: &str) -> Result<Self, BodyError> {
        let resource: Value =
            serde_json::from_slice(bytes).map_err(|e| BodyError::Malformed(e.to_string()))?;

        if !resource.is_object() {
            return Err(BodyError::Malformed("expected a JSON object".to_string()));
        }

        let found = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(BodyError::MissingResourceType)?;

        if found != expected_type {
            return Err(BodyError::TypeMismatch {
                expected: expected_type.to_string(),
                found: found.to_string(),
            });
        }

        Ok(Self { resource })
    }

    /// `id`, if the body carries one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.resource.get("id").and_then(Value::as_str)
    }

    /// Reference strings found at a dotted `path`.
    ///
    /// Arrays are traversed at every level, so `performer` and
    /// `participant.individual` both work for single- and multi-valued
    /// elements. A reference is either a `Reference` object's `reference`
    /// string or a bare string.
    #[must_use]
    pub fn references(&self, path: &str) -> Vec<&str> {
        let mut current: Vec<&Value> = vec![&self.resource];
        for segment in path.split('.') {
            let mut next = Vec::new();
            for value in current {
                if let Some(child) = value.get(segment) {
                    flatten(child, &mut next);
                }
            }
            current = next;
        }

        current
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) => value.get("reference").and_then(Value::as_str),
                _ => None,
            })
            .collect()
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        other => out.push(other),
    }
}
