//! Claim lookup over decoded token payloads.

use jsonwebtoken::TokenData;
use serde_json::{Map, Value};

use crate::error::AccessError;

/// Read access to the claims of a decoded, verified token.
pub trait ClaimReader {
    /// Returns the raw value of claim `name`, if present.
    fn claim(&self, name: &str) -> Option<&Value>;
}

impl ClaimReader for Map<String, Value> {
    fn claim(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl ClaimReader for Value {
    fn claim(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|claims| claims.get(name))
    }
}

impl ClaimReader for TokenData<Value> {
    fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.claim(name)
    }
}

impl<T: ClaimReader + ?Sized> ClaimReader for &T {
    fn claim(&self, name: &str) -> Option<&Value> {
        (**self).claim(name)
    }
}

/// Reads claim `name` as a string.
///
/// # Errors
///
/// Returns [`AccessError::Configuration`] if the claim is missing, null or
/// not a string.
pub fn string_claim<'a, R: ClaimReader + ?Sized>(
    token: &'a R,
    name: &str,
) -> Result<&'a str, AccessError> {
    match token.claim(name) {
        Some(Value::String(value)) => Ok(value.as_str()),
        None | Some(Value::Null) => Err(AccessError::configuration(format!(
            "token has no `{name}` claim"
        ))),
        Some(other) => Err(AccessError::configuration(format!(
            "token claim `{name}` must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
