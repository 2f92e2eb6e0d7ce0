//! Search result bundles.

use serde::Deserialize;

use super::BackendError;

/// The parts of a FHIR search `Bundle` the engine relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchBundle {
    /// `Bundle.total`, when the server reports it.
    pub total: Option<u64>,
    /// Ids of the returned resources, in response order.
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBundle {
    resource_type: String,
    total: Option<u64>,
    #[serde(default)]
    entry: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    resource: Option<RawResource>,
}

#[derive(Deserialize)]
struct RawResource {
    id: Option<String>,
}

impl SearchBundle {
    /// Bundle with the given ids and a matching total.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        Self {
            total: Some(ids.len() as u64),
            ids,
        }
    }

    /// An empty search result.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_ids(Vec::<String>::new())
    }

    /// Parses a JSON search result.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Parse`] if the payload is not JSON or not a `Bundle`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BackendError> {
        let raw: RawBundle =
            serde_json::from_slice(bytes).map_err(|e| BackendError::Parse(e.to_string()))?;

        if raw.resource_type != "Bundle" {
            return Err(BackendError::Parse(format!(
                "expected a Bundle, got {}",
                raw.resource_type
            )));
        }

        let ids = raw
            .entry
            .into_iter()
            .filter_map(|e| e.resource.and_then(|r| r.id))
            .collect();

        Ok(Self {
            total: raw.total,
            ids,
        })
    }

    /// Returns `true` if at least one resource matched.
    ///
    /// Entries are authoritative; a positive `total` with no entries (for
    /// example `_summary=count`) also counts as a match.
    #[must_use]
    pub fn has_matches(&self) -> bool {
        !self.ids.is_empty() || self.total.is_some_and(|t| t > 0)
    }
}
