//! Project metadata descriptor.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Metadata of a remote map project, taken from the first element of the
/// project-fetch response. Immutable once created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectDescriptor {
    /// Backend identifier embedded in follow-up endpoint paths. The backend
    /// is inconsistent about the JSON type, so both strings and numbers are
    /// accepted and rendered to a string.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    /// Public project UUID, used to tag the created layer group.
    #[serde(default = "unknown_uuid")]
    pub uuid: String,

    /// Human-readable project name.
    #[serde(default = "unnamed")]
    pub name: String,

    /// Free-form project description.
    #[serde(default)]
    pub description: String,
}

fn unknown_uuid() -> String {
    "unknown".to_string()
}

fn unnamed() -> String {
    "Unnamed".to_string()
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "project id must be a string or number, got {}",
            other
        ))),
    }
}
