//! The datafile value type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parsed configuration document.
///
/// Structurally a JSON object. Once obtained it is never mutated; it is shared as
/// `Arc<Datafile>` between the source, the manager cache and the managed client.
///
/// # Examples
///
/// ```rust
/// use managed_datafile::core::Datafile;
///
/// let datafile = Datafile::from_json(r#"{"revision": "42", "version": "4"}"#).unwrap();
/// assert_eq!(datafile.revision(), Some("42"));
/// assert!(Datafile::from_json("[1, 2]").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datafile(Map<String, Value>);

impl Datafile {
    /// Parse a datafile from a JSON body. The root must be an object.
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The document's `revision` field, when present as a string.
    pub fn revision(&self) -> Option<&str> {
        self.0.get("revision").and_then(Value::as_str)
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the datafile, returning the underlying mapping.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Datafile {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Datafile {
    type Error = Value;

    /// Accepts only JSON objects; any other value is handed back.
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
