//! State types for persisted declarative state.
//!
//! The declarative engine owns storage; this layer only defines the record
//! it persists per resource and how that record is encoded.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};
use crate::hash::RecordHasher;
use crate::value::{FieldMap, Value};

/// Persisted declarative state of one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceState {
    /// Schema version the attributes were written under.
    pub schema_version: u32,
    /// Resource kind.
    pub kind: String,
    /// The flattened projection.
    #[serde(default)]
    pub attributes: FieldMap,
}

impl ResourceState {
    /// Creates a state record.
    #[must_use]
    pub fn new(kind: &str, schema_version: u32, attributes: FieldMap) -> Self {
        Self {
            schema_version,
            kind: kind.to_string(),
            attributes,
        }
    }

    /// Decodes a state record from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid state record.
    pub fn from_json(content: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(content).map_err(|e| StateError::Corrupted {
            message: format!("Failed to parse state: {e}"),
        })?;

        if state.kind.is_empty() {
            return Err(StateError::Corrupted {
                message: String::from("State has no resource kind"),
            }
            .into());
        }
        Ok(state)
    }

    /// Encodes the state record as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            StateError::SerializationError {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Returns the content hash of the attributes.
    #[must_use]
    pub fn attributes_hash(&self) -> String {
        RecordHasher::new().hash_value(&Value::Map(self.attributes.clone()))
    }

    /// Returns true if the state was written under an older schema.
    #[must_use]
    pub const fn needs_upgrade(&self, current_version: u32) -> bool {
        self.schema_version < current_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FabricError;

    fn state() -> ResourceState {
        let mut attributes = FieldMap::new();
        attributes.insert(String::from("name"), Value::from("edge-east"));
        attributes.insert(
            String::from("instance"),
            Value::List(vec![Value::Map(FieldMap::from([
                (String::from("id"), Value::Int(7)),
                (String::from("hostname"), Value::from("edge-1")),
            ]))]),
        );
        ResourceState::new("connector_edge", 3, attributes)
    }

    #[test]
    fn test_json_round_trip() {
        let encoded = state().to_json().unwrap();
        assert_eq!(ResourceState::from_json(&encoded).unwrap(), state());
    }

    #[test]
    fn test_corrupted_state() {
        assert!(matches!(
            ResourceState::from_json("{\"schema_version\": 1"),
            Err(FabricError::State(StateError::Corrupted { .. }))
        ));
        assert!(ResourceState::from_json(r#"{"schema_version": 1, "kind": ""}"#).is_err());
    }

    #[test]
    fn test_attributes_hash_ignores_encoding_order() {
        let json = r#"{"kind": "connector_edge", "schema_version": 3,
            "attributes": {"instance": [{"hostname": "edge-1", "id": 7}], "name": "edge-east"}}"#;
        let decoded = ResourceState::from_json(json).unwrap();
        assert_eq!(decoded.attributes_hash(), state().attributes_hash());
    }

    #[test]
    fn test_needs_upgrade() {
        assert!(state().needs_upgrade(4));
        assert!(!state().needs_upgrade(3));
    }
}
