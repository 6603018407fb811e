//! Typed attribute values.
//!
//! Every attribute that crosses the declarative/remote boundary is carried as
//! a [`Value`]. Absence is a missing map key; there is no null.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::hash::RecordHasher;

/// Attribute map keyed by attribute name, enumerated in sorted order.
pub type FieldMap = BTreeMap<String, Value>;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Text value.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Nested attribute map.
    Map(FieldMap),
}

/// The shape an attribute takes on one side of the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Text.
    String,
    /// Integer.
    Int,
    /// Boolean.
    Bool,
    /// Ordered sequence of the inner kind.
    List(Box<FieldKind>),
    /// Unordered, de-duplicated collection of the inner kind.
    Set(Box<FieldKind>),
    /// Free-form nested map.
    Map,
}

/// A value could not be converted to the requested kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Kind that was requested.
    pub expected: String,
    /// Kind (and value, for scalars) that was found.
    pub found: String,
}

impl Value {
    /// Returns the string content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the nested map, if this is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Returns true for empty strings, lists and maps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    /// Renders a scalar as identifier text; collections yield `None`.
    #[must_use]
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Converts this value to the given kind.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] if no lossless conversion exists.
    pub fn coerce(&self, kind: &FieldKind) -> Result<Self, CoercionError> {
        match (kind, self) {
            (FieldKind::String, Self::String(_))
            | (FieldKind::Int, Self::Int(_))
            | (FieldKind::Bool, Self::Bool(_))
            | (FieldKind::Map, Self::Map(_)) => Ok(self.clone()),

            (FieldKind::String, Self::Int(i)) => Ok(Self::String(i.to_string())),
            (FieldKind::String, Self::Bool(b)) => Ok(Self::String(b.to_string())),

            (FieldKind::Int, Self::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| CoercionError::new(kind, self)),

            (FieldKind::Bool, Self::String(s)) => match s.trim() {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                _ => Err(CoercionError::new(kind, self)),
            },

            (FieldKind::List(inner), Self::List(items)) => items
                .iter()
                .map(|item| item.coerce(inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),

            (FieldKind::Set(inner), Self::List(items)) => {
                let coerced = items
                    .iter()
                    .map(|item| item.coerce(inner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::List(canonical_set(coerced)))
            }

            _ => Err(CoercionError::new(kind, self)),
        }
    }

    /// Converts a JSON payload into a value.
    ///
    /// JSON nulls are dropped from objects and arrays. Returns `None` for a
    /// top-level null or for numbers that are not 64-bit integers.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_null() {
                        continue;
                    }
                    out.push(Self::from_json(item)?);
                }
                Some(Self::List(out))
            }
            serde_json::Value::Object(map) => {
                let mut out = FieldMap::new();
                for (key, item) in map {
                    if item.is_null() {
                        continue;
                    }
                    out.insert(key.clone(), Self::from_json(item)?);
                }
                Some(Self::Map(out))
            }
        }
    }

    /// Converts this value into a JSON payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// De-duplicates values and orders them by content hash.
///
/// This is the enumeration order of every set-shaped attribute, shared by the
/// flatten path and the state migrator.
#[must_use]
pub fn canonical_set(values: Vec<Value>) -> Vec<Value> {
    let hasher = RecordHasher::new();
    let keyed: BTreeMap<String, Value> = values
        .into_iter()
        .map(|value| (hasher.hash_value(&value), value))
        .collect();
    keyed.into_values().collect()
}

impl FieldKind {
    /// Returns the empty value of this kind.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Int => Value::Int(0),
            Self::Bool => Value::Bool(false),
            Self::List(_) | Self::Set(_) => Value::List(Vec::new()),
            Self::Map => Value::Map(FieldMap::new()),
        }
    }

    /// Returns true for set-shaped kinds.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

impl CoercionError {
    fn new(kind: &FieldKind, value: &Value) -> Self {
        let found = match value {
            Value::String(s) => format!("string \"{s}\""),
            Value::Int(i) => format!("int {i}"),
            Value::Bool(b) => format!("bool {b}"),
            other => other.type_name().to_string(),
        };
        Self {
            expected: kind.to_string(),
            found,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::List(inner) => write!(f, "list({inner})"),
            Self::Set(inner) => write!(f, "set({inner})"),
            Self::Map => write!(f, "map"),
        }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<FieldMap> for Value {
    fn from(map: FieldMap) -> Self {
        Self::Map(map)
    }
}
