//! Block and entity types exchanged between the matcher and the codec.
//!
//! A [`DeclaredBlock`] is one element of a repeated block as authored by the
//! user, a [`RemoteEntity`] is one element of the collection returned by the
//! remote system, and a [`ReconciledBlock`] is the pairing of the two that the
//! identity matcher produces each cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{FieldMap, Value};

/// Remote-assigned identifier, unique within its parent resource.
///
/// Identifiers are opaque: numeric identifiers are carried as their decimal
/// text. The empty string and `"0"` both mean "not assigned yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

/// One element of a repeated block as authored by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeclaredBlock {
    /// Index in the declared sequence.
    pub position: usize,
    /// Remote identifier, present after a successful creation.
    pub primary_key: Option<Identifier>,
    /// Natural key usable as a fallback correlation key.
    pub secondary_key: Option<String>,
    /// Remote-visible attributes.
    pub fields: FieldMap,
    /// Write-only attributes the remote system never returns.
    pub secret_fields: FieldMap,
}

/// One element of the collection returned by the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteEntity {
    /// Authoritative remote identifier.
    pub id: Identifier,
    /// Natural key echoed by the remote system.
    pub secondary_key: String,
    /// Remote-visible attributes, keyed by remote attribute name.
    pub fields: FieldMap,
}

/// How a reconciled block was paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrigin {
    /// Paired through the declared primary key.
    PrimaryKey,
    /// Paired through the natural key.
    SecondaryKey,
    /// Remote entity with no declared counterpart.
    Unmatched,
}

/// Matcher output: a remote entity enriched with declared secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledBlock {
    /// Position in the declarative projection.
    pub position: usize,
    /// Remote identifier.
    pub id: Identifier,
    /// Natural key as echoed by the remote system.
    pub secondary_key: String,
    /// Remote-visible attributes taken from the remote entity.
    pub fields: FieldMap,
    /// Secrets carried over from the matched declared block.
    pub secret_fields: FieldMap,
    /// How this block was paired.
    pub origin: MatchOrigin,
}

impl Identifier {
    /// Creates an identifier from its text form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier holds an assigned, non-zero value.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && !trimmed.bytes().all(|b| b == b'0')
    }

    /// Reads an identifier from an attribute value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.to_key_string().map(Self)
    }

    /// Renders the identifier as a value, numeric when the text is an integer.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.0
            .parse::<i64>()
            .map_or_else(|_| Value::String(self.0.clone()), Value::Int)
    }
}

impl DeclaredBlock {
    /// Creates an empty declared block at the given position.
    #[must_use]
    pub fn new(position: usize) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Sets the primary key.
    #[must_use]
    pub fn with_primary_key(mut self, id: impl Into<Identifier>) -> Self {
        self.primary_key = Some(id.into());
        self
    }

    /// Sets the natural key.
    #[must_use]
    pub fn with_secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary_key = Some(key.into());
        self
    }

    /// Adds a remote-visible attribute.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds a write-only attribute.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.secret_fields.insert(name.into(), value.into());
        self
    }

    /// Returns the primary key when it is usable for matching.
    #[must_use]
    pub fn assigned_primary_key(&self) -> Option<&Identifier> {
        self.primary_key.as_ref().filter(|id| id.is_assigned())
    }

    /// Returns the natural key when it is usable for matching.
    #[must_use]
    pub fn usable_secondary_key(&self) -> Option<&str> {
        self.secondary_key.as_deref().filter(|key| !key.is_empty())
    }
}

impl RemoteEntity {
    /// Creates a remote entity.
    #[must_use]
    pub fn new(id: impl Into<Identifier>, secondary_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secondary_key: secondary_key.into(),
            fields: FieldMap::new(),
        }
    }

    /// Adds a remote-visible attribute.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl ReconciledBlock {
    /// Pairs a remote entity with the declared block it matched.
    #[must_use]
    pub fn matched(declared: &DeclaredBlock, remote: &RemoteEntity, origin: MatchOrigin) -> Self {
        Self {
            position: declared.position,
            id: remote.id.clone(),
            secondary_key: remote.secondary_key.clone(),
            fields: remote.fields.clone(),
            secret_fields: declared.secret_fields.clone(),
            origin,
        }
    }

    /// Wraps a remote entity that has no declared counterpart.
    #[must_use]
    pub fn unmatched(remote: &RemoteEntity, position: usize) -> Self {
        Self {
            position,
            id: remote.id.clone(),
            secondary_key: remote.secondary_key.clone(),
            fields: remote.fields.clone(),
            secret_fields: FieldMap::new(),
            origin: MatchOrigin::Unmatched,
        }
    }

    /// Returns true if this block originated from user input.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        !matches!(self.origin, MatchOrigin::Unmatched)
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PrimaryKey => "primary key",
            Self::SecondaryKey => "secondary key",
            Self::Unmatched => "unmatched",
        };
        write!(f, "{s}")
    }
}
