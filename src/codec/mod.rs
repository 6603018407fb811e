//! Bidirectional codec between declarative state and remote payloads.
//!
//! - **Expand** turns the user's declared attributes into a remote request,
//!   validating discriminated blocks and creating credentials for secrets
//!   that have none yet.
//! - **Flatten** turns a remote response back into the declarative
//!   projection, running the identity matcher over repeated blocks so that
//!   ordering stays stable and secrets survive.
//!
//! Both directions are driven by a [`ResourceSchema`](crate::config::ResourceSchema).

mod discriminated;
mod expand;
mod flatten;
mod secrets;

pub use flatten::Flattened;
pub use secrets::{CreatedCredential, NoSecretStore, SecretRequest, SecretStore};

use crate::config::ResourceSchema;
use crate::matcher::IdentityMatcher;
use crate::value::{FieldMap, Value};

/// Codec for one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    /// Field-mapping table.
    schema: &'a ResourceSchema,
    /// Matcher used for repeated blocks.
    matcher: IdentityMatcher,
}

/// Request payload bound for the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    /// Resource kind.
    pub kind: String,
    /// Attributes keyed by remote name.
    pub body: FieldMap,
    /// Credentials created while building the request.
    pub credentials: Vec<CreatedCredential>,
}

impl<'a> Codec<'a> {
    /// Creates a codec for the given schema.
    #[must_use]
    pub const fn new(schema: &'a ResourceSchema) -> Self {
        Self {
            schema,
            matcher: IdentityMatcher::new(),
        }
    }

    /// Returns the schema driving this codec.
    #[must_use]
    pub const fn schema(&self) -> &'a ResourceSchema {
        self.schema
    }
}

impl RemoteRequest {
    /// Renders the request body as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.body.clone()).to_json()
    }
}

/// Joins an attribute name onto a path.
fn child(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Appends an element index to a path.
fn indexed(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(child("", "instance"), "instance");
        assert_eq!(child(&indexed("instance", 2), "psk"), "instance[2].psk");
    }
}
