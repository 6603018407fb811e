//! Configuration specification types for the provider.
//!
//! This module defines the provider configuration file and the resource
//! schemas it carries. A resource schema is the field-mapping table that
//! drives the generic matcher and codec for one resource kind: which
//! attributes exist, how they are named and shaped on the remote side, which
//! are write-only, which repeated blocks need identity matching, and which
//! blocks are selected by a discriminator.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FabricError, Result};
use crate::value::FieldKind;

/// The root provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider-level settings.
    pub provider: ProviderSettings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Resource schemas.
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
}

/// Provider-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Provider name.
    pub name: String,
    /// Highest resource schema version this deployment accepts.
    ///
    /// Pins a rollout: a resource schema newer than this is refused, so state
    /// is never upgraded past the pinned version. Unset accepts every schema.
    #[serde(default)]
    pub schema_version: Option<u32>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive (e.g. "info", "fabric_provider=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Field-mapping table for one resource kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Resource kind name.
    pub kind: String,
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Plain attributes.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Repeated sub-resources.
    #[serde(default)]
    pub collections: Vec<CollectionSpec>,
    /// Discriminated blocks.
    #[serde(default)]
    pub unions: Vec<UnionSpec>,
}

/// A single attribute mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    /// Declarative attribute name.
    pub name: String,
    /// Remote attribute name (defaults to `name`).
    #[serde(default)]
    pub remote: Option<String>,
    /// Declarative shape.
    pub kind: FieldKind,
    /// Remote shape (defaults to `kind`).
    #[serde(default)]
    pub remote_kind: Option<FieldKind>,
    /// Whether the attribute must be set.
    #[serde(default)]
    pub required: bool,
    /// Server-assigned attribute, always read back from the remote system.
    #[serde(default)]
    pub computed: bool,
    /// Write-only handling, if the remote system never echoes this attribute.
    #[serde(default)]
    pub secret: Option<SecretSpec>,
}

/// Write-only attribute handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretSpec {
    /// Out-of-band credential creation; without it the secret is sent inline.
    #[serde(default)]
    pub credential: Option<CredentialSpec>,
}

/// Out-of-band credential creation for a secret attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialSpec {
    /// Computed attribute of the same block holding the generated identifier.
    pub reference: String,
    /// Credential type passed to the secret store.
    pub credential_type: String,
}

/// Container shape of a repeated block.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerShape {
    /// Ordered sequence; order follows the identity matcher.
    #[default]
    List,
    /// Content-addressed, unordered collection.
    Set,
}

/// A repeated sub-resource that needs identity matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Declarative block name.
    pub name: String,
    /// Remote attribute name (defaults to `name`).
    #[serde(default)]
    pub remote: Option<String>,
    /// Container shape in the current schema.
    #[serde(default)]
    pub shape: ContainerShape,
    /// Schema version that turned this collection into a set.
    #[serde(default)]
    pub set_since: Option<u32>,
    /// Declarative attribute holding the remote identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Remote attribute holding the identifier (defaults to `id_field`).
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Declarative attribute used as natural key.
    #[serde(default)]
    pub key_field: Option<String>,
    /// Whether at least one block must be declared.
    #[serde(default)]
    pub required: bool,
    /// Attributes of each block.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Discriminated blocks nested in each block.
    #[serde(default)]
    pub unions: Vec<UnionSpec>,
}

/// A block whose shape depends on a discriminator attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnionSpec {
    /// Declarative block name.
    pub name: String,
    /// Remote attribute name (defaults to `name`).
    #[serde(default)]
    pub remote: Option<String>,
    /// Declarative discriminator attribute.
    pub discriminator: String,
    /// Remote discriminator attribute (defaults to `discriminator`).
    #[serde(default)]
    pub remote_discriminator: Option<String>,
    /// Whether the block must be declared.
    #[serde(default)]
    pub required: bool,
    /// Allowed discriminator values.
    pub variants: Vec<VariantSpec>,
    /// Mutually exclusive sub-blocks.
    #[serde(default)]
    pub branches: Vec<BranchSpec>,
    /// Attributes that sit next to the discriminator.
    #[serde(default)]
    pub shared: Vec<FieldSpec>,
}

/// One discriminator value and what it activates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantSpec {
    /// Discriminator value.
    pub value: String,
    /// Sub-blocks that must be populated for this value; all others must not.
    #[serde(default)]
    pub branches: Vec<String>,
    /// Shared attributes required for this value.
    #[serde(default)]
    pub required: Vec<String>,
}

/// A mutually exclusive sub-block of a discriminated block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchSpec {
    /// Declarative sub-block name.
    pub name: String,
    /// Remote attribute name (defaults to `name`).
    #[serde(default)]
    pub remote: Option<String>,
    /// Attributes of the sub-block.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

const fn default_version() -> u32 {
    1
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_id_field() -> String {
    String::from("id")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ProviderConfig {
    /// Looks up the schema of a resource kind.
    ///
    /// # Errors
    ///
    /// Returns an error if no schema is registered for `kind`, or if its
    /// version is newer than `provider.schema_version`.
    pub fn resource(&self, kind: &str) -> Result<&ResourceSchema> {
        let schema = self
            .resources
            .iter()
            .find(|r| r.kind == kind)
            .ok_or_else(|| {
                FabricError::Config(ConfigError::UnknownKind {
                    kind: kind.to_string(),
                })
            })?;

        if !self.provider.accepts(schema.version) {
            return Err(FabricError::Config(ConfigError::schema(
                format!(
                    "Schema version {} of '{kind}' is newer than the pinned version",
                    schema.version
                ),
                "provider.schema_version",
            )));
        }
        Ok(schema)
    }

    /// Returns the registered resource kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.kind.as_str()).collect()
    }
}

impl ProviderSettings {
    /// Returns true if a resource schema at `version` may be used.
    #[must_use]
    pub fn accepts(&self, version: u32) -> bool {
        self.schema_version.is_none_or(|max| version <= max)
    }
}

impl ResourceSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(kind: impl Into<String>, version: u32) -> Self {
        Self {
            kind: kind.into(),
            version,
            fields: Vec::new(),
            collections: Vec::new(),
            unions: Vec::new(),
        }
    }

    /// Adds a plain attribute.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a repeated sub-resource.
    #[must_use]
    pub fn with_collection(mut self, collection: CollectionSpec) -> Self {
        self.collections.push(collection);
        self
    }

    /// Adds a discriminated block.
    #[must_use]
    pub fn with_union(mut self, union: UnionSpec) -> Self {
        self.unions.push(union);
        self
    }

    /// Looks up a collection by declarative name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl FieldSpec {
    /// Creates an optional attribute with identical names and shapes on both sides.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            remote: None,
            kind,
            remote_kind: None,
            required: false,
            computed: false,
            secret: None,
        }
    }

    /// Sets the remote attribute name.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Sets the remote shape.
    #[must_use]
    pub fn with_remote_kind(mut self, kind: FieldKind) -> Self {
        self.remote_kind = Some(kind);
        self
    }

    /// Marks the attribute as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the attribute as server-assigned.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Marks the attribute as write-only, sent inline.
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = Some(SecretSpec::default());
        self
    }

    /// Marks the attribute as write-only, stored through the secret store.
    #[must_use]
    pub fn credential(mut self, reference: impl Into<String>, credential_type: impl Into<String>) -> Self {
        self.secret = Some(SecretSpec {
            credential: Some(CredentialSpec {
                reference: reference.into(),
                credential_type: credential_type.into(),
            }),
        });
        self
    }

    /// Returns the remote attribute name.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.name)
    }

    /// Returns the remote shape.
    #[must_use]
    pub fn remote_shape(&self) -> &FieldKind {
        self.remote_kind.as_ref().unwrap_or(&self.kind)
    }

    /// Returns true for write-only attributes.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Returns the credential handling, if any.
    #[must_use]
    pub fn credential_spec(&self) -> Option<&CredentialSpec> {
        self.secret.as_ref().and_then(|s| s.credential.as_ref())
    }
}

impl CollectionSpec {
    /// Creates an ordered collection keyed by `id`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: None,
            shape: ContainerShape::List,
            set_since: None,
            id_field: default_id_field(),
            remote_id: None,
            key_field: None,
            required: false,
            fields: Vec::new(),
            unions: Vec::new(),
        }
    }

    /// Sets the remote attribute name.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Turns the collection into a set as of the given schema version.
    #[must_use]
    pub const fn as_set_since(mut self, version: u32) -> Self {
        self.shape = ContainerShape::Set;
        self.set_since = Some(version);
        self
    }

    /// Sets the natural key attribute.
    #[must_use]
    pub fn with_key(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    /// Marks the collection as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a block attribute.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a nested discriminated block.
    #[must_use]
    pub fn with_union(mut self, union: UnionSpec) -> Self {
        self.unions.push(union);
        self
    }

    /// Returns the remote attribute name.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.name)
    }

    /// Returns the remote identifier attribute name.
    #[must_use]
    pub fn remote_id_name(&self) -> &str {
        self.remote_id.as_deref().unwrap_or(&self.id_field)
    }

    /// Returns the natural key attribute spec, if any.
    #[must_use]
    pub fn key_spec(&self) -> Option<&FieldSpec> {
        let key = self.key_field.as_deref()?;
        self.fields.iter().find(|f| f.name == key)
    }
}

impl UnionSpec {
    /// Creates a discriminated block with no variants.
    #[must_use]
    pub fn new(name: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: None,
            discriminator: discriminator.into(),
            remote_discriminator: None,
            required: false,
            variants: Vec::new(),
            branches: Vec::new(),
            shared: Vec::new(),
        }
    }

    /// Sets the remote attribute name.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Sets the remote discriminator name.
    #[must_use]
    pub fn with_remote_discriminator(mut self, remote: impl Into<String>) -> Self {
        self.remote_discriminator = Some(remote.into());
        self
    }

    /// Marks the block as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a variant activating the named branches.
    #[must_use]
    pub fn with_variant(mut self, value: &str, branches: &[&str], required: &[&str]) -> Self {
        self.variants.push(VariantSpec {
            value: value.to_string(),
            branches: branches.iter().map(|b| (*b).to_string()).collect(),
            required: required.iter().map(|r| (*r).to_string()).collect(),
        });
        self
    }

    /// Adds a sub-block.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchSpec) -> Self {
        self.branches.push(branch);
        self
    }

    /// Adds a shared attribute.
    #[must_use]
    pub fn with_shared(mut self, field: FieldSpec) -> Self {
        self.shared.push(field);
        self
    }

    /// Returns the remote attribute name.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.name)
    }

    /// Returns the remote discriminator name.
    #[must_use]
    pub fn remote_discriminator_name(&self) -> &str {
        self.remote_discriminator.as_deref().unwrap_or(&self.discriminator)
    }

    /// Looks up the variant for a discriminator value.
    #[must_use]
    pub fn variant(&self, value: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.value == value)
    }
}

impl BranchSpec {
    /// Creates an empty sub-block.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: None,
            fields: Vec::new(),
        }
    }

    /// Sets the remote attribute name.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Adds a sub-block attribute.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the remote attribute name.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.name)
    }
}
