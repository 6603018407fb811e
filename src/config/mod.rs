//! Configuration module for the provider.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `fabric.provider.yaml`
//! - Resource schemas (field-mapping tables) driving the codec
//! - Validation of those schemas

mod spec;
mod parser;
mod validator;

pub use spec::{
    BranchSpec, CollectionSpec, ContainerShape, CredentialSpec, FieldSpec, LoggingConfig,
    ProviderConfig, ProviderSettings, ResourceSchema, SecretSpec, UnionSpec, VariantSpec,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_LOG_JSON, ENV_LOG_LEVEL, ENV_SCHEMA_VERSION,
    find_config_file,
};
pub use validator::{ConfigValidator, SchemaIssue, ValidationResult};
