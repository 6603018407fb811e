//! Error types for the fabric provider reconciliation layer.
//!
//! This module provides the error hierarchy for every fallible operation
//! of the layer: configuration loading, expand-time validation, secret
//! creation and state migration. Matching and flattening are total and have
//! no error kind of their own.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the fabric provider.
#[derive(Debug, Error)]
pub enum FabricError {
    /// Provider configuration or resource schema errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Declared configuration rejected while building a request.
    #[error("Validation error: {0}")]
    Validation(#[from] ConfigValidationError),

    /// The secret/credential collaborator failed during expand.
    #[error("Secret error: {0}")]
    Secret(#[from] SecretCreationError),

    /// Persisted state could not be upgraded to the current schema.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Persisted state could not be read or written.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// A configuration file exists but could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broken internal invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Provider configuration and resource schema errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A resource schema is inconsistent.
    #[error("Invalid resource schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
        /// Schema path that failed validation.
        field: Option<String>,
    },

    /// An environment override holds an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// No schema is registered for a resource kind.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The requested kind.
        kind: String,
    },
}

/// Errors raised while validating declared configuration in the expand path.
///
/// These are always surfaced to the caller and never auto-corrected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A discriminated block has no discriminator value.
    #[error("{path}: missing discriminator '{discriminator}'")]
    MissingDiscriminator {
        /// Path of the discriminated block.
        path: String,
        /// Name of the discriminator attribute.
        discriminator: String,
    },

    /// The discriminator holds a value with no known variant.
    #[error("{path}: unknown {discriminator} '{value}'")]
    UnknownDiscriminator {
        /// Path of the discriminated block.
        path: String,
        /// Name of the discriminator attribute.
        discriminator: String,
        /// The rejected value.
        value: String,
    },

    /// A sub-block is populated that the discriminator value does not allow.
    #[error("{path}: '{branch}' must not be set when {discriminator} is '{value}'")]
    WrongBranch {
        /// Path of the discriminated block.
        path: String,
        /// Name of the discriminator attribute.
        discriminator: String,
        /// Discriminator value.
        value: String,
        /// The offending sub-block.
        branch: String,
    },

    /// A sub-block required by the discriminator value is missing.
    #[error("{path}: '{branch}' is required when {discriminator} is '{value}'")]
    MissingBranch {
        /// Path of the discriminated block.
        path: String,
        /// Name of the discriminator attribute.
        discriminator: String,
        /// Discriminator value.
        value: String,
        /// The missing sub-block.
        branch: String,
    },

    /// A required attribute is missing.
    #[error("{path}: missing required attribute '{field}'")]
    MissingField {
        /// Path of the enclosing block.
        path: String,
        /// Name of the missing attribute.
        field: String,
    },

    /// The block carries an attribute the schema does not know.
    #[error("{path}: unsupported attribute '{field}'")]
    UnknownField {
        /// Path of the enclosing block.
        path: String,
        /// Name of the attribute.
        field: String,
    },

    /// An attribute could not be coerced to the shape the request needs.
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Path of the attribute.
        path: String,
        /// Expected kind.
        expected: String,
        /// Kind actually found.
        found: String,
    },
}

/// Errors returned by a secret/credential collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SecretStoreError {
    /// Description supplied by the collaborator.
    pub message: String,
}

/// Secret creation failures inside expand.
///
/// The partially built request is discarded; a secret created before the
/// failure is not rolled back here.
#[derive(Debug, Error)]
pub enum SecretCreationError {
    /// The collaborator rejected the secret.
    #[error("failed to create secret for {path}: {source}")]
    Failed {
        /// Path of the secret attribute.
        path: String,
        /// The collaborator error.
        #[source]
        source: SecretStoreError,
    },

    /// The collaborator answered with an empty identifier.
    #[error("secret store returned an empty identifier for {path}")]
    EmptyIdentifier {
        /// Path of the secret attribute.
        path: String,
    },
}

/// State migration errors. Fatal to the migration; old state is kept.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    /// A field value could not be normalized for hashing.
    #[error("cannot normalize {path}: {reason}")]
    Normalization {
        /// Path of the attribute.
        path: String,
        /// Why normalization failed.
        reason: String,
    },

    /// The old state does not hold a sequence where one is expected.
    #[error("{path} is not a sequence of records")]
    NotASequence {
        /// Path of the attribute.
        path: String,
    },

    /// An old record carries an attribute the current schema does not know.
    #[error("{path} is not part of the current schema")]
    UnknownAttribute {
        /// Path of the attribute.
        path: String,
    },

    /// The state was written by a newer schema.
    #[error("State version mismatch: expected at most {expected}, found {found}")]
    VersionMismatch {
        /// Current schema version.
        expected: u32,
        /// Version recorded in the state.
        found: u32,
    },

    /// The state belongs to another resource kind.
    #[error("State kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind of the schema.
        expected: String,
        /// Kind recorded in the state.
        found: String,
    },
}

/// Persisted state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State content is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the error.
        message: String,
    },
}

/// Result type alias for fabric provider operations.
pub type Result<T> = std::result::Result<T, FabricError>;

impl FabricError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    ///
    /// Always false: every operation of this layer is deterministic. The
    /// orchestrator retries whole cycles on its own transport errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Validation(_)
            | Self::Secret(_)
            | Self::Migration(_)
            | Self::State(_)
            | Self::Io(_)
            | Self::Internal(_) => false,
        }
    }
}

impl ConfigError {
    /// Creates a schema error for a specific path.
    #[must_use]
    pub fn schema(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl SecretStoreError {
    /// Creates a collaborator error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl MigrationError {
    /// Creates a normalization error for a specific path.
    #[must_use]
    pub fn normalization(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Normalization {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
