//! Secret/credential collaborator interface.
//!
//! Secrets whose credential reference is still empty are handed to a
//! [`SecretStore`] during expand. The generated identifier is written into
//! the request in place of the secret itself.

use crate::error::SecretStoreError;
use crate::value::Value;

/// Payload handed to the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    /// Resource kind the secret belongs to.
    pub kind: String,
    /// Path of the secret attribute inside the resource.
    pub path: String,
    /// Credential type from the schema.
    pub credential_type: String,
    /// Deterministic name for the credential object.
    pub name: String,
    /// The secret value.
    pub value: Value,
}

/// A credential created while expanding a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCredential {
    /// Path of the secret attribute.
    pub path: String,
    /// Path of the reference attribute that received the identifier.
    pub reference_path: String,
    /// Generated identifier.
    pub id: String,
}

/// Synchronous interface of the secret/credential subsystem.
pub trait SecretStore {
    /// Stores a secret and returns the identifier of the created object.
    ///
    /// # Errors
    ///
    /// Returns an error if the subsystem rejects the secret.
    fn create_secret(&self, request: &SecretRequest) -> Result<String, SecretStoreError>;
}

/// Store for resources that never create credentials out-of-band.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretStore;

impl SecretStore for NoSecretStore {
    fn create_secret(&self, request: &SecretRequest) -> Result<String, SecretStoreError> {
        Err(SecretStoreError::new(format!(
            "no secret store configured for {} credential at {}",
            request.credential_type, request.path
        )))
    }
}

impl<T: SecretStore + ?Sized> SecretStore for &T {
    fn create_secret(&self, request: &SecretRequest) -> Result<String, SecretStoreError> {
        (**self).create_secret(request)
    }
}
