//! Expand: declarative attributes to remote request.
//!
//! Expansion runs in two passes. The first validates and coerces the whole
//! tree and records every credential it would need; the secret store is only
//! called once that pass has succeeded. The second pass rebuilds the tree
//! with the generated identifiers in place of the secrets.

use tracing::{debug, info};

use super::discriminated::expand_union;
use super::secrets::{CreatedCredential, SecretRequest, SecretStore};
use super::{child, indexed, Codec, RemoteRequest};
use crate::config::{CollectionSpec, CredentialSpec, FieldSpec};
use crate::error::{ConfigValidationError, FabricError, Result, SecretCreationError};
use crate::model::Identifier;
use crate::value::{FieldMap, Value};

/// Reference written during the validation pass.
const UNRESOLVED_REFERENCE: &str = "unresolved";

impl Codec<'_> {
    /// Builds the remote request for a declared resource.
    ///
    /// Secrets backed by a credential whose reference is still empty are sent
    /// to `secrets` and replaced by the generated identifier. The store is
    /// not called unless the whole declaration is valid.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown or missing attributes, values
    /// that cannot take the remote shape, and discriminated blocks with the
    /// wrong sub-blocks populated. Returns a secret error if the secret store
    /// fails; the request built so far is discarded.
    pub fn expand(&self, declared: &FieldMap, secrets: &dyn SecretStore) -> Result<RemoteRequest> {
        let schema = self.schema;

        let mut validation = Expander::new(&schema.kind, None);
        let body = self.expand_tree(&mut validation, declared)?;

        let (body, credentials) = if validation.pending.is_empty() {
            (body, Vec::new())
        } else {
            let credentials = create_credentials(secrets, &validation.pending)?;
            let mut resolved = Expander::new(&schema.kind, Some(credentials.as_slice()));
            let body = self.expand_tree(&mut resolved, declared)?;
            (body, credentials)
        };

        info!(
            "Expanded {} request: {} attributes, {} credentials created",
            schema.kind,
            body.len(),
            credentials.len()
        );

        Ok(RemoteRequest {
            kind: schema.kind.clone(),
            body,
            credentials,
        })
    }

    fn expand_tree(&self, expander: &mut Expander<'_>, declared: &FieldMap) -> Result<FieldMap> {
        let schema = self.schema;

        let known = schema
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(schema.collections.iter().map(|c| c.name.as_str()))
            .chain(schema.unions.iter().map(|u| u.name.as_str()));
        check_known("", declared, known)?;

        let mut body = expander.expand_fields("", declared, &schema.fields)?;

        for collection in &schema.collections {
            if let Some(items) = expander.expand_collection("", declared, collection)? {
                body.insert(collection.remote_name().to_string(), items);
            }
        }

        for union in &schema.unions {
            if let Some(value) = expand_union(expander, "", declared, union)? {
                body.insert(union.remote_name().to_string(), value);
            }
        }

        Ok(body)
    }
}

/// A credential the request needs, not created yet.
#[derive(Debug)]
struct PendingCredential {
    request: SecretRequest,
    reference_path: String,
}

/// Per-pass expansion state.
pub(super) struct Expander<'s> {
    /// Resource kind, used to name credentials.
    kind: &'s str,
    /// Credentials met so far, in traversal order.
    pending: Vec<PendingCredential>,
    /// Credentials created for the validation pass, same order.
    created: Option<&'s [CreatedCredential]>,
}

impl<'s> Expander<'s> {
    const fn new(kind: &'s str, created: Option<&'s [CreatedCredential]>) -> Self {
        Self {
            kind,
            pending: Vec::new(),
            created,
        }
    }

    /// Expands the plain attributes of one block.
    pub(super) fn expand_fields(
        &mut self,
        path: &str,
        declared: &FieldMap,
        fields: &[FieldSpec],
    ) -> Result<FieldMap> {
        // Credential references generated in this block, by declared name.
        let mut references = FieldMap::new();
        for field in fields {
            let Some(credential) = field.credential_spec() else {
                continue;
            };
            let Some(secret) = declared.get(&field.name).filter(|v| !v.is_empty()) else {
                continue;
            };
            let existing = declared
                .get(&credential.reference)
                .and_then(Identifier::from_value)
                .filter(Identifier::is_assigned);
            if existing.is_none() {
                let id = self.credential_reference(path, field, credential, secret)?;
                references.insert(credential.reference.clone(), Value::String(id));
            }
        }

        let mut out = FieldMap::new();
        for field in fields {
            if field.credential_spec().is_some() {
                if field.required && !declared.contains_key(&field.name) {
                    return Err(missing(path, &field.name));
                }
                continue;
            }

            let Some(value) = references.get(&field.name).or_else(|| declared.get(&field.name)) else {
                if field.required && !field.computed {
                    return Err(missing(path, &field.name));
                }
                continue;
            };

            let coerced = value
                .coerce(&field.kind)
                .and_then(|v| v.coerce(field.remote_shape()))
                .map_err(|e| {
                ConfigValidationError::TypeMismatch {
                    path: child(path, &field.name),
                    expected: e.expected,
                    found: e.found,
                }
            })?;
            out.insert(field.remote_name().to_string(), coerced);
        }

        Ok(out)
    }

    /// Expands a repeated block; `None` when it is optional and not declared.
    fn expand_collection(
        &mut self,
        path: &str,
        declared: &FieldMap,
        spec: &CollectionSpec,
    ) -> Result<Option<Value>> {
        let attr = child(path, &spec.name);

        let Some(value) = declared.get(&spec.name) else {
            if spec.required {
                return Err(missing(path, &spec.name));
            }
            return Ok(None);
        };

        let items = value
            .as_list()
            .ok_or_else(|| mismatch(&attr, "list", value))?;
        if spec.required && items.is_empty() {
            return Err(missing(path, &spec.name));
        }

        let mut expanded = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_path = indexed(&attr, i);
            let block = item
                .as_map()
                .ok_or_else(|| mismatch(&item_path, "map", item))?;
            expanded.push(Value::Map(self.expand_element(&item_path, block, spec)?));
        }

        debug!("{attr}: expanded {} blocks", expanded.len());
        Ok(Some(Value::List(expanded)))
    }

    fn expand_element(
        &mut self,
        path: &str,
        block: &FieldMap,
        spec: &CollectionSpec,
    ) -> Result<FieldMap> {
        let known = std::iter::once(spec.id_field.as_str())
            .chain(spec.fields.iter().map(|f| f.name.as_str()))
            .chain(spec.unions.iter().map(|u| u.name.as_str()));
        check_known(path, block, known)?;

        let mut out = self.expand_fields(path, block, &spec.fields)?;

        // Existing blocks are addressed by id on update.
        if let Some(id) = block
            .get(&spec.id_field)
            .and_then(Identifier::from_value)
            .filter(Identifier::is_assigned)
        {
            out.insert(spec.remote_id_name().to_string(), id.to_value());
        }

        for union in &spec.unions {
            if let Some(value) = expand_union(self, path, block, union)? {
                out.insert(union.remote_name().to_string(), value);
            }
        }

        Ok(out)
    }

    /// Records the credential for a secret and returns its reference.
    fn credential_reference(
        &mut self,
        path: &str,
        field: &FieldSpec,
        credential: &CredentialSpec,
        secret: &Value,
    ) -> Result<String> {
        let secret_path = child(path, &field.name);
        let index = self.pending.len();
        self.pending.push(PendingCredential {
            request: SecretRequest {
                kind: self.kind.to_string(),
                path: secret_path.clone(),
                credential_type: credential.credential_type.clone(),
                name: credential_name(self.kind, &secret_path),
                value: secret.clone(),
            },
            reference_path: child(path, &credential.reference),
        });

        match self.created {
            None => Ok(String::from(UNRESOLVED_REFERENCE)),
            Some(created) => created
                .get(index)
                .filter(|c| c.path == secret_path)
                .map(|c| c.id.clone())
                .ok_or_else(|| FabricError::internal(format!("no credential created for {secret_path}"))),
        }
    }
}

/// Creates every pending credential, in order.
fn create_credentials(
    secrets: &dyn SecretStore,
    pending: &[PendingCredential],
) -> Result<Vec<CreatedCredential>> {
    let mut created = Vec::with_capacity(pending.len());
    for credential in pending {
        let request = &credential.request;
        debug!("Creating {} credential for {}", request.credential_type, request.path);

        let id = secrets
            .create_secret(request)
            .map_err(|source| SecretCreationError::Failed {
                path: request.path.clone(),
                source,
            })?;
        if id.trim().is_empty() {
            return Err(SecretCreationError::EmptyIdentifier {
                path: request.path.clone(),
            }
            .into());
        }

        created.push(CreatedCredential {
            path: request.path.clone(),
            reference_path: credential.reference_path.clone(),
            id,
        });
    }
    Ok(created)
}

/// Rejects attributes of `declared` that are not in `known`.
pub(super) fn check_known<'n>(
    path: &str,
    declared: &FieldMap,
    known: impl IntoIterator<Item = &'n str>,
) -> Result<()> {
    let known: Vec<&str> = known.into_iter().collect();
    if let Some(unknown) = declared.keys().find(|k| !known.contains(&k.as_str())) {
        return Err(ConfigValidationError::UnknownField {
            path: path.to_string(),
            field: unknown.clone(),
        }
        .into());
    }
    Ok(())
}

fn missing(path: &str, field: &str) -> FabricError {
    ConfigValidationError::MissingField {
        path: path.to_string(),
        field: field.to_string(),
    }
    .into()
}

fn mismatch(path: &str, expected: &str, found: &Value) -> ConfigValidationError {
    ConfigValidationError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

/// Credential object name: kind and path with separators flattened.
fn credential_name(kind: &str, path: &str) -> String {
    let mut name = format!("{kind}-{path}");
    name = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    name.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::codec::NoSecretStore;
    use crate::error::SecretStoreError;
    use mockall::mock;
    use serde_json::json;

    mock! {
        Store {}
        impl SecretStore for Store {
            fn create_secret(&self, request: &SecretRequest) -> std::result::Result<String, SecretStoreError>;
        }
    }

    fn declared(payload: &serde_json::Value) -> FieldMap {
        Value::from_json(payload)
            .and_then(|v| v.as_map().cloned())
            .unwrap_or_default()
    }

    fn edge_connector(instances: &serde_json::Value) -> FieldMap {
        declared(&json!({
            "name": "edge-east",
            "segment": "corp",
            "size": "SMALL",
            "instance": instances,
        }))
    }

    #[test]
    fn test_first_creation_creates_credential() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store
            .expect_create_secret()
            .withf(|req| {
                req.path == "instance[0].password"
                    && req.credential_type == "edge-instance"
                    && req.value == Value::from("p1")
                    && req.name == "connector-edge-instance-0-password"
            })
            .times(1)
            .returning(|_| Ok(String::from("cred-42")));

        let request = Codec::new(&schema)
            .expand(
                &edge_connector(&json!([{"hostname": "edge-1", "password": "p1"}])),
                &store,
            )
            .unwrap();

        assert_eq!(
            request.to_json()["instances"],
            json!([{"hostName": "edge-1", "credentialId": "cred-42"}])
        );
        assert_eq!(request.credentials.len(), 1);
        assert_eq!(request.credentials[0].reference_path, "instance[0].credential_id");
    }

    #[test]
    fn test_update_reuses_existing_credential() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store.expect_create_secret().never();

        let request = Codec::new(&schema)
            .expand(
                &edge_connector(&json!([{
                    "id": 7,
                    "hostname": "edge-1",
                    "password": "p1",
                    "credential_id": "cred-42",
                }])),
                &store,
            )
            .unwrap();

        assert_eq!(
            request.to_json()["instances"],
            json!([{"id": 7, "hostName": "edge-1", "credentialId": "cred-42"}])
        );
        assert!(request.credentials.is_empty());
    }

    #[test]
    fn test_secret_store_failure_aborts_expand() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store
            .expect_create_secret()
            .returning(|_| Err(SecretStoreError::new("credential quota exceeded")));

        let err = Codec::new(&schema)
            .expand(
                &edge_connector(&json!([{"hostname": "edge-1", "password": "p1"}])),
                &store,
            )
            .unwrap_err();

        match err {
            FabricError::Secret(SecretCreationError::Failed { path, source }) => {
                assert_eq!(path, "instance[0].password");
                assert_eq!(source.message, "credential quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store.expect_create_secret().returning(|_| Ok(String::from("  ")));

        let err = Codec::new(&schema)
            .expand(
                &edge_connector(&json!([{"hostname": "edge-1", "password": "p1"}])),
                &store,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            FabricError::Secret(SecretCreationError::EmptyIdentifier { .. })
        ));
    }

    #[test]
    fn test_remote_shape_coercion() {
        let schema = catalog::edge_connector();
        let request = Codec::new(&schema)
            .expand(
                &declared(&json!({
                    "name": "edge-east",
                    "segment": "corp",
                    "instance": [{"hostname": "edge-1", "credential_id": "cred-1"}],
                    "segment_options": [
                        {"segment_name": "corp", "zone_name": "dmz", "customer_asn": 65010, "groups": ["b", "a"]}
                    ],
                })),
                &NoSecretStore,
            )
            .unwrap();

        let options = request.to_json()["segmentOptions"].clone();
        assert_eq!(options[0]["customerAsn"], json!("65010"));
        assert_eq!(options[0]["zoneName"], json!("dmz"));
        assert_eq!(options[0]["groups"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = catalog::edge_connector();
        let err = Codec::new(&schema)
            .expand(
                &declared(&json!({
                    "name": "edge-east",
                    "segment": "corp",
                    "instance": [{"hostname": "edge-1", "credential_id": "cred-1"}],
                    "segment_options": [{"segment_name": "corp", "zone_name": "dmz", "customer_asn": "private"}],
                })),
                &NoSecretStore,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::TypeMismatch { ref path, .. })
                if path == "segment_options[0].customer_asn"
        ));
    }

    #[test]
    fn test_missing_and_unknown_attributes() {
        let schema = catalog::edge_connector();
        let codec = Codec::new(&schema);

        let err = codec
            .expand(&declared(&json!({"segment": "corp", "instance": [{"hostname": "a"}]})), &NoSecretStore)
            .unwrap_err();
        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::MissingField { ref field, .. }) if field == "name"
        ));

        let err = codec
            .expand(
                &edge_connector(&json!([{"hostname": "edge-1", "colour": "blue"}])),
                &NoSecretStore,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::UnknownField { ref path, ref field })
                if path == "instance[0]" && field == "colour"
        ));

        let err = codec
            .expand(&edge_connector(&json!([])), &NoSecretStore)
            .unwrap_err();
        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::MissingField { ref field, .. }) if field == "instance"
        ));
    }

    #[test]
    fn test_invalid_declaration_creates_no_credential() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store.expect_create_secret().never();
        let codec = Codec::new(&schema);

        // The first instance is valid; the second one fails after it.
        let err = codec
            .expand(
                &edge_connector(&json!([
                    {"hostname": "edge-1", "password": "p1"},
                    {"password": "p2"},
                ])),
                &store,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::MissingField { ref path, ref field })
                if path == "instance[1]" && field == "hostname"
        ));

        // A bad attribute in the same block as the secret.
        let err = codec
            .expand(
                &edge_connector(&json!([
                    {"hostname": "edge-1", "password": "p1", "serial_number": ["x"]},
                ])),
                &store,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FabricError::Validation(ConfigValidationError::TypeMismatch { ref path, .. })
                if path == "instance[0].serial_number"
        ));

        // A later top-level collection.
        let mut declaration = edge_connector(&json!([{"hostname": "edge-1", "password": "p1"}]));
        declaration.insert(
            String::from("segment_options"),
            Value::from_json(&json!([{"zone_name": "dmz", "customer_asn": "private"}])).unwrap(),
        );
        assert!(codec.expand(&declaration, &store).is_err());
    }

    #[test]
    fn test_each_instance_gets_its_own_credential() {
        let schema = catalog::edge_connector();
        let mut store = MockStore::new();
        store
            .expect_create_secret()
            .times(2)
            .returning(|req| Ok(format!("cred-{}", req.value.to_json().as_str().unwrap_or_default())));

        let request = Codec::new(&schema)
            .expand(
                &edge_connector(&json!([
                    {"hostname": "edge-1", "password": "p1"},
                    {"hostname": "edge-2", "password": "p2"},
                ])),
                &store,
            )
            .unwrap();

        assert_eq!(
            request.to_json()["instances"],
            json!([
                {"hostName": "edge-1", "credentialId": "cred-p1"},
                {"hostName": "edge-2", "credentialId": "cred-p2"},
            ])
        );
        let references: Vec<_> = request.credentials.iter().map(|c| c.reference_path.as_str()).collect();
        assert_eq!(references, vec!["instance[0].credential_id", "instance[1].credential_id"]);
    }

    #[test]
    fn test_credential_name() {
        assert_eq!(
            credential_name("connector_edge", "instance[10].password"),
            "connector-edge-instance-10-password"
        );
    }
}
