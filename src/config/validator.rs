//! Validation of resource schemas.
//!
//! A malformed field-mapping table would make the codec reject valid input or
//! silently drop attributes, so every schema is checked once at load time.

use crate::error::{ConfigError, FabricError, Result};
use crate::value::FieldKind;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::spec::{CollectionSpec, ContainerShape, FieldSpec, ProviderConfig, ResourceSchema, UnionSpec};

/// Validator for provider configurations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<SchemaIssue>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single schema problem.
#[derive(Debug)]
pub struct SchemaIssue {
    /// Path of the offending schema element.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &ProviderConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if config.provider.name.is_empty() {
            result.error("provider.name", "Provider name cannot be empty");
        }
        if config.provider.schema_version == Some(0) {
            result.error("provider.schema_version", "Schema version starts at 1");
        }

        let mut kinds = HashSet::new();
        for (i, schema) in config.resources.iter().enumerate() {
            if !kinds.insert(schema.kind.as_str()) {
                result.error(
                    format!("resources[{i}].kind"),
                    format!("Duplicate resource kind '{}'", schema.kind),
                );
            }
            if !config.provider.accepts(schema.version) {
                result.error(
                    format!("resources[{i}].version"),
                    format!(
                        "Schema version {} of '{}' is newer than provider.schema_version",
                        schema.version, schema.kind
                    ),
                );
            }
            Self::validate_schema(schema, &mut result);
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(FabricError::Config(ConfigError::InvalidSchema {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates one resource schema.
    fn validate_schema(schema: &ResourceSchema, result: &mut ValidationResult) {
        let path = schema.kind.as_str();

        if schema.kind.is_empty() {
            result.error("resources.kind", "Resource kind cannot be empty");
        } else if !is_valid_name(&schema.kind) {
            result.error(
                path,
                format!(
                    "Resource kind '{}' is invalid. Must be lowercase alphanumeric with underscores.",
                    schema.kind
                ),
            );
        }

        let names = schema
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(schema.collections.iter().map(|c| c.name.as_str()))
            .chain(schema.unions.iter().map(|u| u.name.as_str()));
        check_unique(path, names, result);
        Self::validate_fields(path, &schema.fields, result);

        for collection in &schema.collections {
            Self::validate_collection(&format!("{path}.{}", collection.name), collection, result);
        }
        for union in &schema.unions {
            Self::validate_union(&format!("{path}.{}", union.name), union, result);
        }
    }

    /// Validates the attributes of one block.
    fn validate_fields(path: &str, fields: &[FieldSpec], result: &mut ValidationResult) {
        for field in fields {
            if field.required && field.computed {
                result.error(
                    format!("{path}.{}", field.name),
                    "A computed attribute cannot be required",
                );
            }

            let Some(credential) = field.credential_spec() else {
                continue;
            };
            let reference = fields.iter().find(|f| f.name == credential.reference);
            match reference {
                Some(r)
                    if r.computed
                        && !r.is_secret()
                        && r.kind == FieldKind::String
                        && *r.remote_shape() == FieldKind::String => {}
                Some(_) => result.error(
                    format!("{path}.{}", field.name),
                    format!(
                        "Credential reference '{}' must be a computed, non-secret string attribute",
                        credential.reference
                    ),
                ),
                None => result.error(
                    format!("{path}.{}", field.name),
                    format!(
                        "Credential reference '{}' is not an attribute of this block",
                        credential.reference
                    ),
                ),
            }
        }
    }

    /// Validates a repeated block.
    fn validate_collection(path: &str, collection: &CollectionSpec, result: &mut ValidationResult) {
        let names = std::iter::once(collection.id_field.as_str())
            .chain(collection.fields.iter().map(|f| f.name.as_str()))
            .chain(collection.unions.iter().map(|u| u.name.as_str()));
        check_unique(path, names, result);
        Self::validate_fields(path, &collection.fields, result);

        if let Some(key) = &collection.key_field
            && collection.key_spec().is_none()
        {
            result.error(
                path,
                format!("Natural key '{key}' is not an attribute of this block"),
            );
        }

        match (collection.shape, collection.set_since) {
            (ContainerShape::List, Some(version)) => result.error(
                path,
                format!("Ordered collection cannot declare set_since: {version}"),
            ),
            (ContainerShape::Set, None) => result.warnings.push(format!(
                "{path}: set collection without set_since, persisted state is always migrated"
            )),
            _ => {}
        }

        if collection.shape == ContainerShape::Set && collection.fields.iter().any(FieldSpec::is_secret) {
            result.warnings.push(format!(
                "{path}: secret attributes of a set collection take part in its content hash"
            ));
        }

        for union in &collection.unions {
            Self::validate_union(&format!("{path}.{}", union.name), union, result);
        }
    }

    /// Validates a discriminated block.
    fn validate_union(path: &str, union: &UnionSpec, result: &mut ValidationResult) {
        if union.variants.is_empty() {
            result.error(path, "A discriminated block needs at least one variant");
        }

        let names = std::iter::once(union.discriminator.as_str())
            .chain(union.branches.iter().map(|b| b.name.as_str()))
            .chain(union.shared.iter().map(|f| f.name.as_str()));
        check_unique(path, names, result);
        Self::validate_fields(path, &union.shared, result);

        let mut values = HashSet::new();
        for variant in &union.variants {
            if !values.insert(variant.value.as_str()) {
                result.error(
                    path,
                    format!("Duplicate discriminator value '{}'", variant.value),
                );
            }
            for branch in &variant.branches {
                if !union.branches.iter().any(|b| b.name == *branch) {
                    result.error(
                        path,
                        format!("Variant '{}' names unknown branch '{branch}'", variant.value),
                    );
                }
            }
            for required in &variant.required {
                if !union.shared.iter().any(|f| f.name == *required) {
                    result.error(
                        path,
                        format!(
                            "Variant '{}' requires unknown shared attribute '{required}'",
                            variant.value
                        ),
                    );
                }
            }
        }

        for branch in &union.branches {
            let branch_path = format!("{path}.{}", branch.name);
            check_unique(&branch_path, branch.fields.iter().map(|f| f.name.as_str()), result);
            Self::validate_fields(&branch_path, &branch.fields, result);

            if !union.variants.iter().any(|v| v.branches.contains(&branch.name)) {
                result
                    .warnings
                    .push(format!("{branch_path}: branch is never activated by any variant"));
            }
        }
    }
}

fn check_unique<'n>(path: &str, names: impl Iterator<Item = &'n str>, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            result.error(path, format!("Duplicate attribute name '{name}'"));
        }
    }
}

/// Validates that a kind name follows the naming convention.
/// Names must be lowercase alphanumeric with underscores, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return false;
    }

    !name.ends_with('_') && !name.contains("__")
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(SchemaIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
