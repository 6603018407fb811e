//! Record normalization.
//!
//! Old state may encode the same logical value in several ways (`"65001"`
//! and `65001`, an unassigned id of `0`). Normalizing rewrites each record
//! exactly as a flatten pass would emit it, so that content hashes depend on
//! meaning only.

use crate::config::{CollectionSpec, FieldSpec, UnionSpec};
use crate::error::MigrationError;
use crate::model::Identifier;
use crate::value::{FieldMap, Value};

/// Normalizes one element of a repeated block.
///
/// # Errors
///
/// Returns [`MigrationError::Normalization`] if a value cannot take its
/// declared kind, and [`MigrationError::UnknownAttribute`] for attributes
/// the current schema no longer knows.
pub fn normalize_record(
    spec: &CollectionSpec,
    path: &str,
    record: &Value,
) -> Result<Value, MigrationError> {
    let map = as_block(path, record)?;
    let mut out = FieldMap::new();

    for (name, value) in map {
        let attr = format!("{path}.{name}");

        if *name == spec.id_field {
            let id = Identifier::from_value(value)
                .ok_or_else(|| MigrationError::normalization(&attr, "identifier is not a scalar"))?;
            if id.is_assigned() {
                out.insert(name.clone(), id.to_value());
            }
        } else if let Some(field) = spec.fields.iter().find(|f| f.name == *name) {
            out.insert(name.clone(), normalize_value(field, &attr, value)?);
        } else if let Some(union) = spec.unions.iter().find(|u| u.name == *name) {
            out.insert(name.clone(), normalize_union(union, &attr, value)?);
        } else {
            return Err(MigrationError::UnknownAttribute { path: attr });
        }
    }

    Ok(Value::Map(out))
}

/// Coerces a plain attribute to its declared kind.
///
/// # Errors
///
/// Returns [`MigrationError::Normalization`] when the coercion fails.
pub fn normalize_value(field: &FieldSpec, path: &str, value: &Value) -> Result<Value, MigrationError> {
    value
        .coerce(&field.kind)
        .map_err(|e| MigrationError::normalization(path, e.to_string()))
}

fn normalize_union(spec: &UnionSpec, path: &str, value: &Value) -> Result<Value, MigrationError> {
    let map = as_block(path, value)?;
    let mut out = FieldMap::new();

    for (name, value) in map {
        let attr = format!("{path}.{name}");

        if *name == spec.discriminator {
            let discriminator = value
                .to_key_string()
                .ok_or_else(|| MigrationError::normalization(&attr, "discriminator is not a scalar"))?;
            out.insert(name.clone(), Value::String(discriminator));
        } else if let Some(branch) = spec.branches.iter().find(|b| b.name == *name) {
            out.insert(name.clone(), normalize_fields(&branch.fields, &attr, value)?);
        } else if let Some(field) = spec.shared.iter().find(|f| f.name == *name) {
            out.insert(name.clone(), normalize_value(field, &attr, value)?);
        } else {
            return Err(MigrationError::UnknownAttribute { path: attr });
        }
    }

    Ok(Value::Map(out))
}

fn normalize_fields(fields: &[FieldSpec], path: &str, value: &Value) -> Result<Value, MigrationError> {
    let map = as_block(path, value)?;
    let mut out = FieldMap::new();

    for (name, value) in map {
        let attr = format!("{path}.{name}");
        let field = fields
            .iter()
            .find(|f| f.name == *name)
            .ok_or_else(|| MigrationError::UnknownAttribute { path: attr.clone() })?;
        out.insert(name.clone(), normalize_value(field, &attr, value)?);
    }

    Ok(Value::Map(out))
}

fn as_block<'v>(path: &str, value: &'v Value) -> Result<&'v FieldMap, MigrationError> {
    value
        .as_map()
        .ok_or_else(|| MigrationError::normalization(path, format!("expected a block, found {}", value.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use serde_json::json;

    fn record(payload: &serde_json::Value) -> Value {
        Value::from_json(payload).unwrap()
    }

    #[test]
    fn test_numeric_text_is_normalized() {
        let schema = catalog::edge_connector();
        let spec = schema.collection("segment_options").unwrap();

        let normalized = normalize_record(
            spec,
            "segment_options[0]",
            &record(&json!({"id": "0", "zone_name": "dmz", "customer_asn": " 65001 ", "groups": ["b", "a", "b"]})),
        )
        .unwrap();

        let block = normalized.as_map().unwrap();
        assert!(!block.contains_key("id"));
        assert_eq!(block["customer_asn"], Value::Int(65001));
        assert_eq!(
            block["groups"],
            Value::List(crate::value::canonical_set(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn test_unparseable_value_fails() {
        let schema = catalog::edge_connector();
        let spec = schema.collection("segment_options").unwrap();

        let err = normalize_record(
            spec,
            "segment_options[1]",
            &record(&json!({"zone_name": "dmz", "customer_asn": "65k"})),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Normalization { ref path, .. } if path == "segment_options[1].customer_asn"
        ));
    }

    #[test]
    fn test_unknown_attribute_fails() {
        let schema = catalog::edge_connector();
        let spec = schema.collection("segment_options").unwrap();

        let err = normalize_record(spec, "segment_options[0]", &record(&json!({"zone": "dmz"}))).unwrap_err();

        assert_eq!(
            err,
            MigrationError::UnknownAttribute {
                path: String::from("segment_options[0].zone")
            }
        );
    }

    #[test]
    fn test_not_a_block() {
        let schema = catalog::edge_connector();
        let spec = schema.collection("segment_options").unwrap();

        assert!(normalize_record(spec, "segment_options[0]", &Value::from("dmz")).is_err());
    }
}
