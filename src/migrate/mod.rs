//! Schema version migrator.
//!
//! Persisted state written under an older schema may model a repeated block
//! as an ordered sequence that the current schema models as a content
//! addressed set. Upgrading normalizes every old record, de-duplicates by
//! content hash and emits the set in canonical order, which is exactly what
//! the flatten path produces for the same logical content. Upgraded state
//! therefore shows no difference on the next reconciliation cycle.
//!
//! Migration is all-or-nothing: any record that cannot be normalized fails
//! the whole upgrade and the old state is left untouched.

mod normalize;

pub use normalize::{normalize_record, normalize_value};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{CollectionSpec, ContainerShape, FieldSpec, ResourceSchema};
use crate::error::MigrationError;
use crate::hash::RecordHasher;
use crate::state::ResourceState;
use crate::value::{canonical_set, FieldMap, Value};

/// Upgrades persisted state to the current version of one schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaMigrator<'a> {
    /// Current schema.
    schema: &'a ResourceSchema,
}

/// What an upgrade did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version the state was written under.
    pub from_version: u32,
    /// Version the state was upgraded to.
    pub to_version: u32,
    /// Attributes converted to sets.
    pub converted: Vec<String>,
    /// Records dropped as duplicates of another record.
    pub collapsed: usize,
}

impl<'a> SchemaMigrator<'a> {
    /// Creates a migrator for the given schema.
    #[must_use]
    pub const fn new(schema: &'a ResourceSchema) -> Self {
        Self { schema }
    }

    /// Returns the collections that became sets after `from_version`.
    pub fn affected_collections(&self, from_version: u32) -> impl Iterator<Item = &'a CollectionSpec> {
        self.schema.collections.iter().filter(move |c| {
            c.shape == ContainerShape::Set && c.set_since.is_none_or(|since| since > from_version)
        })
    }

    /// Converts an old ordered sequence of records into the set enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error if `records` is not a sequence or if any record
    /// cannot be normalized.
    pub fn upgrade_records(
        &self,
        spec: &CollectionSpec,
        records: &Value,
    ) -> Result<Vec<Value>, MigrationError> {
        let items = records.as_list().ok_or_else(|| MigrationError::NotASequence {
            path: spec.name.clone(),
        })?;

        let hasher = RecordHasher::new();
        let mut normalized = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let record = normalize_record(spec, &format!("{}[{i}]", spec.name), item)?;
            debug!(
                "{}[{i}] -> {}",
                spec.name,
                hasher.short_hash(&hasher.hash_value(&record))
            );
            normalized.push(record);
        }

        Ok(canonical_set(normalized))
    }

    /// Upgrades the attributes of a resource written under `from_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state was written by a newer schema or if any
    /// affected attribute cannot be normalized.
    pub fn upgrade_attributes(
        &self,
        attributes: &FieldMap,
        from_version: u32,
    ) -> Result<(FieldMap, MigrationReport), MigrationError> {
        let mut report = MigrationReport {
            from_version,
            to_version: self.schema.version,
            ..MigrationReport::default()
        };

        if from_version > self.schema.version {
            return Err(MigrationError::VersionMismatch {
                expected: self.schema.version,
                found: from_version,
            });
        }
        if from_version == self.schema.version {
            return Ok((attributes.clone(), report));
        }

        let mut upgraded = attributes.clone();

        for spec in self.affected_collections(from_version) {
            let Some(records) = attributes.get(&spec.name) else {
                continue;
            };
            let before = records.as_list().map_or(0, <[Value]>::len);
            let set = self.upgrade_records(spec, records)?;
            report.collapsed += before - set.len();
            report.converted.push(spec.name.clone());
            upgraded.insert(spec.name.clone(), Value::List(set));
        }

        for field in self.schema.fields.iter().filter(|f| f.kind.is_set()) {
            if let Some(value) = attributes.get(&field.name) {
                upgraded.insert(field.name.clone(), upgrade_set_field(field, value)?);
                report.converted.push(field.name.clone());
            }
        }

        info!(
            "Upgraded {} state from v{} to v{}: {} converted, {} duplicates collapsed",
            self.schema.kind,
            from_version,
            self.schema.version,
            report.converted.len(),
            report.collapsed
        );
        Ok((upgraded, report))
    }

    /// Upgrades a persisted resource state.
    ///
    /// State already at the current version is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the state belongs to another kind, was written by
    /// a newer schema, or holds a value that cannot be normalized.
    pub fn upgrade_state(&self, state: &ResourceState) -> Result<ResourceState, MigrationError> {
        if state.kind != self.schema.kind {
            return Err(MigrationError::KindMismatch {
                expected: self.schema.kind.clone(),
                found: state.kind.clone(),
            });
        }

        let (attributes, _) = self.upgrade_attributes(&state.attributes, state.schema_version)?;
        Ok(ResourceState {
            schema_version: self.schema.version.max(state.schema_version),
            kind: state.kind.clone(),
            attributes,
        })
    }
}

fn upgrade_set_field(field: &FieldSpec, value: &Value) -> Result<Value, MigrationError> {
    if value.as_list().is_none() {
        return Err(MigrationError::NotASequence {
            path: field.name.clone(),
        });
    }
    normalize_value(field, &field.name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::codec::Codec;
    use serde_json::json;

    fn map(payload: &serde_json::Value) -> FieldMap {
        Value::from_json(payload)
            .and_then(|v| v.as_map().cloned())
            .unwrap_or_default()
    }

    fn old_state() -> ResourceState {
        ResourceState::new(
            catalog::EDGE_CONNECTOR,
            2,
            map(&json!({
                "name": "edge-east",
                "segment": "corp",
                "billing_tags": [3, "1", 3],
                "segment_options": [
                    {"segment_name": "corp", "zone_name": "b", "customer_asn": "65002", "groups": ["y", "x"]},
                    {"segment_name": "corp", "zone_name": "a", "customer_asn": 65001},
                    {"segment_name": "corp", "zone_name": "b", "customer_asn": 65002, "groups": ["x", "y"]},
                ],
            })),
        )
    }

    #[test]
    fn test_upgrade_collapses_and_normalizes() {
        let schema = catalog::edge_connector();
        let migrator = SchemaMigrator::new(&schema);

        let (attributes, report) = migrator
            .upgrade_attributes(&old_state().attributes, 2)
            .unwrap();

        assert_eq!(report.collapsed, 1);
        assert_eq!(report.converted, vec!["segment_options", "billing_tags"]);
        assert_eq!(attributes["segment_options"].as_list().map(<[Value]>::len), Some(2));
        assert_eq!(attributes["billing_tags"].as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_upgrade_matches_fresh_flatten() {
        let schema = catalog::edge_connector();
        let migrated = SchemaMigrator::new(&schema).upgrade_state(&old_state()).unwrap();

        let response = map(&json!({
            "name": "edge-east",
            "segment": "corp",
            "billingTags": [1, 3],
            "segmentOptions": [
                {"segmentName": "corp", "zoneName": "a", "customerAsn": "65001"},
                {"segmentName": "corp", "zoneName": "b", "customerAsn": "65002", "groups": ["x", "y"]},
            ],
        }));
        let fresh = Codec::new(&schema).flatten(Some(&migrated.attributes), &response);

        assert_eq!(fresh.state, migrated.attributes);
        assert_eq!(
            serde_json::to_string(&fresh.state).unwrap(),
            serde_json::to_string(&migrated.attributes).unwrap()
        );
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let schema = catalog::edge_connector();
        let migrator = SchemaMigrator::new(&schema);
        let spec = schema.collection("segment_options").unwrap();

        let once = migrator
            .upgrade_records(spec, &old_state().attributes["segment_options"])
            .unwrap();
        let twice = migrator.upgrade_records(spec, &Value::List(once.clone())).unwrap();
        assert_eq!(once, twice);

        let migrated = migrator.upgrade_state(&old_state()).unwrap();
        assert_eq!(migrator.upgrade_state(&migrated).unwrap(), migrated);
    }

    #[test]
    fn test_normalization_failure_is_fatal() {
        let schema = catalog::edge_connector();
        let mut state = old_state();
        state.attributes.insert(
            String::from("segment_options"),
            Value::from_json(&json!([{"zone_name": "a", "customer_asn": "AS65001"}])).unwrap(),
        );
        let before = state.clone();

        let err = SchemaMigrator::new(&schema).upgrade_state(&state).unwrap_err();

        assert!(matches!(err, MigrationError::Normalization { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_not_a_sequence() {
        let schema = catalog::edge_connector();
        let spec = schema.collection("segment_options").unwrap();

        let err = SchemaMigrator::new(&schema)
            .upgrade_records(spec, &Value::from("a,b"))
            .unwrap_err();
        assert_eq!(
            err,
            MigrationError::NotASequence {
                path: String::from("segment_options")
            }
        );
    }

    #[test]
    fn test_version_and_kind_checks() {
        let schema = catalog::edge_connector();
        let migrator = SchemaMigrator::new(&schema);

        let mut newer = old_state();
        newer.schema_version = 4;
        assert_eq!(
            migrator.upgrade_state(&newer).unwrap_err(),
            MigrationError::VersionMismatch {
                expected: 3,
                found: 4
            }
        );

        let mut other = old_state();
        other.kind = String::from(catalog::IPSEC_CONNECTOR);
        assert!(matches!(
            migrator.upgrade_state(&other),
            Err(MigrationError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_collections_already_sets_are_untouched() {
        let schema = catalog::edge_connector();
        let migrator = SchemaMigrator::new(&schema);

        assert_eq!(migrator.affected_collections(2).count(), 1);
        assert_eq!(migrator.affected_collections(3).count(), 0);
    }
}
