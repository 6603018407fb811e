//! Diff engine for comparing declarative projections.
//!
//! This module computes the attribute-level difference between two
//! projections of the same resource, typically the persisted state and the
//! state rebuilt from a fresh remote response.
//!
//! Ordered lists are compared element by element, so a detail's index is a
//! position. Set-shaped attributes of the schema are compared by content:
//! each element only in the old set is `Removed` at its old index, each one
//! only in the new set is `Added` at its new index.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::config::{CollectionSpec, ContainerShape, FieldSpec, ResourceSchema, UnionSpec};
use crate::hash::RecordHasher;
use crate::value::{FieldMap, Value};

/// Engine for computing diffs between projections.
#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Content hasher for the fast path.
    hasher: RecordHasher,
    /// Attribute paths, without element indices, holding sets.
    set_paths: BTreeSet<String>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// Attribute appears only in the new projection.
    Added,
    /// Attribute appears only in the old projection.
    Removed,
    /// Attribute value changed.
    Changed,
}

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    /// Path of the attribute that differs.
    pub path: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Old value, as compact JSON.
    pub old_value: Option<String>,
    /// New value, as compact JSON.
    pub new_value: Option<String>,
}

/// Complete diff result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// All differences, in path order.
    pub details: Vec<DiffDetail>,
    /// Content hash of the old projection.
    pub old_hash: String,
    /// Content hash of the new projection.
    pub new_hash: String,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: RecordHasher::new(),
            set_paths: BTreeSet::new(),
        }
    }

    /// Creates a diff engine that compares the schema's sets by content.
    #[must_use]
    pub fn for_schema(schema: &ResourceSchema) -> Self {
        let mut set_paths = BTreeSet::new();
        collect_fields("", &schema.fields, &mut set_paths);
        collect_collections("", &schema.collections, &mut set_paths);
        collect_unions("", &schema.unions, &mut set_paths);

        Self {
            hasher: RecordHasher::new(),
            set_paths,
        }
    }

    /// Computes the diff between two projections.
    #[must_use]
    pub fn compute_diff(&self, old: &FieldMap, new: &FieldMap) -> DiffResult {
        let old_value = Value::Map(old.clone());
        let new_value = Value::Map(new.clone());
        let old_hash = self.hasher.hash_value(&old_value);
        let new_hash = self.hasher.hash_value(&new_value);

        let mut details = Vec::new();
        if old_hash == new_hash {
            debug!("Projections are identical ({})", self.hasher.short_hash(&new_hash));
        } else {
            self.diff_value("", Some(&old_value), Some(&new_value), &mut details);
            debug!("{} attribute differences", details.len());
        }

        DiffResult {
            details,
            old_hash,
            new_hash,
        }
    }

    fn diff_value(&self, path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<DiffDetail>) {
        match (old, new) {
            (Some(Value::Map(a)), Some(Value::Map(b))) => {
                let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
                keys.sort();
                keys.dedup();
                for key in keys {
                    self.diff_value(&join(path, key), a.get(key), b.get(key), out);
                }
            }
            (Some(Value::List(a)), Some(Value::List(b))) if self.set_paths.contains(&shape_path(path)) => {
                for (i, element) in a.iter().enumerate() {
                    if !b.contains(element) {
                        out.push(detail(format!("{path}[{i}]"), Some(element), None));
                    }
                }
                for (i, element) in b.iter().enumerate() {
                    if !a.contains(element) {
                        out.push(detail(format!("{path}[{i}]"), None, Some(element)));
                    }
                }
            }
            (Some(Value::List(a)), Some(Value::List(b))) => {
                for i in 0..a.len().max(b.len()) {
                    self.diff_value(&format!("{path}[{i}]"), a.get(i), b.get(i), out);
                }
            }
            (Some(a), Some(b)) if a == b => {}
            (None, None) => {}
            _ => out.push(detail(path.to_string(), old, new)),
        }
    }
}

fn detail(path: String, old: Option<&Value>, new: Option<&Value>) -> DiffDetail {
    let diff_type = match (old, new) {
        (None, _) => DiffType::Added,
        (_, None) => DiffType::Removed,
        _ => DiffType::Changed,
    };
    DiffDetail {
        path,
        diff_type,
        old_value: old.map(|v| v.to_json().to_string()),
        new_value: new.map(|v| v.to_json().to_string()),
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Strips element indices: `a[2].b[0]` becomes `a.b`.
fn shape_path(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut in_index = false;
    for c in path.chars() {
        match c {
            '[' => in_index = true,
            ']' => in_index = false,
            _ if !in_index => shape.push(c),
            _ => {}
        }
    }
    shape
}

fn collect_fields(prefix: &str, fields: &[FieldSpec], out: &mut BTreeSet<String>) {
    for field in fields {
        if field.kind.is_set() {
            out.insert(join(prefix, &field.name));
        }
    }
}

fn collect_collections(prefix: &str, collections: &[CollectionSpec], out: &mut BTreeSet<String>) {
    for collection in collections {
        let path = join(prefix, &collection.name);
        collect_fields(&path, &collection.fields, out);
        collect_unions(&path, &collection.unions, out);
        if collection.shape == ContainerShape::Set {
            out.insert(path);
        }
    }
}

fn collect_unions(prefix: &str, unions: &[UnionSpec], out: &mut BTreeSet<String>) {
    for union in unions {
        let path = join(prefix, &union.name);
        collect_fields(&path, &union.shared, out);
        for branch in &union.branches {
            collect_fields(&join(&path, &branch.name), &branch.fields, out);
        }
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        !self.details.is_empty()
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.details.len()
    }

    /// Returns the number of changes of one type.
    #[must_use]
    pub fn count(&self, diff_type: DiffType) -> usize {
        self.details.iter().filter(|d| d.diff_type == diff_type).count()
    }

    /// Returns the top-level attributes touched by a change.
    #[must_use]
    pub fn changed_attributes(&self) -> Vec<String> {
        let mut attributes: Vec<String> = self
            .details
            .iter()
            .map(|d| {
                d.path
                    .split(['.', '['])
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        attributes.dedup();
        attributes
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for DiffDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.diff_type)?;
        match (&self.old_value, &self.new_value) {
            (Some(old), Some(new)) => write!(f, " ({old} -> {new})"),
            (None, Some(new)) => write!(f, " ({new})"),
            (Some(old), None) => write!(f, " ({old})"),
            (None, None) => Ok(()),
        }
    }
}
