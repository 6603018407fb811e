//! Discriminated blocks.
//!
//! A discriminated block carries a discriminator attribute and a set of
//! mutually exclusive sub-blocks. The discriminator value names exactly the
//! sub-blocks that must be populated; populating any other one, or leaving a
//! named one empty, is rejected on expand. On flatten only the sub-blocks the
//! remote system returned are rebuilt; absent ones stay unset.

use tracing::debug;

use super::expand::{check_known, Expander};
use super::flatten::flatten_fields;
use super::child;
use crate::config::UnionSpec;
use crate::error::{ConfigValidationError, Result};
use crate::value::{FieldMap, Value};

/// Expands the discriminated block `spec` found in `declared`.
///
/// Returns `None` when the block is optional and not declared.
pub(super) fn expand_union(
    expander: &mut Expander<'_>,
    path: &str,
    declared: &FieldMap,
    spec: &UnionSpec,
) -> Result<Option<Value>> {
    let attr = child(path, &spec.name);

    let Some(value) = declared.get(&spec.name) else {
        if spec.required {
            return Err(ConfigValidationError::MissingField {
                path: path.to_string(),
                field: spec.name.clone(),
            }
            .into());
        }
        return Ok(None);
    };

    let block = value.as_map().ok_or_else(|| ConfigValidationError::TypeMismatch {
        path: attr.clone(),
        expected: String::from("map"),
        found: value.type_name().to_string(),
    })?;

    let known = std::iter::once(spec.discriminator.as_str())
        .chain(spec.branches.iter().map(|b| b.name.as_str()))
        .chain(spec.shared.iter().map(|f| f.name.as_str()));
    check_known(&attr, block, known)?;

    let discriminator = block
        .get(&spec.discriminator)
        .and_then(Value::to_key_string)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ConfigValidationError::MissingDiscriminator {
            path: attr.clone(),
            discriminator: spec.discriminator.clone(),
        })?;

    let variant = spec
        .variant(&discriminator)
        .ok_or_else(|| ConfigValidationError::UnknownDiscriminator {
            path: attr.clone(),
            discriminator: spec.discriminator.clone(),
            value: discriminator.clone(),
        })?;

    let mut out = FieldMap::new();
    out.insert(
        spec.remote_discriminator_name().to_string(),
        Value::String(discriminator.clone()),
    );

    for branch in &spec.branches {
        let populated = block.get(&branch.name).filter(|v| !v.is_empty());
        let active = variant.branches.iter().any(|b| *b == branch.name);

        match (populated, active) {
            (Some(_), false) => {
                return Err(ConfigValidationError::WrongBranch {
                    path: attr,
                    discriminator: spec.discriminator.clone(),
                    value: discriminator,
                    branch: branch.name.clone(),
                }
                .into());
            }
            (None, true) => {
                return Err(ConfigValidationError::MissingBranch {
                    path: attr,
                    discriminator: spec.discriminator.clone(),
                    value: discriminator,
                    branch: branch.name.clone(),
                }
                .into());
            }
            (Some(branch_value), true) => {
                let branch_path = child(&attr, &branch.name);
                let branch_block =
                    branch_value
                        .as_map()
                        .ok_or_else(|| ConfigValidationError::TypeMismatch {
                            path: branch_path.clone(),
                            expected: String::from("map"),
                            found: branch_value.type_name().to_string(),
                        })?;
                check_known(
                    &branch_path,
                    branch_block,
                    branch.fields.iter().map(|f| f.name.as_str()),
                )?;

                let expanded = expander.expand_fields(&branch_path, branch_block, &branch.fields)?;
                debug!("{attr}: {discriminator} activates '{}'", branch.name);
                out.insert(branch.remote_name().to_string(), Value::Map(expanded));
            }
            (None, false) => {}
        }
    }

    for required in &variant.required {
        if block.get(required).is_none_or(Value::is_empty) {
            return Err(ConfigValidationError::MissingField {
                path: attr,
                field: required.clone(),
            }
            .into());
        }
    }

    out.extend(expander.expand_fields(&attr, block, &spec.shared)?);

    Ok(Some(Value::Map(out)))
}

/// Rebuilds the discriminated block `spec` from a remote payload.
///
/// Returns `None` when the remote system did not return the block. Secrets
/// of returned sub-blocks follow the same rule as plain attributes: taken
/// from `prior`, or zero-filled when `fill_secrets` is set.
pub(super) fn flatten_union(
    remote: &FieldMap,
    prior: Option<&FieldMap>,
    spec: &UnionSpec,
    fill_secrets: bool,
) -> Option<Value> {
    let remote_block = remote
        .get(spec.remote_name())
        .and_then(Value::as_map)
        .filter(|m| !m.is_empty())?;
    let prior_block = prior
        .and_then(|p| p.get(&spec.name))
        .and_then(Value::as_map);

    let mut out = FieldMap::new();
    if let Some(discriminator) = remote_block
        .get(spec.remote_discriminator_name())
        .and_then(Value::to_key_string)
    {
        out.insert(spec.discriminator.clone(), Value::String(discriminator));
    }

    for branch in &spec.branches {
        let Some(remote_branch) = remote_block
            .get(branch.remote_name())
            .and_then(Value::as_map)
            .filter(|m| !m.is_empty())
        else {
            continue;
        };
        let prior_branch = prior_block
            .and_then(|p| p.get(&branch.name))
            .and_then(Value::as_map);

        out.insert(
            branch.name.clone(),
            Value::Map(flatten_fields(&branch.fields, remote_branch, prior_branch, fill_secrets)),
        );
    }

    out.extend(flatten_fields(&spec.shared, remote_block, prior_block, fill_secrets));

    Some(Value::Map(out))
}
