//! Flatten: remote response to declarative projection.

use tracing::{debug, info, warn};

use super::discriminated::flatten_union;
use super::Codec;
use crate::config::{CollectionSpec, ContainerShape, FieldSpec};
use crate::matcher::{IdentityMatcher, MatchSummary};
use crate::model::{DeclaredBlock, Identifier, ReconciledBlock, RemoteEntity};
use crate::value::{canonical_set, FieldMap, Value};

/// Result of a flatten pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattened {
    /// New declarative projection.
    pub state: FieldMap,
    /// Matching counts over every repeated block.
    pub summary: MatchSummary,
}

impl Codec<'_> {
    /// Rebuilds the declarative projection from a remote response.
    ///
    /// `prior` is the previously persisted projection; it supplies the
    /// ordering of repeated blocks and every secret the remote system does
    /// not echo back. Flatten never fails: values that cannot take their
    /// declared shape are kept as returned and logged.
    #[must_use]
    pub fn flatten(&self, prior: Option<&FieldMap>, response: &FieldMap) -> Flattened {
        let schema = self.schema;
        let mut state = flatten_fields(&schema.fields, response, prior, false);
        let mut summary = MatchSummary::default();

        for collection in &schema.collections {
            if let Some((value, counts)) = flatten_collection(&self.matcher, prior, response, collection)
            {
                summary.absorb(counts);
                state.insert(collection.name.clone(), value);
            }
        }

        for union in &schema.unions {
            if let Some(value) = flatten_union(response, prior, union, false) {
                state.insert(union.name.clone(), value);
            }
        }

        info!("Flattened {}: {}", schema.kind, summary);
        Flattened { state, summary }
    }
}

impl Flattened {
    /// Renders the projection as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.state.clone()).to_json()
    }
}

/// Flattens the plain attributes of one block.
///
/// Secrets come from `prior`; when `fill_secrets` is set, secrets missing
/// there are projected as the zero value of their kind.
pub(super) fn flatten_fields(
    fields: &[FieldSpec],
    remote: &FieldMap,
    prior: Option<&FieldMap>,
    fill_secrets: bool,
) -> FieldMap {
    let mut out = FieldMap::new();

    for field in fields {
        if field.is_secret() {
            match prior.and_then(|p| p.get(&field.name)) {
                Some(value) => {
                    out.insert(field.name.clone(), coerce_or_keep(field, value));
                }
                None if fill_secrets => {
                    out.insert(field.name.clone(), field.kind.zero_value());
                }
                None => {}
            }
            continue;
        }

        if let Some(value) = remote.get(field.remote_name()) {
            out.insert(field.name.clone(), coerce_or_keep(field, value));
        }
    }

    out
}

fn coerce_or_keep(field: &FieldSpec, value: &Value) -> Value {
    value.coerce(&field.kind).unwrap_or_else(|e| {
        warn!("Keeping raw value of '{}': {e}", field.name);
        value.clone()
    })
}

fn flatten_collection(
    matcher: &IdentityMatcher,
    prior: Option<&FieldMap>,
    response: &FieldMap,
    spec: &CollectionSpec,
) -> Option<(Value, MatchSummary)> {
    let prior_items: Vec<Option<&FieldMap>> = prior
        .and_then(|p| p.get(&spec.name))
        .and_then(Value::as_list)
        .map(|items| items.iter().map(Value::as_map).collect())
        .unwrap_or_default();
    let had_prior = prior.is_some_and(|p| p.contains_key(&spec.name));

    let remote_items: Vec<&FieldMap> = response
        .get(spec.remote_name())
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_map).collect())
        .unwrap_or_default();

    if remote_items.is_empty() {
        return had_prior.then(|| (Value::List(Vec::new()), MatchSummary::default()));
    }

    let declared: Vec<DeclaredBlock> = prior_items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.map(|m| declared_block(spec, i, m)))
        .collect();
    let remote: Vec<RemoteEntity> = remote_items.iter().map(|m| remote_entity(spec, m)).collect();

    let outcome = matcher.reconcile(&declared, &remote);
    debug!(
        "{}: {} declared, {} remote, {} pending",
        spec.name,
        declared.len(),
        remote.len(),
        outcome.pending.len()
    );

    let elements: Vec<Value> = outcome
        .blocks
        .iter()
        .map(|block| {
            let prior_item = if block.is_matched() {
                prior_items.get(block.position).copied().flatten()
            } else {
                None
            };
            Value::Map(flatten_element(spec, block, prior_item))
        })
        .collect();

    let value = match spec.shape {
        ContainerShape::List => Value::List(elements),
        ContainerShape::Set => Value::List(canonical_set(elements)),
    };
    Some((value, outcome.summary()))
}

fn flatten_element(spec: &CollectionSpec, block: &ReconciledBlock, prior: Option<&FieldMap>) -> FieldMap {
    let mut out = FieldMap::new();
    if block.id.is_assigned() {
        out.insert(spec.id_field.clone(), block.id.to_value());
    }
    let fill_secrets = !block.is_matched();
    out.extend(flatten_fields(
        &spec.fields,
        &block.fields,
        Some(&block.secret_fields),
        fill_secrets,
    ));
    for union in &spec.unions {
        if let Some(value) = flatten_union(&block.fields, prior, union, fill_secrets) {
            out.insert(union.name.clone(), value);
        }
    }
    out
}

fn declared_block(spec: &CollectionSpec, position: usize, item: &FieldMap) -> DeclaredBlock {
    let mut block = DeclaredBlock::new(position);
    block.primary_key = item.get(&spec.id_field).and_then(Identifier::from_value);
    block.secondary_key = spec
        .key_field
        .as_ref()
        .and_then(|key| item.get(key))
        .and_then(Value::to_key_string);

    for (name, value) in item {
        let secret = spec.fields.iter().any(|f| f.name == *name && f.is_secret());
        if secret {
            block.secret_fields.insert(name.clone(), value.clone());
        } else {
            block.fields.insert(name.clone(), value.clone());
        }
    }
    block
}

fn remote_entity(spec: &CollectionSpec, item: &FieldMap) -> RemoteEntity {
    let id = item
        .get(spec.remote_id_name())
        .and_then(Identifier::from_value)
        .unwrap_or_default();
    let secondary_key = spec
        .key_spec()
        .and_then(|key| item.get(key.remote_name()))
        .and_then(Value::to_key_string)
        .unwrap_or_default();

    RemoteEntity {
        id,
        secondary_key,
        fields: item.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::codec::NoSecretStore;
    use serde_json::json;

    fn map(payload: &serde_json::Value) -> FieldMap {
        Value::from_json(payload)
            .and_then(|v| v.as_map().cloned())
            .unwrap_or_default()
    }

    #[test]
    fn test_concrete_scenario() {
        let schema = catalog::edge_connector();
        let prior = map(&json!({
            "name": "edge-east",
            "segment": "corp",
            "instance": [
                {"id": 7, "hostname": "edge-1", "password": "p1", "credential_id": "cred-7"}
            ],
        }));
        let response = map(&json!({
            "name": "edge-east",
            "segment": "corp",
            "instances": [
                {"id": 7, "hostName": "edge-1", "credentialId": "cred-7"},
                {"id": 9, "hostName": "edge-2", "credentialId": "cred-9"},
            ],
        }));

        let flattened = Codec::new(&schema).flatten(Some(&prior), &response);

        assert_eq!(
            flattened.to_json()["instance"],
            json!([
                {"id": 7, "hostname": "edge-1", "credential_id": "cred-7", "password": "p1"},
                {"id": 9, "hostname": "edge-2", "credential_id": "cred-9", "password": ""},
            ])
        );
        assert_eq!(flattened.summary.by_primary_key, 1);
        assert_eq!(flattened.summary.appended, 1);
    }

    #[test]
    fn test_order_follows_prior_state() {
        let schema = catalog::edge_connector();
        let prior = map(&json!({
            "instance": [
                {"id": 1, "hostname": "a"},
                {"id": 2, "hostname": "b"},
            ],
        }));
        let response = map(&json!({
            "instances": [
                {"id": 3, "hostName": "c"},
                {"id": 2, "hostName": "b"},
                {"id": 1, "hostName": "a"},
            ],
        }));

        let flattened = Codec::new(&schema).flatten(Some(&prior), &response);
        let hosts: Vec<_> = flattened.to_json()["instance"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["hostname"].clone())
            .collect();

        assert_eq!(hosts, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_first_apply_matches_by_hostname() {
        let schema = catalog::edge_connector();
        let prior = map(&json!({
            "instance": [{"hostname": "edge-1", "password": "p1"}],
        }));
        let response = map(&json!({
            "instances": [{"id": 11, "hostName": "edge-1", "credentialId": "cred-11"}],
        }));

        let flattened = Codec::new(&schema).flatten(Some(&prior), &response);

        assert_eq!(
            flattened.to_json()["instance"],
            json!([{"id": 11, "hostname": "edge-1", "credential_id": "cred-11", "password": "p1"}])
        );
        assert_eq!(flattened.summary.by_secondary_key, 1);
    }

    #[test]
    fn test_secret_retention_round_trip() {
        let schema = catalog::edge_connector();
        let codec = Codec::new(&schema);
        let declared = map(&json!({
            "name": "edge-east",
            "segment": "corp",
            "instance": [
                {"id": 7, "hostname": "edge-1", "password": "p1", "credential_id": "cred-7"},
                {"id": 8, "hostname": "edge-2", "password": "p2", "credential_id": "cred-8"},
            ],
        }));

        let request = codec.expand(&declared, &NoSecretStore).unwrap();
        let flattened = codec.flatten(Some(&declared), &request.body);

        assert_eq!(flattened.state["instance"], declared["instance"]);
    }

    #[test]
    fn test_uncoercible_value_is_kept() {
        let schema = catalog::edge_connector();
        let response = map(&json!({
            "name": "edge-east",
            "segmentOptions": [
                {"segmentName": "corp", "zoneName": "dmz", "customerAsn": "not-a-number"}
            ],
        }));

        let flattened = Codec::new(&schema).flatten(None, &response);
        let options = flattened.to_json()["segment_options"].clone();

        assert_eq!(options[0]["customer_asn"], json!("not-a-number"));
    }

    #[test]
    fn test_set_collection_is_canonical() {
        let schema = catalog::edge_connector();
        let codec = Codec::new(&schema);
        let forward = map(&json!({
            "segmentOptions": [
                {"segmentName": "corp", "zoneName": "a", "customerAsn": "65001"},
                {"segmentName": "corp", "zoneName": "b", "customerAsn": "65002"},
            ],
        }));
        let backward = map(&json!({
            "segmentOptions": [
                {"segmentName": "corp", "zoneName": "b", "customerAsn": "65002"},
                {"segmentName": "corp", "zoneName": "a", "customerAsn": "65001"},
            ],
        }));

        let a = codec.flatten(None, &forward);
        let b = codec.flatten(None, &backward);

        assert_eq!(a.state, b.state);
        assert!(a.to_json()["segment_options"][0]["customer_asn"].is_i64());
    }

    #[test]
    fn test_empty_collection_handling() {
        let schema = catalog::edge_connector();
        let codec = Codec::new(&schema);
        let response = map(&json!({"name": "edge-east", "instances": []}));

        assert!(!codec.flatten(None, &response).state.contains_key("instance"));

        let prior = map(&json!({"instance": []}));
        assert_eq!(
            codec.flatten(Some(&prior), &response).state["instance"],
            Value::List(Vec::new())
        );
    }

    #[test]
    fn test_inline_secret_survives_round_trip() {
        let schema = catalog::ipsec_site();
        let codec = Codec::new(&schema);
        let declared = map(&json!({
            "name": "vpn-east",
            "segment": "corp",
            "site": [{"name": "branch-1", "customer_gateway_ip": "203.0.113.7", "preshared_keys": ["k1", "k2"]}],
            "vpn_options": {"vpn_mode": "ROUTE_BASED"},
        }));

        let request = codec.expand(&declared, &NoSecretStore).unwrap();
        assert_eq!(request.to_json()["sites"][0]["presharedKeys"], json!(["k1", "k2"]));

        // The remote system assigns an id and never echoes the keys.
        let response = map(&json!({
            "name": "vpn-east",
            "segment": "corp",
            "sites": [{"id": 5, "name": "branch-1", "customerGwIp": "203.0.113.7"}],
            "vpnOptions": {"vpnMode": "ROUTE_BASED"},
        }));
        let flattened = codec.flatten(Some(&declared), &response);

        assert_eq!(
            flattened.to_json()["site"],
            json!([{
                "id": 5,
                "name": "branch-1",
                "customer_gateway_ip": "203.0.113.7",
                "preshared_keys": ["k1", "k2"],
            }])
        );
        assert_eq!(flattened.to_json()["vpn_options"], json!({"vpn_mode": "ROUTE_BASED"}));
        assert_eq!(flattened.summary.by_secondary_key, 1);
    }

    #[test]
    fn test_appended_site_gets_zero_secrets() {
        let schema = catalog::ipsec_site();
        let prior = map(&json!({
            "site": [{"id": 5, "name": "branch-1", "customer_gateway_ip": "203.0.113.7", "preshared_keys": ["k1"]}],
        }));
        let response = map(&json!({
            "sites": [
                {"id": 5, "name": "branch-1", "customerGwIp": "203.0.113.7"},
                {"id": 6, "name": "branch-2", "customerGwIp": "203.0.113.8"},
            ],
        }));

        let flattened = Codec::new(&schema).flatten(Some(&prior), &response);
        let sites = flattened.to_json()["site"].clone();

        assert_eq!(sites[0]["preshared_keys"], json!(["k1"]));
        assert_eq!(sites[1]["preshared_keys"], json!([]));
    }

    #[test]
    fn test_appended_block_zero_fills_union_secrets() {
        use crate::config::{CollectionSpec, ResourceSchema};
        use crate::value::FieldKind;

        let schema = ResourceSchema::new("connector_tunnel", 1).with_collection(
            CollectionSpec::new("tunnel")
                .with_remote("tunnels")
                .with_key("name")
                .with_field(FieldSpec::new("name", FieldKind::String))
                .with_field(FieldSpec::new("psk", FieldKind::String).secret())
                .with_union(catalog::routing_options()),
        );
        let response = map(&json!({
            "tunnels": [{
                "id": 4,
                "name": "t1",
                "routingOptions": {"type": "DYNAMIC", "dynamicOption": {"customerGwAsn": "65001"}},
            }],
        }));

        let flattened = Codec::new(&schema).flatten(None, &response);

        assert_eq!(
            flattened.to_json()["tunnel"],
            json!([{
                "id": 4,
                "name": "t1",
                "psk": "",
                "routing_options": {
                    "type": "DYNAMIC",
                    "dynamic": {"customer_asn": 65001, "bgp_auth_key": ""},
                },
            }])
        );
    }
}
