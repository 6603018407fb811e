//! Built-in resource schemas.
//!
//! Field-mapping tables for the connector kinds shipped with the provider.
//! Configuration files may add or override kinds; see
//! [`ConfigParser`](crate::config::ConfigParser).

use crate::config::{BranchSpec, CollectionSpec, FieldSpec, ResourceSchema, UnionSpec};
use crate::value::FieldKind;

/// Kind name of the IPsec VPN connector.
pub const IPSEC_CONNECTOR: &str = "connector_ipsec";

/// Kind name of the WAN-edge connector.
pub const EDGE_CONNECTOR: &str = "connector_edge";

/// Returns every built-in schema.
#[must_use]
pub fn builtin() -> Vec<ResourceSchema> {
    vec![ipsec_site(), edge_connector()]
}

/// IPsec VPN connector with its endpoint sites.
#[must_use]
pub fn ipsec_site() -> ResourceSchema {
    ResourceSchema::new(IPSEC_CONNECTOR, 2)
        .with_field(FieldSpec::new("name", FieldKind::String).required())
        .with_field(FieldSpec::new("segment", FieldKind::String).required())
        .with_field(FieldSpec::new("size", FieldKind::String))
        .with_field(FieldSpec::new("enabled", FieldKind::Bool))
        .with_collection(
            CollectionSpec::new("site")
                .with_remote("sites")
                .with_key("name")
                .with_field(FieldSpec::new("name", FieldKind::String).required())
                .with_field(
                    FieldSpec::new("customer_gateway_ip", FieldKind::String)
                        .with_remote("customerGwIp")
                        .required(),
                )
                .with_field(
                    FieldSpec::new("preshared_keys", FieldKind::List(Box::new(FieldKind::String)))
                        .with_remote("presharedKeys")
                        .secret(),
                )
                .with_field(
                    FieldSpec::new("enable_tunnel_redundancy", FieldKind::Bool)
                        .with_remote("enableTunnelRedundancy"),
                )
                .with_field(FieldSpec::new("ha_mode", FieldKind::String).with_remote("haMode")),
        )
        .with_union(vpn_options())
        .with_union(routing_options())
}

/// Routing block of the IPsec connector: `STATIC`, `DYNAMIC` or `BOTH`.
#[must_use]
pub fn routing_options() -> UnionSpec {
    UnionSpec::new("routing_options", "type")
        .with_remote("routingOptions")
        .with_variant("STATIC", &["static"], &[])
        .with_variant("DYNAMIC", &["dynamic"], &[])
        .with_variant("BOTH", &["static", "dynamic"], &["availability"])
        .with_branch(
            BranchSpec::new("static").with_remote("staticOption").with_field(
                FieldSpec::new("prefix_list_id", FieldKind::Int)
                    .with_remote("prefixListId")
                    .required(),
            ),
        )
        .with_branch(
            BranchSpec::new("dynamic")
                .with_remote("dynamicOption")
                .with_field(
                    FieldSpec::new("customer_asn", FieldKind::Int)
                        .with_remote("customerGwAsn")
                        .with_remote_kind(FieldKind::String)
                        .required(),
                )
                .with_field(
                    FieldSpec::new("bgp_auth_key", FieldKind::String)
                        .with_remote("bgpAuthKey")
                        .secret(),
                ),
        )
        .with_shared(FieldSpec::new("availability", FieldKind::String))
}

/// VPN mode block of the IPsec connector.
#[must_use]
pub fn vpn_options() -> UnionSpec {
    let prefix_lists = || FieldKind::Set(Box::new(FieldKind::Int));

    UnionSpec::new("vpn_options", "vpn_mode")
        .with_remote("vpnOptions")
        .with_remote_discriminator("vpnMode")
        .with_variant("ROUTE_BASED", &[], &[])
        .with_variant("POLICY_BASED", &["policy"], &[])
        .with_branch(
            BranchSpec::new("policy")
                .with_remote("policyOptions")
                .with_field(
                    FieldSpec::new("on_prem_prefix_list_ids", prefix_lists())
                        .with_remote("onPremPrefixListIds")
                        .required(),
                )
                .with_field(
                    FieldSpec::new("cxp_prefix_list_ids", prefix_lists())
                        .with_remote("cxpPrefixListIds")
                        .required(),
                ),
        )
}

/// WAN-edge connector. Instance credentials are created out-of-band.
#[must_use]
pub fn edge_connector() -> ResourceSchema {
    ResourceSchema::new(EDGE_CONNECTOR, 3)
        .with_field(FieldSpec::new("name", FieldKind::String).required())
        .with_field(FieldSpec::new("segment", FieldKind::String).required())
        .with_field(FieldSpec::new("size", FieldKind::String))
        .with_field(
            FieldSpec::new("billing_tags", FieldKind::Set(Box::new(FieldKind::Int)))
                .with_remote("billingTags"),
        )
        .with_collection(
            CollectionSpec::new("instance")
                .with_remote("instances")
                .with_key("hostname")
                .required()
                .with_field(
                    FieldSpec::new("hostname", FieldKind::String)
                        .with_remote("hostName")
                        .required(),
                )
                .with_field(FieldSpec::new("serial_number", FieldKind::String).with_remote("serialNumber"))
                .with_field(
                    FieldSpec::new("credential_id", FieldKind::String)
                        .with_remote("credentialId")
                        .computed(),
                )
                .with_field(
                    FieldSpec::new("password", FieldKind::String).credential("credential_id", "edge-instance"),
                ),
        )
        .with_collection(
            CollectionSpec::new("segment_options")
                .with_remote("segmentOptions")
                .as_set_since(3)
                .with_key("zone_name")
                .with_field(
                    FieldSpec::new("segment_name", FieldKind::String)
                        .with_remote("segmentName")
                        .required(),
                )
                .with_field(
                    FieldSpec::new("zone_name", FieldKind::String)
                        .with_remote("zoneName")
                        .required(),
                )
                .with_field(FieldSpec::new("groups", FieldKind::Set(Box::new(FieldKind::String))))
                .with_field(
                    FieldSpec::new("customer_asn", FieldKind::Int)
                        .with_remote("customerAsn")
                        .with_remote_kind(FieldKind::String),
                ),
        )
}
