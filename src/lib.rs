// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Fabric Provider
//!
//! Reconciliation and codec layer of a declarative-configuration provider for
//! a network-fabric API (WAN-edge connectors, IPsec VPN endpoints, routing and
//! segment options).
//!
//! ## Overview
//!
//! Every resource kind is described by a field-mapping table
//! ([`ResourceSchema`]). One generic engine then handles every kind:
//!
//! - Match declared repeated blocks to remote entities without an external
//!   correlation key
//! - Keep write-only secrets the remote system never echoes back
//! - Keep the declarative ordering stable between runs
//! - Carry persisted state across list to set schema changes
//!
//! ## Architecture
//!
//! 1. **Identity Matcher**: pairs declared blocks with remote entities (id first,
//!    natural key second) and appends what is left
//! 2. **Codec**: expand (declared attributes to remote request) and flatten
//!    (remote response to declared projection)
//! 3. **Migrator**: upgrades persisted state to the current schema version
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, resource schemas and validation
//! - [`catalog`]: Built-in resource schemas
//! - [`matcher`]: Identity matcher
//! - [`codec`]: Expand and flatten
//! - [`migrate`]: Schema version migrator
//! - [`planner`]: Projection diffs
//! - [`reconciler`]: One reconciliation cycle
//! - [`state`]: Persisted state record
//!
//! ## Example
//!
//! ```yaml
//! provider:
//!   name: fabric
//!   schema_version: 3
//!
//! logging:
//!   level: info
//!
//! resources:
//!   - kind: connector_edge
//!     version: 3
//!     fields:
//!       - name: name
//!         kind: string
//!         required: true
//!     collections:
//!       - name: instance
//!         remote: instances
//!         key_field: hostname
//!         fields:
//!           - name: hostname
//!             remote: hostName
//!             kind: string
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod logging;
pub mod matcher;
pub mod migrate;
pub mod model;
pub mod planner;
pub mod reconciler;
pub mod state;
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Codec, Flattened, NoSecretStore, RemoteRequest, SecretStore};
pub use config::{ConfigParser, ConfigValidator, ProviderConfig, ResourceSchema};
pub use error::{FabricError, Result};
pub use hash::RecordHasher;
pub use matcher::{IdentityMatcher, MatchSummary};
pub use migrate::SchemaMigrator;
pub use model::{DeclaredBlock, Identifier, ReconciledBlock, RemoteEntity};
pub use planner::{DiffEngine, DiffResult};
pub use reconciler::{DriftReport, ReconciliationResult, Reconciler};
pub use state::ResourceState;
pub use value::{FieldKind, FieldMap, Value};
