//! Reconciler for one resource instance.
//!
//! This module drives one reconciliation cycle: the expand path turns the
//! user's latest configuration into a remote request, and the flatten path
//! turns the remote response into the new persisted state, reporting any
//! drift from the previous state. State written under an older schema must
//! go through [`Reconciler::upgrade`] before the first cycle.

use tracing::{debug, info, warn};

use crate::codec::{Codec, RemoteRequest, SecretStore};
use crate::config::{ProviderConfig, ResourceSchema};
use crate::error::{MigrationError, Result};
use crate::matcher::MatchSummary;
use crate::migrate::SchemaMigrator;
use crate::planner::{DiffEngine, DiffResult};
use crate::state::ResourceState;
use crate::value::FieldMap;

/// Reconciler for one resource kind.
pub struct Reconciler<'a> {
    /// Field-mapping table.
    schema: &'a ResourceSchema,
    /// Secret/credential collaborator.
    secrets: &'a dyn SecretStore,
    /// Diff engine.
    diff_engine: DiffEngine,
}

/// Result of a refresh.
#[derive(Debug, serde::Serialize)]
pub struct ReconciliationResult {
    /// New state to persist.
    pub state: ResourceState,
    /// Difference from the previous state.
    pub drift: DriftReport,
    /// Matching counts over every repeated block.
    pub summary: MatchSummary,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(schema: &'a ResourceSchema, secrets: &'a dyn SecretStore) -> Self {
        Self {
            schema,
            secrets,
            diff_engine: DiffEngine::for_schema(schema),
        }
    }

    /// Creates a reconciler for a kind registered in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown or its schema is newer than
    /// `provider.schema_version`.
    pub fn for_kind(
        config: &'a ProviderConfig,
        kind: &str,
        secrets: &'a dyn SecretStore,
    ) -> Result<Self> {
        Ok(Self::new(config.resource(kind)?, secrets))
    }

    /// Builds the remote request for the declared configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the secret store
    /// fails.
    pub fn plan(&self, declared: &FieldMap) -> Result<RemoteRequest> {
        debug!("Planning {}", self.schema.kind);
        let request = Codec::new(self.schema).expand(declared, self.secrets)?;

        for credential in &request.credentials {
            info!("Created credential {} for {}", credential.id, credential.path);
        }
        Ok(request)
    }

    /// Rebuilds the state from a remote response.
    ///
    /// # Errors
    ///
    /// Returns an error if `prior` belongs to another kind or has not been
    /// upgraded to the current schema version.
    pub fn refresh(
        &self,
        prior: Option<&ResourceState>,
        response: &FieldMap,
    ) -> Result<ReconciliationResult> {
        if let Some(state) = prior {
            self.check_current(state)?;
        }

        let previous = prior.map(|s| &s.attributes);
        let flattened = Codec::new(self.schema).flatten(previous, response);

        let empty = FieldMap::new();
        let diff = self
            .diff_engine
            .compute_diff(previous.unwrap_or(&empty), &flattened.state);
        let drift = DriftReport::from_diff(&diff);

        if drift.has_drift {
            info!("{}: {} attributes drifted", self.schema.kind, drift.drifted_attributes.len());
        } else {
            debug!("{}: state is converged", self.schema.kind);
        }

        Ok(ReconciliationResult {
            state: ResourceState::new(&self.schema.kind, self.schema.version, flattened.state),
            drift,
            summary: flattened.summary,
        })
    }

    /// Checks for drift without producing a new state.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::refresh`].
    pub fn check_drift(&self, prior: &ResourceState, response: &FieldMap) -> Result<DriftReport> {
        Ok(self.refresh(Some(prior), response)?.drift)
    }

    /// Upgrades persisted state to the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be migrated; the input state is
    /// left untouched.
    pub fn upgrade(&self, state: &ResourceState) -> Result<ResourceState> {
        if !state.needs_upgrade(self.schema.version) {
            debug!("{} state already at v{}", state.kind, state.schema_version);
        }

        SchemaMigrator::new(self.schema).upgrade_state(state).map_err(|e| {
            warn!("Keeping {} state at v{}: {e}", state.kind, state.schema_version);
            e.into()
        })
    }

    fn check_current(&self, state: &ResourceState) -> Result<()> {
        if state.kind != self.schema.kind {
            return Err(MigrationError::KindMismatch {
                expected: self.schema.kind.clone(),
                found: state.kind.clone(),
            }
            .into());
        }
        if state.schema_version != self.schema.version {
            return Err(MigrationError::VersionMismatch {
                expected: self.schema.version,
                found: state.schema_version,
            }
            .into());
        }
        Ok(())
    }
}

/// Report of drift detection.
#[derive(Debug, serde::Serialize)]
pub struct DriftReport {
    /// Whether drift was detected.
    pub has_drift: bool,
    /// Top-level attributes that have drifted.
    pub drifted_attributes: Vec<String>,
    /// Attribute-level differences.
    pub diff: DiffResult,
}

impl DriftReport {
    /// Builds a drift report from a diff.
    #[must_use]
    pub fn from_diff(diff: &DiffResult) -> Self {
        Self {
            has_drift: diff.has_changes(),
            drifted_attributes: diff.changed_attributes(),
            diff: diff.clone(),
        }
    }

    /// Returns true if the state is converged (no drift).
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        !self.has_drift
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_drift {
            writeln!(f, "Drift detected:")?;
            for detail in &self.diff.details {
                writeln!(f, "  - {detail}")?;
            }
        } else {
            write!(f, "No drift detected - state is converged")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reconciled {} (schema v{}):", self.state.kind, self.state.schema_version)?;
        writeln!(f, "  Matched by id: {}", self.summary.by_primary_key)?;
        writeln!(f, "  Matched by key: {}", self.summary.by_secondary_key)?;
        writeln!(f, "  Appended: {}", self.summary.appended)?;
        writeln!(f, "  Pending: {}", self.summary.pending)?;
        write!(f, "{}", self.drift)
    }
}
