//! Identity matcher for repeated sub-resources.
//!
//! Pairs declared blocks with the entities the remote system returned,
//! without any external correlation key:
//!
//! 1. Declared blocks carrying an assigned primary key are paired with the
//!    remote entity holding that id.
//! 2. Remaining declared blocks fall back to the natural (secondary) key.
//! 3. Remote entities left over are appended, in response order, after every
//!    matched block.
//!
//! Running the id pass over all blocks before the natural-key pass means an
//! id match always wins, even when an earlier block's natural key points at
//! the entity a later block owns by id.
//!
//! Matching is total: an unmatched declared block (not created yet) and an
//! unmatched remote entity (created out-of-band) are both ordinary outcomes.

use tracing::debug;

use crate::model::{DeclaredBlock, MatchOrigin, ReconciledBlock, RemoteEntity};

/// Stateless matcher between declared blocks and remote entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMatcher;

/// Complete output of one matching pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Reconciled blocks in projection order.
    pub blocks: Vec<ReconciledBlock>,
    /// Positions of declared blocks that matched nothing.
    pub pending: Vec<usize>,
}

/// Counts describing a matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MatchSummary {
    /// Blocks paired through their primary key.
    pub by_primary_key: usize,
    /// Blocks paired through their natural key.
    pub by_secondary_key: usize,
    /// Remote entities appended without a declared counterpart.
    pub appended: usize,
    /// Declared blocks with no remote counterpart yet.
    pub pending: usize,
}

impl IdentityMatcher {
    /// Creates a new matcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Matches declared blocks to remote entities.
    ///
    /// Every remote entity appears in exactly one returned block. Matched
    /// blocks keep their declared position; unmatched remote entities follow
    /// in the order the remote system returned them.
    #[must_use]
    pub fn match_blocks(
        &self,
        declared: &[DeclaredBlock],
        remote: &[RemoteEntity],
    ) -> Vec<ReconciledBlock> {
        self.reconcile(declared, remote).blocks
    }

    /// Matches declared blocks to remote entities and reports pending blocks.
    #[must_use]
    pub fn reconcile(&self, declared: &[DeclaredBlock], remote: &[RemoteEntity]) -> MatchOutcome {
        let mut consumed = vec![false; remote.len()];
        let mut pairing: Vec<Option<(usize, MatchOrigin)>> = vec![None; declared.len()];

        for (i, block) in declared.iter().enumerate() {
            let Some(id) = block.assigned_primary_key() else {
                continue;
            };
            if let Some(j) = find_unconsumed(remote, &consumed, |entity| entity.id == *id) {
                debug!("Declared block {} matched remote {} by id", block.position, id);
                consumed[j] = true;
                pairing[i] = Some((j, MatchOrigin::PrimaryKey));
            }
        }

        for (i, block) in declared.iter().enumerate() {
            if pairing[i].is_some() {
                continue;
            }
            let Some(key) = block.usable_secondary_key() else {
                continue;
            };
            if let Some(j) = find_unconsumed(remote, &consumed, |entity| entity.secondary_key == key)
            {
                debug!(
                    "Declared block {} matched remote {} by key '{}'",
                    block.position, remote[j].id, key
                );
                consumed[j] = true;
                pairing[i] = Some((j, MatchOrigin::SecondaryKey));
            }
        }

        let mut blocks = Vec::with_capacity(remote.len());
        let mut pending = Vec::new();
        for (block, pair) in declared.iter().zip(&pairing) {
            match pair {
                Some((j, origin)) => blocks.push(ReconciledBlock::matched(block, &remote[*j], *origin)),
                None => pending.push(block.position),
            }
        }
        blocks.sort_by_key(|b| b.position);

        // Appended blocks start after every declared position so they never
        // collide with a pending block that will be created this cycle.
        let mut next = declared.iter().map(|b| b.position + 1).max().unwrap_or(0);
        for (entity, _) in remote.iter().zip(&consumed).filter(|(_, used)| !**used) {
            debug!("Remote {} has no declared counterpart, appending", entity.id);
            blocks.push(ReconciledBlock::unmatched(entity, next));
            next += 1;
        }

        MatchOutcome { blocks, pending }
    }
}

fn find_unconsumed(
    remote: &[RemoteEntity],
    consumed: &[bool],
    predicate: impl Fn(&RemoteEntity) -> bool,
) -> Option<usize> {
    remote
        .iter()
        .enumerate()
        .find(|(j, entity)| !consumed[*j] && predicate(entity))
        .map(|(j, _)| j)
}

impl MatchOutcome {
    /// Summarizes how the blocks were paired.
    #[must_use]
    pub fn summary(&self) -> MatchSummary {
        let mut summary = MatchSummary {
            pending: self.pending.len(),
            ..MatchSummary::default()
        };
        for block in &self.blocks {
            match block.origin {
                MatchOrigin::PrimaryKey => summary.by_primary_key += 1,
                MatchOrigin::SecondaryKey => summary.by_secondary_key += 1,
                MatchOrigin::Unmatched => summary.appended += 1,
            }
        }
        summary
    }
}

impl MatchSummary {
    /// Adds the counts of another pass.
    pub fn absorb(&mut self, other: Self) {
        self.by_primary_key += other.by_primary_key;
        self.by_secondary_key += other.by_secondary_key;
        self.appended += other.appended;
        self.pending += other.pending;
    }
}

impl std::fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} by id, {} by key, {} appended, {} pending",
            self.by_primary_key, self.by_secondary_key, self.appended, self.pending
        )
    }
}
