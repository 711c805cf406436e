//! Bulk dirtying coordinator.
//!
//! Marks many databases dirty in a few round trips instead of one write per database. A
//! burst of observed writes can span thousands of distinct databases; batching turns that
//! into one index query plus one bulk compare-and-swap per convergence round.
//!
//! Each round works on a shrinking set: conflicts mean some other process already
//! advanced those documents, so only the conflicted names are retried. No blocking
//! primitive is involved anywhere, which is why the loop cannot deadlock.

use std::collections::BTreeSet;

use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, VigilResult};
use crate::listeners::Listeners;
use crate::store::base::{BulkOutcome, ListenerIndex, ListenerStore};
use crate::types::ListenerPatch;

impl<S> Listeners<S>
where
    S: ListenerStore,
{
    /// Marks every given database dirty, batching the writes and converging through
    /// conflicts.
    ///
    /// Candidates come from the clean-or-locked view. Locked listeners are included on
    /// purpose: a dirty signal that arrives while a replication is in flight must bump
    /// the document's revision so the replication is retried once it completes. Names
    /// with no listener yet are created dirty via merge-upsert, which cannot conflict.
    /// Names that are already dirty and unlocked need no write at all.
    ///
    /// Conflicted names are retried in the next round, and only those. When
    /// [`CoordinatorConfig::max_dirty_rounds`](vigil_config::shared::CoordinatorConfig)
    /// is set, exceeding it fails with [`ErrorKind::DirtyRoundsExhausted`]; by default
    /// the loop runs until the conflict set is empty.
    pub async fn dirty_if_clean_or_locked<I>(&self, db_names: I) -> VigilResult<()>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut pending: BTreeSet<String> = db_names.into_iter().map(Into::into).collect();

        let mut round: u32 = 0;
        while !pending.is_empty() {
            round += 1;
            if let Some(max_rounds) = self.config().max_dirty_rounds {
                if round > max_rounds {
                    bail!(
                        ErrorKind::DirtyRoundsExhausted,
                        "Bulk dirtying did not converge within the configured rounds",
                        format!("round {round}, {} names pending", pending.len())
                    );
                }
            }

            let conflicted = self.attempt_dirty_round(&pending).await?;
            if !conflicted.is_empty() {
                debug!(
                    round,
                    conflicted = conflicted.len(),
                    "bulk dirty round conflicted, retrying subset"
                );
            }
            pending = conflicted;
        }

        Ok(())
    }

    /// One query-and-write pass over `names`. Returns the names whose compare-and-swap
    /// was rejected this round.
    async fn attempt_dirty_round(&self, names: &BTreeSet<String>) -> VigilResult<BTreeSet<String>> {
        let keys: Vec<String> = names.iter().cloned().collect();

        let candidates = self
            .store()
            .query_index(ListenerIndex::CleanOrLockedByDbName, &keys)
            .await?;

        // A requested name missing from the view is either dirty-and-unlocked (already
        // converged) or has no listener at all. The full index tells the two apart.
        let found: BTreeSet<&str> = candidates
            .iter()
            .map(|listener| listener.db_name())
            .collect();
        let residual: Vec<String> = keys
            .iter()
            .filter(|name| !found.contains(name.as_str()))
            .cloned()
            .collect();

        if !residual.is_empty() {
            let existing: BTreeSet<String> = self
                .store()
                .query_index(ListenerIndex::ByDbName, &residual)
                .await?
                .into_iter()
                .map(|listener| listener.db_name().to_string())
                .collect();

            for db_name in residual.iter().filter(|name| !existing.contains(*name)) {
                // Creation is a merge-upsert by deterministic id: racing creators
                // converge on one document and none of them can conflict.
                self.store()
                    .merge_upsert(ListenerPatch::create_dirty(db_name))
                    .await?;
            }
        }

        if candidates.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mutations = candidates
            .iter()
            .map(|listener| listener.with_dirty())
            .collect();
        let outcomes = self.store().bulk_update(mutations).await?;

        let conflicted = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                BulkOutcome::Conflicted { db_name } => Some(db_name),
                BulkOutcome::Updated(_) => None,
            })
            .collect();

        Ok(conflicted)
    }
}
