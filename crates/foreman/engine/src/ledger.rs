//! Append-only change ledger
//!
//! Append is the sole mutation primitive; entries are never updated or
//! deleted. Sequence numbers are assigned atomically per assignment at
//! commit time, monotonic and gapless. The optional expected-seq guard
//! lets callers detect transitions that raced past the serialization
//! boundary instead of silently interleaving.

use async_trait::async_trait;
use foreman_types::{
    AssignmentId, ChangeDraft, ChangeLogEntry, ForemanError, ForemanResult, SupervisorId,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage boundary for the change ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Commit a draft, assigning the next sequence number for its
    /// assignment. When `expected_seq` is given and does not match the
    /// next sequence number, the append fails with
    /// [`ForemanError::ConcurrentModification`] and nothing is written.
    async fn append(
        &self,
        draft: ChangeDraft,
        expected_seq: Option<u64>,
    ) -> ForemanResult<ChangeLogEntry>;

    /// Full history for an assignment, ordered by sequence number.
    async fn history_for(&self, assignment: &AssignmentId) -> ForemanResult<Vec<ChangeLogEntry>>;

    /// The most recent entry for an assignment.
    async fn head(&self, assignment: &AssignmentId) -> ForemanResult<Option<ChangeLogEntry>>;

    /// Number of committed entries for an assignment.
    async fn len_for(&self, assignment: &AssignmentId) -> ForemanResult<u64>;

    /// The supervisor per the ledger: the last entry's `to_supervisor`.
    /// Must equal the live assignment's assignee at all times.
    async fn current_supervisor(
        &self,
        assignment: &AssignmentId,
    ) -> ForemanResult<Option<SupervisorId>> {
        Ok(self.head(assignment).await?.and_then(|e| e.to_supervisor))
    }
}

/// In-memory arena ledger: one growable entry sequence per assignment.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<HashMap<AssignmentId, Vec<ChangeLogEntry>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(
        &self,
        draft: ChangeDraft,
        expected_seq: Option<u64>,
    ) -> ForemanResult<ChangeLogEntry> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| ForemanError::LedgerAppend("ledger lock poisoned".into()))?;
        let history = guard.entry(draft.assignment_id.clone()).or_default();
        let seq = history.len() as u64;

        if let Some(expected) = expected_seq {
            if expected != seq {
                return Err(ForemanError::ConcurrentModification {
                    assignment: draft.assignment_id,
                    expected,
                    actual: seq,
                });
            }
        }

        let entry = ChangeLogEntry::commit(draft, seq);
        history.push(entry.clone());
        Ok(entry)
    }

    async fn history_for(&self, assignment: &AssignmentId) -> ForemanResult<Vec<ChangeLogEntry>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| ForemanError::LedgerAppend("ledger lock poisoned".into()))?;
        Ok(guard.get(assignment).cloned().unwrap_or_default())
    }

    async fn head(&self, assignment: &AssignmentId) -> ForemanResult<Option<ChangeLogEntry>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| ForemanError::LedgerAppend("ledger lock poisoned".into()))?;
        Ok(guard.get(assignment).and_then(|h| h.last()).cloned())
    }

    async fn len_for(&self, assignment: &AssignmentId) -> ForemanResult<u64> {
        let guard = self
            .entries
            .read()
            .map_err(|_| ForemanError::LedgerAppend("ledger lock poisoned".into()))?;
        Ok(guard.get(assignment).map(|h| h.len() as u64).unwrap_or(0))
    }
}
