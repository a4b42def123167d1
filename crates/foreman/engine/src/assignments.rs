//! Assignment book
//!
//! Holds the live assignment per open process execution and drives the
//! lifecycle state machine: Unassigned -> Assigned -> (reassigned)* ->
//! Closed. Every transition that changes the assignee commits a ledger
//! entry BEFORE the in-memory record is touched, so the live assignee
//! and the ledger head can never disagree. A failed append leaves the
//! assignment exactly as it was.
//!
//! Transitions for one execution slot are serialized through a per-key
//! mutex; the expected-seq guard on append backstops any writer that
//! reaches the ledger outside that serialization.

use crate::ledger::LedgerStore;
use foreman_types::{
    ActorId, Assignment, AssignmentId, AssignmentKey, AssignmentState, ChangeDraft, ChangeReason,
    ForemanError, ForemanResult, ResolutionKey, ResolutionResult, ResolutionTier, Shift,
    SupervisorId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

fn poisoned(which: &str) -> ForemanError {
    ForemanError::StoreUnavailable(format!("{which} lock poisoned"))
}

/// Live assignments, indexed by id and by open execution slot.
pub struct AssignmentBook {
    ledger: Arc<dyn LedgerStore>,
    assignments: RwLock<HashMap<AssignmentId, Assignment>>,
    /// At most one open assignment per (work item, process).
    open_index: RwLock<HashMap<AssignmentKey, AssignmentId>>,
    /// Per-slot transition serialization.
    key_locks: Mutex<HashMap<AssignmentKey, Arc<Mutex<()>>>>,
}

impl AssignmentBook {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            assignments: RwLock::new(HashMap::new()),
            open_index: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, key: &AssignmentKey) -> Arc<Mutex<()>> {
        let mut guard = self.key_locks.lock().await;
        guard.entry(key.clone()).or_default().clone()
    }

    /// Open an assignment for an execution slot and commit the initial
    /// resolution outcome.
    ///
    /// A resolved outcome writes the seq-0 ledger entry and lands the
    /// assignment in `Assigned`. An unresolved outcome opens the slot in
    /// `Unassigned` with no ledger entry; its first entry is written when
    /// a supervisor is later assigned.
    pub async fn open(
        &self,
        key: &ResolutionKey,
        result: &ResolutionResult,
        actor: Option<ActorId>,
    ) -> ForemanResult<Assignment> {
        let slot = key.assignment_key();
        let lock = self.lock_for(&slot).await;
        let _serialized = lock.lock().await;

        {
            let index = self.open_index.read().map_err(|_| poisoned("open_index"))?;
            if index.contains_key(&slot) {
                return Err(ForemanError::DuplicateOpenAssignment {
                    work_item: slot.work_item,
                    process: slot.process,
                });
            }
        }

        let mut assignment =
            Assignment::new(key.work_item.clone(), key.process.clone(), key.shift);

        if let Some(supervisor) = &result.supervisor {
            let mut draft = ChangeDraft::new(
                assignment.id.clone(),
                None,
                Some(supervisor.clone()),
                result.reason,
                key.shift,
                AssignmentState::Assigned,
            );
            if let Some(actor) = actor {
                draft = draft.with_actor(actor);
            }
            // Ledger first. A failed append aborts the open entirely.
            self.ledger.append(draft, Some(0)).await?;
            assignment.supervisor = Some(supervisor.clone());
            assignment.tier = result.tier;
            assignment.state = AssignmentState::Assigned;
            info!(
                assignment = %assignment.id.short(),
                slot = %slot,
                supervisor = %supervisor,
                tier = %result.tier,
                "Assignment opened"
            );
        } else {
            info!(assignment = %assignment.id.short(), slot = %slot, "Assignment opened unresolved");
        }

        {
            let mut all = self.assignments.write().map_err(|_| poisoned("assignments"))?;
            all.insert(assignment.id.clone(), assignment.clone());
        }
        {
            let mut index = self.open_index.write().map_err(|_| poisoned("open_index"))?;
            index.insert(slot, assignment.id.clone());
        }
        Ok(assignment)
    }

    /// Move an open assignment to a new supervisor.
    ///
    /// Reassigning to the current supervisor is a no-op and writes no
    /// ledger entry. A `Closed` assignment rejects the transition.
    pub async fn reassign(
        &self,
        assignment_id: &AssignmentId,
        to: SupervisorId,
        tier: ResolutionTier,
        reason: ChangeReason,
        note: Option<String>,
        actor: Option<ActorId>,
    ) -> ForemanResult<Assignment> {
        let slot = self.get(assignment_id)?.key();
        let lock = self.lock_for(&slot).await;
        let _serialized = lock.lock().await;

        // Re-read under the slot lock.
        let current = self.get(assignment_id)?;
        if current.state == AssignmentState::Closed {
            return Err(ForemanError::InvalidStateTransition(format!(
                "assignment {} is closed",
                assignment_id
            )));
        }
        if current.supervisor.as_ref() == Some(&to) {
            debug!(assignment = %assignment_id.short(), supervisor = %to, "Reassignment is a no-op");
            return Ok(current);
        }

        let expected_seq = self.ledger.len_for(assignment_id).await?;
        let mut draft = ChangeDraft::new(
            assignment_id.clone(),
            current.supervisor.clone(),
            Some(to.clone()),
            reason,
            current.shift,
            AssignmentState::Assigned,
        );
        if let Some(note) = note {
            draft = draft.with_note(note);
        }
        if let Some(actor) = actor {
            draft = draft.with_actor(actor);
        }
        let entry = self.ledger.append(draft, Some(expected_seq)).await?;

        let mut all = self.assignments.write().map_err(|_| poisoned("assignments"))?;
        let assignment = all
            .get_mut(assignment_id)
            .ok_or_else(|| ForemanError::AssignmentNotFound(assignment_id.clone()))?;
        assignment.supervisor = Some(to.clone());
        assignment.tier = tier;
        assignment.state = AssignmentState::Assigned;
        assignment.updated_at = entry.changed_at;
        info!(
            assignment = %assignment_id.short(),
            from = entry.from_supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
            to = %to,
            reason = %reason,
            seq = entry.seq,
            "Assignment moved"
        );
        Ok(assignment.clone())
    }

    /// Move an open assignment onto a different shift, logging a
    /// shift-change entry with the resolution outcome for the new shift.
    pub async fn change_shift(
        &self,
        assignment_id: &AssignmentId,
        new_shift: Shift,
        result: &ResolutionResult,
        actor: Option<ActorId>,
    ) -> ForemanResult<Assignment> {
        let slot = self.get(assignment_id)?.key();
        let lock = self.lock_for(&slot).await;
        let _serialized = lock.lock().await;

        let current = self.get(assignment_id)?;
        if current.state == AssignmentState::Closed {
            return Err(ForemanError::InvalidStateTransition(format!(
                "assignment {} is closed",
                assignment_id
            )));
        }
        if current.shift == new_shift {
            return Ok(current);
        }

        let next_state = if result.is_resolved() {
            AssignmentState::Assigned
        } else {
            AssignmentState::Unassigned
        };
        let expected_seq = self.ledger.len_for(assignment_id).await?;
        let mut draft = ChangeDraft::new(
            assignment_id.clone(),
            current.supervisor.clone(),
            result.supervisor.clone(),
            ChangeReason::ShiftChange,
            new_shift,
            next_state,
        );
        if let Some(actor) = actor {
            draft = draft.with_actor(actor);
        }
        let entry = self.ledger.append(draft, Some(expected_seq)).await?;

        let mut all = self.assignments.write().map_err(|_| poisoned("assignments"))?;
        let assignment = all
            .get_mut(assignment_id)
            .ok_or_else(|| ForemanError::AssignmentNotFound(assignment_id.clone()))?;
        assignment.shift = new_shift;
        assignment.supervisor = result.supervisor.clone();
        assignment.tier = result.tier;
        assignment.state = next_state;
        assignment.updated_at = entry.changed_at;
        info!(
            assignment = %assignment_id.short(),
            shift = %new_shift,
            supervisor = assignment.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
            "Assignment moved to new shift"
        );
        Ok(assignment.clone())
    }

    /// Close an assignment. Terminal: no further transitions accepted,
    /// and the slot becomes free for a new execution. Closing writes no
    /// ledger entry; the history ends at the last assignee.
    pub async fn close(&self, assignment_id: &AssignmentId) -> ForemanResult<Assignment> {
        let slot = self.get(assignment_id)?.key();
        let lock = self.lock_for(&slot).await;
        let _serialized = lock.lock().await;

        let mut all = self.assignments.write().map_err(|_| poisoned("assignments"))?;
        let assignment = all
            .get_mut(assignment_id)
            .ok_or_else(|| ForemanError::AssignmentNotFound(assignment_id.clone()))?;
        if assignment.state == AssignmentState::Closed {
            return Err(ForemanError::InvalidStateTransition(format!(
                "assignment {} is already closed",
                assignment_id
            )));
        }
        assignment.state = AssignmentState::Closed;
        assignment.updated_at = chrono::Utc::now();
        let closed = assignment.clone();
        drop(all);

        let mut index = self.open_index.write().map_err(|_| poisoned("open_index"))?;
        index.remove(&slot);
        info!(assignment = %assignment_id.short(), slot = %slot, "Assignment closed");
        Ok(closed)
    }

    pub fn get(&self, assignment_id: &AssignmentId) -> ForemanResult<Assignment> {
        let all = self.assignments.read().map_err(|_| poisoned("assignments"))?;
        all.get(assignment_id)
            .cloned()
            .ok_or_else(|| ForemanError::AssignmentNotFound(assignment_id.clone()))
    }

    /// The open assignment for an execution slot, if any.
    pub fn open_for(&self, key: &AssignmentKey) -> ForemanResult<Option<Assignment>> {
        let index = self.open_index.read().map_err(|_| poisoned("open_index"))?;
        let Some(id) = index.get(key) else {
            return Ok(None);
        };
        let all = self.assignments.read().map_err(|_| poisoned("assignments"))?;
        Ok(all.get(id).cloned())
    }

    /// Every assignment ever opened for a slot, closed ones included,
    /// oldest first.
    pub fn assignments_for(&self, key: &AssignmentKey) -> ForemanResult<Vec<Assignment>> {
        let all = self.assignments.read().map_err(|_| poisoned("assignments"))?;
        let mut matches: Vec<Assignment> =
            all.values().filter(|a| a.key() == *key).cloned().collect();
        matches.sort_by_key(|a| a.created_at);
        Ok(matches)
    }

    /// Every assignment for a work item, across all its processes,
    /// oldest first.
    pub fn assignments_for_item(
        &self,
        work_item: &foreman_types::WorkItemId,
    ) -> ForemanResult<Vec<Assignment>> {
        let all = self.assignments.read().map_err(|_| poisoned("assignments"))?;
        let mut matches: Vec<Assignment> = all
            .values()
            .filter(|a| a.work_item == *work_item)
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.created_at);
        Ok(matches)
    }

    /// Snapshot of all open assignments.
    pub fn open_assignments(&self) -> ForemanResult<Vec<Assignment>> {
        let index = self.open_index.read().map_err(|_| poisoned("open_index"))?;
        let all = self.assignments.read().map_err(|_| poisoned("assignments"))?;
        Ok(index.values().filter_map(|id| all.get(id).cloned()).collect())
    }

    /// Open assignments still waiting for a supervisor.
    pub fn unresolved_assignments(&self) -> ForemanResult<Vec<Assignment>> {
        Ok(self
            .open_assignments()?
            .into_iter()
            .filter(|a| a.supervisor.is_none())
            .collect())
    }
}
