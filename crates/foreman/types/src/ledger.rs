//! Change ledger records
//!
//! Every resolution and reassignment appends exactly one entry. Entries
//! are never updated or deleted; sequence numbers are per-assignment,
//! monotonic, and gapless.

use crate::{
    assignment::AssignmentState,
    ids::{ActorId, AssignmentId, SupervisorId},
    shift::Shift,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a supervisor change happened
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    /// First assignment at process start
    #[serde(rename = "initial_assignment")]
    InitialAssignment,
    /// Attendance determination moved the assignment (primary absent, or
    /// flipped back present)
    #[serde(rename = "attendance_absence")]
    AttendanceAbsence,
    /// Mid-process change applied to a single assignment
    #[serde(rename = "mid_process_change")]
    MidProcessChange,
    /// Assignment moved to a different shift
    #[serde(rename = "shift_change")]
    ShiftChange,
    /// Bulk manual override issued against an attendance row
    #[serde(rename = "manual_override")]
    ManualOverride,
    /// Resolution bound a rework unit to the currently active supervisor
    #[serde(rename = "rework_routing")]
    ReworkRouting,
    /// Both primary and backup ruled out in the same attendance window
    #[serde(rename = "both_unavailable")]
    BothUnavailable,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::InitialAssignment => "initial_assignment",
            ChangeReason::AttendanceAbsence => "attendance_absence",
            ChangeReason::MidProcessChange => "mid_process_change",
            ChangeReason::ShiftChange => "shift_change",
            ChangeReason::ManualOverride => "manual_override",
            ChangeReason::ReworkRouting => "rework_routing",
            ChangeReason::BothUnavailable => "both_unavailable",
        }
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change about to be committed; seq and timestamp are assigned by the
/// ledger at append time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeDraft {
    pub assignment_id: AssignmentId,
    pub from_supervisor: Option<SupervisorId>,
    pub to_supervisor: Option<SupervisorId>,
    pub reason: ChangeReason,
    pub note: String,
    pub shift: Shift,
    /// Who initiated the change; `None` for system-triggered changes
    pub changed_by: Option<ActorId>,
    /// Assignment lifecycle state at the moment of change
    pub state_at_change: AssignmentState,
}

impl ChangeDraft {
    pub fn new(
        assignment_id: AssignmentId,
        from_supervisor: Option<SupervisorId>,
        to_supervisor: Option<SupervisorId>,
        reason: ChangeReason,
        shift: Shift,
        state_at_change: AssignmentState,
    ) -> Self {
        Self {
            assignment_id,
            from_supervisor,
            to_supervisor,
            reason,
            note: String::new(),
            shift,
            changed_by: None,
            state_at_change,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.changed_by = Some(actor);
        self
    }
}

/// One committed, immutable ledger entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub assignment_id: AssignmentId,
    /// Per-assignment sequence number, assigned at commit
    pub seq: u64,
    pub from_supervisor: Option<SupervisorId>,
    pub to_supervisor: Option<SupervisorId>,
    pub reason: ChangeReason,
    pub note: String,
    pub shift: Shift,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<ActorId>,
    pub state_at_change: AssignmentState,
}

impl ChangeLogEntry {
    /// Commit a draft at a given sequence number
    pub fn commit(draft: ChangeDraft, seq: u64) -> Self {
        Self {
            assignment_id: draft.assignment_id,
            seq,
            from_supervisor: draft.from_supervisor,
            to_supervisor: draft.to_supervisor,
            reason: draft.reason,
            note: draft.note,
            shift: draft.shift,
            changed_at: Utc::now(),
            changed_by: draft.changed_by,
            state_at_change: draft.state_at_change,
        }
    }
}

/// Verify ledger continuity for one assignment's ordered history:
/// `to_supervisor` of entry N must equal `from_supervisor` of entry N+1,
/// and sequence numbers must be gapless from zero.
pub fn verify_continuity(history: &[ChangeLogEntry]) -> bool {
    for (i, entry) in history.iter().enumerate() {
        if entry.seq != i as u64 {
            return false;
        }
        if i > 0 && history[i - 1].to_supervisor != entry.from_supervisor {
            return false;
        }
    }
    true
}
