//! Assignments and resolution outcomes
//!
//! An [`Assignment`] is the live, mutable resolution outcome for one open
//! process execution. At most one non-closed assignment exists per
//! (work item, process); the assignment book enforces that.

use crate::{
    attendance::BoardKey,
    ids::{AssignmentId, ProcessId, SupervisorId, WorkCenterId, WorkItemId},
    ledger::ChangeReason,
    shift::Shift,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key identifying one process execution slot
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentKey {
    pub work_item: WorkItemId,
    pub process: ProcessId,
}

impl AssignmentKey {
    pub fn new(work_item: WorkItemId, process: ProcessId) -> Self {
        Self { work_item, process }
    }
}

impl std::fmt::Display for AssignmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.work_item, self.process)
    }
}

/// Key for one resolution request: an execution slot within a shift
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionKey {
    pub work_item: WorkItemId,
    pub process: ProcessId,
    pub shift: Shift,
}

impl ResolutionKey {
    pub fn new(work_item: WorkItemId, process: ProcessId, shift: Shift) -> Self {
        Self {
            work_item,
            process,
            shift,
        }
    }

    pub fn assignment_key(&self) -> AssignmentKey {
        AssignmentKey::new(self.work_item.clone(), self.process.clone())
    }
}

impl std::fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.work_item, self.process, self.shift)
    }
}

/// Which precedence tier produced a resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// Per (work item, process, shift) override
    Override,
    /// Daily attendance row's active supervisor
    Attendance,
    /// Work-center shift default
    Default,
    /// Nothing matched; unresolved
    None,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Override => "override",
            ResolutionTier::Attendance => "attendance",
            ResolutionTier::Default => "default",
            ResolutionTier::None => "none",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssignmentState {
    /// Open, but resolution has not produced a supervisor
    #[default]
    Unassigned,
    /// Open with a current supervisor
    Assigned,
    /// Terminal; no further transitions accepted
    Closed,
}

impl AssignmentState {
    pub fn is_open(&self) -> bool {
        !matches!(self, AssignmentState::Closed)
    }
}

/// The configuration record a resolution was derived from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionSource {
    /// An active supervisor override for the resolution key
    Override(ResolutionKey),
    /// A daily attendance row
    Attendance(BoardKey),
    /// A work-center shift default
    Default { work_center: WorkCenterId, shift: Shift },
    /// No source; unresolved
    None,
}

/// Outcome of one resolution request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Resolved supervisor; `None` is a valid terminal outcome
    pub supervisor: Option<SupervisorId>,
    pub tier: ResolutionTier,
    /// Reason code the initial ledger entry should carry
    pub reason: ChangeReason,
    pub source: ResolutionSource,
}

impl ResolutionResult {
    pub fn resolved(
        supervisor: SupervisorId,
        tier: ResolutionTier,
        reason: ChangeReason,
        source: ResolutionSource,
    ) -> Self {
        Self {
            supervisor: Some(supervisor),
            tier,
            reason,
            source,
        }
    }

    /// The unresolved terminal outcome (not an error)
    pub fn unresolved(reason: ChangeReason) -> Self {
        Self {
            supervisor: None,
            tier: ResolutionTier::None,
            reason,
            source: ResolutionSource::None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.supervisor.is_some()
    }
}

/// The live resolution outcome for one open process execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub work_item: WorkItemId,
    pub process: ProcessId,
    pub shift: Shift,
    /// Currently assigned supervisor; `None` means unresolved
    pub supervisor: Option<SupervisorId>,
    /// Tier that produced the current assignee
    pub tier: ResolutionTier,
    pub state: AssignmentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Create a fresh, unresolved assignment
    pub fn new(work_item: WorkItemId, process: ProcessId, shift: Shift) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentId::generate(),
            work_item,
            process,
            shift,
            supervisor: None,
            tier: ResolutionTier::None,
            state: AssignmentState::Unassigned,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey::new(self.work_item.clone(), self.process.clone())
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }
}
