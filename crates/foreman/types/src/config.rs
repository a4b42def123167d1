//! Static supervision configuration: defaults, enrollments, overrides
//!
//! These records are administered outside the resolution engine and read
//! by it as resolution inputs. The engine only writes overrides through
//! the superseding rule (at most one active override per key).

use crate::{
    errors::{ForemanError, ForemanResult},
    ids::{ActorId, ProcessId, SupervisorId, WorkCenterId, WorkItemId},
    shift::Shift,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A process step definition, tying the step to its physical work-center
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Process identity
    pub id: ProcessId,
    /// Human-readable name (e.g., "Coiling Operation")
    pub name: String,
    /// The work-center where this process physically runs
    pub work_center: WorkCenterId,
}

impl ProcessDefinition {
    pub fn new(
        id: ProcessId,
        name: impl Into<String>,
        work_center: WorkCenterId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            work_center,
        }
    }
}

/// Global default supervisors for a (work-center, shift) pair
///
/// This is the tier-3 resolution fallback and the seed for each day's
/// attendance row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftDefault {
    pub work_center: WorkCenterId,
    pub shift: Shift,
    /// Primary supervisor for this work-center/shift
    pub primary: SupervisorId,
    /// Backup when the primary is absent
    pub backup: SupervisorId,
    /// Shift start time-of-day
    pub shift_start: NaiveTime,
    /// Shift end time-of-day (may wrap past midnight for shift 3)
    pub shift_end: NaiveTime,
    /// Primary must have checked in by this time to count as present
    pub check_in_deadline: NaiveTime,
    pub active: bool,
}

impl ShiftDefault {
    /// Create a default with a 09:00-17:00 window and a 09:15 deadline
    pub fn new(
        work_center: WorkCenterId,
        shift: Shift,
        primary: SupervisorId,
        backup: SupervisorId,
    ) -> Self {
        Self {
            work_center,
            shift,
            primary,
            backup,
            shift_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            check_in_deadline: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            active: true,
        }
    }

    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.shift_start = start;
        self.shift_end = end;
        self
    }

    pub fn with_check_in_deadline(mut self, deadline: NaiveTime) -> Self {
        self.check_in_deadline = deadline;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether a given time-of-day falls inside this shift's window
    ///
    /// Handles windows that wrap past midnight (start > end).
    pub fn contains(&self, at: NaiveTime) -> bool {
        if self.shift_start <= self.shift_end {
            self.shift_start <= at && at < self.shift_end
        } else {
            at >= self.shift_start || at < self.shift_end
        }
    }
}

/// Declares that a work item participates in a given shift
///
/// Absence of an enrollment for a shift means that shift does not apply
/// to the item (beyond the implicit shift 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftEnrollment {
    pub work_item: WorkItemId,
    pub shift: Shift,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub active: bool,
}

impl ShiftEnrollment {
    pub fn new(
        work_item: WorkItemId,
        shift: Shift,
        shift_start: NaiveTime,
        shift_end: NaiveTime,
    ) -> Self {
        Self {
            work_item,
            shift,
            shift_start,
            shift_end,
            active: true,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Per (work item, process, shift) supervisor override
///
/// Takes precedence over attendance data and shift defaults. At most one
/// ACTIVE override may exist for a key; creating a new one supersedes the
/// prior active one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupervisorOverride {
    pub work_item: WorkItemId,
    pub process: ProcessId,
    pub shift: Shift,
    /// Overridden primary supervisor
    pub primary: SupervisorId,
    /// Optional overridden backup; `None` means fall through to the next
    /// tier when the primary is absent
    pub backup: Option<SupervisorId>,
    /// Free-text reason for the override
    pub reason: String,
    pub active: bool,
    /// Who created the override (None for migrated/seeded records)
    pub created_by: Option<ActorId>,
    pub created_at: DateTime<Utc>,
}

impl SupervisorOverride {
    pub fn new(
        work_item: WorkItemId,
        process: ProcessId,
        shift: Shift,
        primary: SupervisorId,
    ) -> Self {
        Self {
            work_item,
            process,
            shift,
            primary,
            backup: None,
            reason: String::new(),
            active: true,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_backup(mut self, backup: SupervisorId) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_created_by(mut self, actor: ActorId) -> Self {
        self.created_by = Some(actor);
        self
    }

    /// Structural validation applied before the override is stored
    pub fn validate(&self) -> ForemanResult<()> {
        if let Some(backup) = &self.backup {
            if *backup == self.primary {
                return Err(ForemanError::OverrideInvalid(
                    "primary and backup supervisors must be different".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_shift_window_contains() {
        let def = ShiftDefault::new(
            WorkCenterId::new("coiling"),
            Shift::First,
            SupervisorId::new("S1"),
            SupervisorId::new("S2"),
        )
        .with_window(t(9, 0), t(17, 0));

        assert!(def.contains(t(9, 0)));
        assert!(def.contains(t(12, 30)));
        assert!(!def.contains(t(17, 0)));
        assert!(!def.contains(t(8, 59)));
    }

    #[test]
    fn test_overnight_window_wraps() {
        let def = ShiftDefault::new(
            WorkCenterId::new("coiling"),
            Shift::Third,
            SupervisorId::new("S5"),
            SupervisorId::new("S6"),
        )
        .with_window(t(22, 0), t(6, 0));

        assert!(def.contains(t(23, 30)));
        assert!(def.contains(t(2, 0)));
        assert!(!def.contains(t(12, 0)));
    }

    #[test]
    fn test_override_validation_rejects_same_primary_backup() {
        let ovr = SupervisorOverride::new(
            WorkItemId::new("MO-1"),
            ProcessId::new("coiling-op"),
            Shift::First,
            SupervisorId::new("S1"),
        )
        .with_backup(SupervisorId::new("S1"));

        assert!(ovr.validate().is_err());
    }

    #[test]
    fn test_override_without_backup_is_valid() {
        let ovr = SupervisorOverride::new(
            WorkItemId::new("MO-1"),
            ProcessId::new("coiling-op"),
            Shift::First,
            SupervisorId::new("S1"),
        );
        assert!(ovr.validate().is_ok());
    }
}
