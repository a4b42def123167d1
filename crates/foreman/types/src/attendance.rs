//! Daily attendance state per (work-center, shift, date)
//!
//! One row per key per date, updated in place as attendance flips during
//! the day. This is the tier-2 resolution input and the routing target
//! for rework.

use crate::{
    ids::{ActorId, SupervisorId, WorkCenterId},
    shift::Shift,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Key for one attendance row
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardKey {
    pub work_center: WorkCenterId,
    pub shift: Shift,
    pub date: NaiveDate,
}

impl BoardKey {
    pub fn new(work_center: WorkCenterId, shift: Shift, date: NaiveDate) -> Self {
        Self {
            work_center,
            shift,
            date,
        }
    }
}

impl std::fmt::Display for BoardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.work_center, self.shift, self.date)
    }
}

/// How the attendance row rates a particular supervisor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// The row names this supervisor as currently on duty
    Present,
    /// The row's configured primary, marked not present
    Absent,
    /// The row says nothing about this supervisor; assume present
    Unknown,
}

/// Attendance determination for one (work-center, shift, date)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyAttendanceStatus {
    pub work_center: WorkCenterId,
    pub shift: Shift,
    pub date: NaiveDate,
    /// The configured primary this row was seeded from
    pub default_supervisor: SupervisorId,
    /// Whoever is currently deemed on duty (primary or backup)
    pub active_supervisor: SupervisorId,
    /// Whether the configured primary made the check-in deadline
    pub primary_present: bool,
    pub check_in_deadline: NaiveTime,
    /// First check-in seen for the primary, if any
    pub login_time: Option<NaiveTime>,
    /// Set when a manual mid-shift override replaced the active supervisor
    pub manually_updated_by: Option<ActorId>,
    pub updated_at: DateTime<Utc>,
}

impl DailyAttendanceStatus {
    /// Seed a fresh row: primary assumed absent until a check-in is seen
    pub fn seeded(
        key: BoardKey,
        default_supervisor: SupervisorId,
        initial_active: SupervisorId,
        check_in_deadline: NaiveTime,
    ) -> Self {
        Self {
            work_center: key.work_center,
            shift: key.shift,
            date: key.date,
            default_supervisor,
            active_supervisor: initial_active,
            primary_present: false,
            check_in_deadline,
            login_time: None,
            manually_updated_by: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> BoardKey {
        BoardKey::new(self.work_center.clone(), self.shift, self.date)
    }

    /// Rate a supervisor against this row.
    ///
    /// A supervisor the row does not mention is `Unknown`, which callers
    /// treat as "assume present until told otherwise".
    pub fn presence_of(&self, supervisor: &SupervisorId) -> Presence {
        if self.active_supervisor == *supervisor {
            Presence::Present
        } else if self.default_supervisor == *supervisor && !self.primary_present {
            Presence::Absent
        } else {
            Presence::Unknown
        }
    }
}
