//! Supervisor assignment domain types
//!
//! Pure data: identifiers, shift configuration, attendance rows,
//! assignments, change-ledger records, and the error taxonomy. All
//! decision logic lives in `foreman-engine`.

#![deny(unsafe_code)]

pub mod assignment;
pub mod attendance;
pub mod config;
pub mod errors;
pub mod ids;
pub mod ledger;
pub mod notification;
pub mod shift;

pub use assignment::{
    Assignment, AssignmentKey, AssignmentState, ResolutionKey, ResolutionResult,
    ResolutionSource, ResolutionTier,
};
pub use attendance::{BoardKey, DailyAttendanceStatus, Presence};
pub use config::{ProcessDefinition, ShiftDefault, ShiftEnrollment, SupervisorOverride};
pub use errors::{ForemanError, ForemanResult};
pub use ids::{ActorId, AssignmentId, ProcessId, SupervisorId, WorkCenterId, WorkItemId};
pub use ledger::{verify_continuity, ChangeDraft, ChangeLogEntry, ChangeReason};
pub use notification::NotificationIntent;
pub use shift::Shift;
