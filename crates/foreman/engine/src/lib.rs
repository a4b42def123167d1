//! Supervisor resolution engine
//!
//! Decides which supervisor is responsible for each open process
//! execution in the plant. Resolution walks a strict precedence of
//! configuration tiers (override, attendance, shift default), every
//! supervisor change is committed to an append-only per-assignment
//! ledger before the live record moves, and outcomes that leave a slot
//! without a supervisor raise a notification intent for manual
//! follow-up.
//!
//! [`service::SupervisionService`] is the intended entry point; the
//! component modules are public for embedders that need finer control.

#![deny(unsafe_code)]

pub mod assignments;
pub mod attendance;
pub mod gate;
pub mod ledger;
pub mod resolver;
pub mod service;
pub mod store;

pub use assignments::AssignmentBook;
pub use attendance::{AttendanceBoard, AttendanceCheckSummary, AttendanceFlip};
pub use gate::NotificationGate;
pub use ledger::{InMemoryLedger, LedgerStore};
pub use resolver::{
    AttendanceResolver, DefaultResolver, OverrideResolver, ResolutionEngine, ResolutionPolicy,
    TierOutcome, TierResolution, TierResolver,
};
pub use service::{SlotHistory, SupervisionService};
pub use store::{ConfigStore, InMemoryConfigStore};
