//! Notification gate
//!
//! The single decision point for "does this outcome need a human".
//! Pure: same outcome in, same decision out. Delivery belongs to
//! whoever consumes the emitted intents.

use foreman_types::{NotificationIntent, ResolutionKey, ResolutionResult};
use tracing::warn;

#[derive(Default)]
pub struct NotificationGate;

impl NotificationGate {
    pub fn new() -> Self {
        Self
    }

    /// Emit an intent iff the outcome left the slot without a supervisor.
    pub fn evaluate(
        &self,
        key: &ResolutionKey,
        result: &ResolutionResult,
    ) -> Option<NotificationIntent> {
        if result.is_resolved() {
            return None;
        }
        warn!(key = %key, reason = %result.reason, "No supervisor resolved; flagging for manual assignment");
        Some(NotificationIntent::no_supervisor(
            key.work_item.clone(),
            key.process.clone(),
            key.shift,
        ))
    }
}
