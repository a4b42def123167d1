//! Notification intents
//!
//! The engine only decides THAT a notification is needed. Delivery
//! (email, push, UI banners) is an external collaborator consuming these
//! values.

use crate::{
    ids::{ProcessId, WorkItemId},
    shift::Shift,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intent emitted when resolution leaves an assignment without a supervisor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub work_item: WorkItemId,
    pub process: ProcessId,
    pub shift: Shift,
    /// Fixed template identifying the unresolved slot
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationIntent {
    pub fn no_supervisor(work_item: WorkItemId, process: ProcessId, shift: Shift) -> Self {
        let message = format!(
            "No supervisor available for work item {} - process {} - {}. \
             Please assign a supervisor manually.",
            work_item, process, shift
        );
        Self {
            work_item,
            process,
            shift,
            message,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_the_slot() {
        let intent = NotificationIntent::no_supervisor(
            WorkItemId::new("MO-42"),
            ProcessId::new("plating"),
            Shift::Second,
        );
        assert!(intent.message.contains("MO-42"));
        assert!(intent.message.contains("plating"));
        assert!(intent.message.contains("shift_2"));
    }
}
