//! Shift identifiers
//!
//! A shift is a named recurring time window. The plant runs up to three
//! shifts per day; shift timing lives in [`crate::config::ShiftDefault`]
//! and per-work-item enrollments, not here.

use serde::{Deserialize, Serialize};

/// One of the three daily shifts
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Shift {
    /// Shift 1 (typically the day shift)
    #[default]
    #[serde(rename = "shift_1")]
    First,
    /// Shift 2
    #[serde(rename = "shift_2")]
    Second,
    /// Shift 3 (typically overnight)
    #[serde(rename = "shift_3")]
    Third,
}

impl Shift {
    /// Stable wire name, matching the values used across the plant systems
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::First => "shift_1",
            Shift::Second => "shift_2",
            Shift::Third => "shift_3",
        }
    }

    /// All shifts in daily order
    pub fn all() -> [Shift; 3] {
        [Shift::First, Shift::Second, Shift::Third]
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
