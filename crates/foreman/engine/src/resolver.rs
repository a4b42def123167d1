//! Tiered supervisor resolution
//!
//! Resolution walks an ordered list of tier resolvers; the first tier to
//! produce a supervisor wins. Adding a new tier is a one-line insertion
//! in [`ResolutionEngine::new`]. Resolving against empty configuration is
//! not an error: it yields the unresolved outcome, tier "none".
//!
//! Precedence:
//! 1. Override tier: active (work item, process, shift) override
//! 2. Attendance tier: the day's attendance row for the work-center/shift
//! 3. Default tier: the work-center shift default
//! 4. Unresolved

use crate::store::ConfigStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foreman_types::{
    BoardKey, ChangeReason, DailyAttendanceStatus, ForemanResult, Presence, ResolutionKey,
    ResolutionResult, ResolutionSource, ResolutionTier, SupervisorId,
};
use std::sync::Arc;
use tracing::debug;

/// Knobs governing resolution behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolutionPolicy {
    /// When an active override's primary is marked absent and its backup
    /// cannot be confirmed on duty, terminate resolution with a
    /// `both_unavailable` outcome instead of falling through to the
    /// attendance/default tiers.
    pub strict_both_unavailable: bool,
}

/// A successful match from one tier.
#[derive(Clone, Debug)]
pub struct TierResolution {
    pub supervisor: SupervisorId,
    pub reason: ChangeReason,
    pub source: ResolutionSource,
}

/// What one tier concluded for a key.
#[derive(Clone, Debug)]
pub enum TierOutcome {
    /// This tier produced the supervisor; resolution stops.
    Resolved(TierResolution),
    /// This tier does not apply; try the next one.
    FallThrough,
    /// Strict mode: both override supervisors are ruled out. Resolution
    /// stops with the unresolved `both_unavailable` outcome.
    Exhausted,
}

/// One precedence level in the resolution hierarchy.
#[async_trait]
pub trait TierResolver: Send + Sync {
    fn tier(&self) -> ResolutionTier;

    async fn try_resolve(
        &self,
        store: &dyn ConfigStore,
        key: &ResolutionKey,
        as_of: DateTime<Utc>,
    ) -> ForemanResult<TierOutcome>;
}

/// Attendance row for the key's work-center/shift on the as-of date.
///
/// Returns `None` when the process has no registered work-center or no
/// row has been seeded yet.
async fn board_row(
    store: &dyn ConfigStore,
    key: &ResolutionKey,
    as_of: DateTime<Utc>,
) -> ForemanResult<Option<DailyAttendanceStatus>> {
    let Some(process) = store.process(&key.process).await? else {
        return Ok(None);
    };
    let board_key = BoardKey::new(process.work_center, key.shift, as_of.date_naive());
    store.attendance(&board_key).await
}

/// Tier 1: per (work item, process, shift) override.
pub struct OverrideResolver {
    strict_both_unavailable: bool,
}

impl OverrideResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            strict_both_unavailable: policy.strict_both_unavailable,
        }
    }
}

#[async_trait]
impl TierResolver for OverrideResolver {
    fn tier(&self) -> ResolutionTier {
        ResolutionTier::Override
    }

    async fn try_resolve(
        &self,
        store: &dyn ConfigStore,
        key: &ResolutionKey,
        as_of: DateTime<Utc>,
    ) -> ForemanResult<TierOutcome> {
        let Some(ovr) = store.active_override(key).await? else {
            return Ok(TierOutcome::FallThrough);
        };
        let source = ResolutionSource::Override(key.clone());

        let Some(row) = board_row(store, key, as_of).await? else {
            // No attendance record yet: assume present until told otherwise.
            return Ok(TierOutcome::Resolved(TierResolution {
                supervisor: ovr.primary,
                reason: ChangeReason::InitialAssignment,
                source,
            }));
        };

        match row.presence_of(&ovr.primary) {
            Presence::Present | Presence::Unknown => Ok(TierOutcome::Resolved(TierResolution {
                supervisor: ovr.primary,
                reason: ChangeReason::InitialAssignment,
                source,
            })),
            Presence::Absent => match ovr.backup {
                Some(backup) if !self.strict_both_unavailable => {
                    Ok(TierOutcome::Resolved(TierResolution {
                        supervisor: backup,
                        reason: ChangeReason::AttendanceAbsence,
                        source,
                    }))
                }
                // Strict mode only trusts a backup the row confirms on duty.
                Some(backup) if row.presence_of(&backup) == Presence::Present => {
                    Ok(TierOutcome::Resolved(TierResolution {
                        supervisor: backup,
                        reason: ChangeReason::AttendanceAbsence,
                        source,
                    }))
                }
                Some(_) => Ok(TierOutcome::Exhausted),
                None if self.strict_both_unavailable => Ok(TierOutcome::Exhausted),
                None => Ok(TierOutcome::FallThrough),
            },
        }
    }
}

/// Tier 2: the day's attendance determination for the work-center/shift.
pub struct AttendanceResolver;

#[async_trait]
impl TierResolver for AttendanceResolver {
    fn tier(&self) -> ResolutionTier {
        ResolutionTier::Attendance
    }

    async fn try_resolve(
        &self,
        store: &dyn ConfigStore,
        key: &ResolutionKey,
        as_of: DateTime<Utc>,
    ) -> ForemanResult<TierOutcome> {
        let Some(row) = board_row(store, key, as_of).await? else {
            return Ok(TierOutcome::FallThrough);
        };

        // The row's active supervisor is already resolved to primary or
        // backup by the attendance board.
        let reason = if row.primary_present {
            ChangeReason::InitialAssignment
        } else {
            ChangeReason::AttendanceAbsence
        };
        Ok(TierOutcome::Resolved(TierResolution {
            supervisor: row.active_supervisor.clone(),
            reason,
            source: ResolutionSource::Attendance(row.key()),
        }))
    }
}

/// Tier 3: the global work-center shift default.
pub struct DefaultResolver;

#[async_trait]
impl TierResolver for DefaultResolver {
    fn tier(&self) -> ResolutionTier {
        ResolutionTier::Default
    }

    async fn try_resolve(
        &self,
        store: &dyn ConfigStore,
        key: &ResolutionKey,
        as_of: DateTime<Utc>,
    ) -> ForemanResult<TierOutcome> {
        let Some(process) = store.process(&key.process).await? else {
            return Ok(TierOutcome::FallThrough);
        };
        let Some(default) = store.shift_default(&process.work_center, key.shift).await? else {
            return Ok(TierOutcome::FallThrough);
        };
        if !default.active {
            return Ok(TierOutcome::FallThrough);
        }
        let source = ResolutionSource::Default {
            work_center: default.work_center.clone(),
            shift: default.shift,
        };

        // Same presence check as tier 1. In practice the attendance tier
        // answers first whenever a row exists, so this usually sees none.
        if let Some(row) = board_row(store, key, as_of).await? {
            if row.presence_of(&default.primary) == Presence::Absent {
                return Ok(TierOutcome::Resolved(TierResolution {
                    supervisor: default.backup,
                    reason: ChangeReason::AttendanceAbsence,
                    source,
                }));
            }
        }
        Ok(TierOutcome::Resolved(TierResolution {
            supervisor: default.primary,
            reason: ChangeReason::InitialAssignment,
            source,
        }))
    }
}

/// The resolution engine: fixed-priority iteration over tier resolvers.
pub struct ResolutionEngine {
    store: Arc<dyn ConfigStore>,
    tiers: Vec<Box<dyn TierResolver>>,
}

impl ResolutionEngine {
    pub fn new(store: Arc<dyn ConfigStore>, policy: ResolutionPolicy) -> Self {
        let tiers: Vec<Box<dyn TierResolver>> = vec![
            Box::new(OverrideResolver::new(policy)),
            Box::new(AttendanceResolver),
            Box::new(DefaultResolver),
        ];
        Self { store, tiers }
    }

    /// Resolve the responsible supervisor for a key at an instant.
    ///
    /// Pure with respect to engine state: all inputs come from the
    /// configuration store; committing the outcome is the caller's job.
    pub async fn resolve(
        &self,
        key: &ResolutionKey,
        as_of: DateTime<Utc>,
    ) -> ForemanResult<ResolutionResult> {
        for resolver in &self.tiers {
            match resolver.try_resolve(self.store.as_ref(), key, as_of).await? {
                TierOutcome::Resolved(r) => {
                    debug!(
                        key = %key,
                        tier = %resolver.tier(),
                        supervisor = %r.supervisor,
                        "Resolved supervisor"
                    );
                    return Ok(ResolutionResult::resolved(
                        r.supervisor,
                        resolver.tier(),
                        r.reason,
                        r.source,
                    ));
                }
                TierOutcome::Exhausted => {
                    debug!(key = %key, "Both override supervisors unavailable");
                    return Ok(ResolutionResult::unresolved(ChangeReason::BothUnavailable));
                }
                TierOutcome::FallThrough => continue,
            }
        }
        debug!(key = %key, "No tier matched; unresolved");
        Ok(ResolutionResult::unresolved(ChangeReason::InitialAssignment))
    }
}
