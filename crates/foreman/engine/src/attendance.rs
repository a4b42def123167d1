//! Attendance board
//!
//! Maintains the one-row-per-(work-center, shift, date) attendance state
//! that feeds tier-2 resolution. The scheduled check seeds rows at the
//! check-in deadline, check-ins and explicit reports update them in
//! place, and every change that moves the active supervisor is surfaced
//! as an [`AttendanceFlip`] so the caller can re-route open assignments.

use crate::store::ConfigStore;
use chrono::{NaiveDate, NaiveTime};
use foreman_types::{
    ActorId, BoardKey, DailyAttendanceStatus, ForemanResult, Shift, ShiftDefault, SupervisorId,
    WorkCenterId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An attendance determination that moved the active supervisor.
#[derive(Clone, Debug)]
pub struct AttendanceFlip {
    pub key: BoardKey,
    pub from: SupervisorId,
    pub to: SupervisorId,
    /// Whether the configured primary counts as present after the flip.
    pub primary_present: bool,
}

/// Totals for one scheduled attendance check run.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttendanceCheckSummary {
    /// Rows newly seeded by this run.
    pub seeded: usize,
    /// Rows whose primary had checked in before the deadline.
    pub present: usize,
    /// Rows determined absent (active supervisor moved to the backup).
    pub absent: usize,
}

/// Attendance state keeper for all work-centers.
pub struct AttendanceBoard {
    store: Arc<dyn ConfigStore>,
}

impl AttendanceBoard {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// The scheduled deadline check for one date.
    ///
    /// For every active shift default without a row for `date`, seeds the
    /// day's row with the absence determination: no check-in seen by the
    /// deadline means the backup becomes the active supervisor. Rows that
    /// already exist (a check-in arrived first, or a prior run seeded
    /// them) are left alone, so the check is idempotent.
    pub async fn run_attendance_check(
        &self,
        date: NaiveDate,
    ) -> ForemanResult<(AttendanceCheckSummary, Vec<AttendanceFlip>)> {
        let mut summary = AttendanceCheckSummary::default();
        let mut flips = Vec::new();

        for default in self.store.active_shift_defaults().await? {
            let key = BoardKey::new(default.work_center.clone(), default.shift, date);
            match self.store.attendance(&key).await? {
                Some(row) => {
                    if row.primary_present {
                        summary.present += 1;
                    } else {
                        summary.absent += 1;
                    }
                }
                None => {
                    let row = DailyAttendanceStatus::seeded(
                        key.clone(),
                        default.primary.clone(),
                        default.backup.clone(),
                        default.check_in_deadline,
                    );
                    info!(
                        key = %key,
                        primary = %default.primary,
                        backup = %default.backup,
                        "No check-in by deadline; marking primary absent"
                    );
                    self.store.put_attendance(row).await?;
                    summary.seeded += 1;
                    summary.absent += 1;
                    flips.push(AttendanceFlip {
                        key,
                        from: default.primary,
                        to: default.backup,
                        primary_present: false,
                    });
                }
            }
        }

        info!(
            seeded = summary.seeded,
            present = summary.present,
            absent = summary.absent,
            %date,
            "Attendance check complete"
        );
        Ok((summary, flips))
    }

    /// Record a supervisor check-in.
    ///
    /// Applies to every work-center/shift where the supervisor is the
    /// configured primary. A check-in at or before the deadline marks the
    /// primary present; a later one records the login time but keeps the
    /// absence determination, so the backup holds (or takes) the shift.
    pub async fn record_check_in(
        &self,
        supervisor: &SupervisorId,
        date: NaiveDate,
        at: NaiveTime,
    ) -> ForemanResult<Vec<AttendanceFlip>> {
        let mut flips = Vec::new();

        for default in self.store.active_shift_defaults().await? {
            if default.primary != *supervisor {
                continue;
            }
            let key = BoardKey::new(default.work_center.clone(), default.shift, date);
            let mut row = match self.store.attendance(&key).await? {
                Some(row) => row,
                // Check-in before the scheduled check: seed optimistically.
                None => DailyAttendanceStatus::seeded(
                    key.clone(),
                    default.primary.clone(),
                    default.primary.clone(),
                    default.check_in_deadline,
                ),
            };

            if row.login_time.is_none() {
                row.login_time = Some(at);
            }

            if at <= row.check_in_deadline {
                let previous = row.active_supervisor.clone();
                row.primary_present = true;
                row.active_supervisor = default.primary.clone();
                row.updated_at = chrono::Utc::now();
                debug!(key = %key, supervisor = %supervisor, "Primary checked in on time");
                if previous != row.active_supervisor {
                    flips.push(AttendanceFlip {
                        key: key.clone(),
                        from: previous,
                        to: row.active_supervisor.clone(),
                        primary_present: true,
                    });
                }
            } else {
                warn!(
                    key = %key,
                    supervisor = %supervisor,
                    login = %at,
                    deadline = %row.check_in_deadline,
                    "Check-in after deadline; backup holds the shift"
                );
                // An absent primary must not stay active. This covers a
                // late check-in landing before the scheduled check has
                // seeded the day's row.
                if !row.primary_present && row.active_supervisor == default.primary {
                    let previous = row.active_supervisor.clone();
                    row.primary_present = false;
                    row.active_supervisor = default.backup.clone();
                    row.updated_at = chrono::Utc::now();
                    flips.push(AttendanceFlip {
                        key: key.clone(),
                        from: previous,
                        to: default.backup.clone(),
                        primary_present: false,
                    });
                }
            }
            self.store.put_attendance(row).await?;
        }
        Ok(flips)
    }

    /// Explicit presence report for a work-center/shift primary.
    ///
    /// Idempotent: reporting the state the row already holds returns
    /// `None` and writes nothing. Without a configured shift default the
    /// report is a no-op, since there is no backup to flip to.
    pub async fn report_attendance(
        &self,
        work_center: &WorkCenterId,
        shift: Shift,
        date: NaiveDate,
        present: bool,
        reported_by: Option<ActorId>,
    ) -> ForemanResult<Option<AttendanceFlip>> {
        let Some(default) = self.store.shift_default(work_center, shift).await? else {
            warn!(%work_center, %shift, "Attendance report for unconfigured work-center/shift ignored");
            return Ok(None);
        };

        let key = BoardKey::new(work_center.clone(), shift, date);
        let mut row = match self.store.attendance(&key).await? {
            Some(row) => row,
            None => DailyAttendanceStatus::seeded(
                key.clone(),
                default.primary.clone(),
                default.primary.clone(),
                default.check_in_deadline,
            ),
        };

        let target_active = if present {
            default.primary.clone()
        } else {
            default.backup.clone()
        };
        if row.primary_present == present && row.active_supervisor == target_active {
            debug!(key = %key, present, "Attendance report is a no-op");
            // Persist the seed so repeated reports see the same row.
            self.store.put_attendance(row).await?;
            return Ok(None);
        }

        let previous = row.active_supervisor.clone();
        row.primary_present = present;
        row.active_supervisor = target_active.clone();
        row.manually_updated_by = reported_by;
        row.updated_at = chrono::Utc::now();
        self.store.put_attendance(row).await?;

        info!(
            key = %key,
            from = %previous,
            to = %target_active,
            present,
            "Attendance report applied"
        );
        Ok(Some(AttendanceFlip {
            key,
            from: previous,
            to: target_active,
            primary_present: present,
        }))
    }

    /// Point the row's active supervisor at an arbitrary person.
    ///
    /// This is the mid-shift manual override surface: it does not touch
    /// `primary_present`, only who is on duty, and records the actor.
    pub async fn manual_update(
        &self,
        key: &BoardKey,
        new_active: SupervisorId,
        actor: ActorId,
    ) -> ForemanResult<Option<AttendanceFlip>> {
        let mut row = match self.store.attendance(key).await? {
            Some(row) => row,
            None => {
                let Some(default) = self.store.shift_default(&key.work_center, key.shift).await?
                else {
                    warn!(key = %key, "Manual update for unconfigured work-center/shift ignored");
                    return Ok(None);
                };
                DailyAttendanceStatus::seeded(
                    key.clone(),
                    default.primary.clone(),
                    default.primary.clone(),
                    default.check_in_deadline,
                )
            }
        };

        if row.active_supervisor == new_active {
            return Ok(None);
        }
        let previous = row.active_supervisor.clone();
        row.active_supervisor = new_active.clone();
        row.manually_updated_by = Some(actor.clone());
        row.updated_at = chrono::Utc::now();
        let primary_present = row.primary_present;
        self.store.put_attendance(row).await?;

        info!(key = %key, from = %previous, to = %new_active, actor = %actor, "Manual attendance update");
        Ok(Some(AttendanceFlip {
            key: key.clone(),
            from: previous,
            to: new_active,
            primary_present,
        }))
    }

    /// Which shift is in progress at a work-center at a time-of-day.
    ///
    /// Derived from the configured shift windows; when no window matches
    /// (or none are configured) shift 1 applies.
    pub async fn current_shift(
        &self,
        work_center: &WorkCenterId,
        at: NaiveTime,
    ) -> ForemanResult<Shift> {
        let mut defaults: Vec<ShiftDefault> = self
            .store
            .active_shift_defaults()
            .await?
            .into_iter()
            .filter(|d| d.work_center == *work_center)
            .collect();
        defaults.sort_by_key(|d| d.shift);

        for default in &defaults {
            if default.contains(at) {
                return Ok(default.shift);
            }
        }
        Ok(Shift::First)
    }
}
