//! Configuration store boundary
//!
//! The engine reads shift defaults, enrollments, overrides, process
//! definitions, and daily attendance rows through [`ConfigStore`].
//! Administrative writes go through the same trait so invariants
//! (one active override per key, one attendance row per key/date) are
//! enforced wherever the data lives.
//!
//! [`InMemoryConfigStore`] is the deterministic, test-friendly reference
//! adapter. Production deployments put a transactional backend behind the
//! same trait.

use async_trait::async_trait;
use foreman_types::{
    BoardKey, DailyAttendanceStatus, ForemanError, ForemanResult, ProcessDefinition, ProcessId,
    ResolutionKey, Shift, ShiftDefault, ShiftEnrollment, SupervisorOverride, WorkCenterId,
    WorkItemId,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read/write surface for supervision configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Look up the shift default for a work-center/shift pair.
    async fn shift_default(
        &self,
        work_center: &WorkCenterId,
        shift: Shift,
    ) -> ForemanResult<Option<ShiftDefault>>;

    /// All active shift defaults, across work-centers.
    async fn active_shift_defaults(&self) -> ForemanResult<Vec<ShiftDefault>>;

    /// Shift enrollments declared for a work item.
    async fn enrollments_for(&self, work_item: &WorkItemId) -> ForemanResult<Vec<ShiftEnrollment>>;

    /// The single active override for a resolution key, if any.
    async fn active_override(
        &self,
        key: &ResolutionKey,
    ) -> ForemanResult<Option<SupervisorOverride>>;

    /// Process definition (carries the work-center link).
    async fn process(&self, id: &ProcessId) -> ForemanResult<Option<ProcessDefinition>>;

    /// Attendance row for one (work-center, shift, date).
    async fn attendance(&self, key: &BoardKey) -> ForemanResult<Option<DailyAttendanceStatus>>;

    // ── Administrative writes ───────────────────────────────────────

    async fn put_process(&self, definition: ProcessDefinition) -> ForemanResult<()>;

    /// Insert or replace the default for (work-center, shift).
    async fn put_shift_default(&self, default: ShiftDefault) -> ForemanResult<()>;

    /// Insert or replace the enrollment for (work item, shift).
    async fn put_enrollment(&self, enrollment: ShiftEnrollment) -> ForemanResult<()>;

    /// Insert a new override, deactivating any prior active override for
    /// the same (work item, process, shift) in the same call. Implementations
    /// must validate the record first; the one-active-per-key rule is an
    /// invariant, not a convention.
    async fn put_override(&self, ovr: SupervisorOverride) -> ForemanResult<()>;

    /// Deactivate the active override for a key. Returns whether one existed.
    async fn deactivate_override(&self, key: &ResolutionKey) -> ForemanResult<bool>;

    /// Insert or update in place the attendance row for its key.
    async fn put_attendance(&self, status: DailyAttendanceStatus) -> ForemanResult<()>;
}

fn poisoned(which: &str) -> ForemanError {
    ForemanError::StoreUnavailable(format!("{which} lock poisoned"))
}

/// In-memory configuration store.
#[derive(Default)]
pub struct InMemoryConfigStore {
    defaults: RwLock<HashMap<(WorkCenterId, Shift), ShiftDefault>>,
    enrollments: RwLock<HashMap<(WorkItemId, Shift), ShiftEnrollment>>,
    /// Full override history per key; the active one is the last entry
    /// with `active == true` (at most one by construction).
    overrides: RwLock<HashMap<ResolutionKey, Vec<SupervisorOverride>>>,
    processes: RwLock<HashMap<ProcessId, ProcessDefinition>>,
    attendance: RwLock<HashMap<BoardKey, DailyAttendanceStatus>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn shift_default(
        &self,
        work_center: &WorkCenterId,
        shift: Shift,
    ) -> ForemanResult<Option<ShiftDefault>> {
        let guard = self.defaults.read().map_err(|_| poisoned("defaults"))?;
        Ok(guard.get(&(work_center.clone(), shift)).cloned())
    }

    async fn active_shift_defaults(&self) -> ForemanResult<Vec<ShiftDefault>> {
        let guard = self.defaults.read().map_err(|_| poisoned("defaults"))?;
        Ok(guard.values().filter(|d| d.active).cloned().collect())
    }

    async fn enrollments_for(&self, work_item: &WorkItemId) -> ForemanResult<Vec<ShiftEnrollment>> {
        let guard = self.enrollments.read().map_err(|_| poisoned("enrollments"))?;
        Ok(guard
            .values()
            .filter(|e| e.work_item == *work_item)
            .cloned()
            .collect())
    }

    async fn active_override(
        &self,
        key: &ResolutionKey,
    ) -> ForemanResult<Option<SupervisorOverride>> {
        let guard = self.overrides.read().map_err(|_| poisoned("overrides"))?;
        Ok(guard
            .get(key)
            .and_then(|history| history.iter().rev().find(|o| o.active))
            .cloned())
    }

    async fn process(&self, id: &ProcessId) -> ForemanResult<Option<ProcessDefinition>> {
        let guard = self.processes.read().map_err(|_| poisoned("processes"))?;
        Ok(guard.get(id).cloned())
    }

    async fn attendance(&self, key: &BoardKey) -> ForemanResult<Option<DailyAttendanceStatus>> {
        let guard = self.attendance.read().map_err(|_| poisoned("attendance"))?;
        Ok(guard.get(key).cloned())
    }

    async fn put_process(&self, definition: ProcessDefinition) -> ForemanResult<()> {
        let mut guard = self.processes.write().map_err(|_| poisoned("processes"))?;
        guard.insert(definition.id.clone(), definition);
        Ok(())
    }

    async fn put_shift_default(&self, default: ShiftDefault) -> ForemanResult<()> {
        let mut guard = self.defaults.write().map_err(|_| poisoned("defaults"))?;
        guard.insert((default.work_center.clone(), default.shift), default);
        Ok(())
    }

    async fn put_enrollment(&self, enrollment: ShiftEnrollment) -> ForemanResult<()> {
        let mut guard = self.enrollments.write().map_err(|_| poisoned("enrollments"))?;
        guard.insert((enrollment.work_item.clone(), enrollment.shift), enrollment);
        Ok(())
    }

    async fn put_override(&self, ovr: SupervisorOverride) -> ForemanResult<()> {
        ovr.validate()?;
        let key = ResolutionKey::new(ovr.work_item.clone(), ovr.process.clone(), ovr.shift);
        let mut guard = self.overrides.write().map_err(|_| poisoned("overrides"))?;
        let history = guard.entry(key).or_default();
        // Supersede: the new override is the only active one for this key.
        for prior in history.iter_mut() {
            prior.active = false;
        }
        history.push(ovr);
        Ok(())
    }

    async fn deactivate_override(&self, key: &ResolutionKey) -> ForemanResult<bool> {
        let mut guard = self.overrides.write().map_err(|_| poisoned("overrides"))?;
        let mut found = false;
        if let Some(history) = guard.get_mut(key) {
            for ovr in history.iter_mut() {
                if ovr.active {
                    ovr.active = false;
                    found = true;
                }
            }
        }
        Ok(found)
    }

    async fn put_attendance(&self, status: DailyAttendanceStatus) -> ForemanResult<()> {
        let mut guard = self.attendance.write().map_err(|_| poisoned("attendance"))?;
        guard.insert(status.key(), status);
        Ok(())
    }
}
