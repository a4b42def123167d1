//! Supervision service
//!
//! Facade tying the resolution engine, attendance board, assignment
//! book, and notification gate together behind the operations the
//! surrounding manufacturing system calls: process start/close,
//! attendance events, manual interventions, rework intake, and queries.

use crate::{
    assignments::AssignmentBook,
    attendance::{AttendanceBoard, AttendanceCheckSummary, AttendanceFlip},
    gate::NotificationGate,
    ledger::LedgerStore,
    resolver::{ResolutionEngine, ResolutionPolicy},
    store::ConfigStore,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use foreman_types::{
    ActorId, Assignment, AssignmentId, AssignmentKey, BoardKey, ChangeLogEntry, ChangeReason,
    ForemanResult, NotificationIntent, ProcessId, ResolutionKey, ResolutionResult,
    ResolutionTier, Shift, SupervisorId, SupervisorOverride, WorkCenterId, WorkItemId,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One slot's full audit trail.
pub struct SlotHistory {
    pub assignment: Assignment,
    pub entries: Vec<ChangeLogEntry>,
}

/// The engine's public operations surface.
pub struct SupervisionService {
    store: Arc<dyn ConfigStore>,
    ledger: Arc<dyn LedgerStore>,
    engine: ResolutionEngine,
    board: AttendanceBoard,
    book: AssignmentBook,
    gate: NotificationGate,
    notifications: mpsc::UnboundedSender<NotificationIntent>,
    pending_stream: Mutex<Option<mpsc::UnboundedReceiver<NotificationIntent>>>,
}

impl SupervisionService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        ledger: Arc<dyn LedgerStore>,
        policy: ResolutionPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            engine: ResolutionEngine::new(store.clone(), policy),
            board: AttendanceBoard::new(store.clone()),
            book: AssignmentBook::new(ledger.clone()),
            gate: NotificationGate::new(),
            store,
            ledger,
            notifications: tx,
            pending_stream: Mutex::new(Some(rx)),
        }
    }

    /// Receiver for emitted notification intents. Yields once; the
    /// stream belongs to whichever consumer claims it first.
    pub fn take_notification_stream(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<NotificationIntent>> {
        self.pending_stream.lock().ok().and_then(|mut g| g.take())
    }

    fn emit(&self, intent: NotificationIntent) {
        // A missing consumer only loses delivery, never the resolution.
        if self.notifications.send(intent).is_err() {
            debug!("No notification consumer attached; intent dropped");
        }
    }

    async fn work_center_of(&self, process: &ProcessId) -> ForemanResult<Option<WorkCenterId>> {
        Ok(self.store.process(process).await?.map(|p| p.work_center))
    }

    // ── Process lifecycle ───────────────────────────────────────────

    /// Start a process execution, deriving the shift from the
    /// work-center's configured windows at `at`.
    pub async fn on_process_start(
        &self,
        work_item: WorkItemId,
        process: ProcessId,
        actor: Option<ActorId>,
        at: DateTime<Utc>,
    ) -> ForemanResult<Assignment> {
        let shift = match self.work_center_of(&process).await? {
            Some(wc) => self.board.current_shift(&wc, at.time()).await?,
            None => Shift::First,
        };
        self.on_process_start_in_shift(work_item, process, shift, actor, at)
            .await
    }

    /// Start a process execution in an explicit shift.
    pub async fn on_process_start_in_shift(
        &self,
        work_item: WorkItemId,
        process: ProcessId,
        shift: Shift,
        actor: Option<ActorId>,
        at: DateTime<Utc>,
    ) -> ForemanResult<Assignment> {
        if shift != Shift::First {
            let enrolled = self
                .store
                .enrollments_for(&work_item)
                .await?
                .iter()
                .any(|e| e.shift == shift && e.active);
            if !enrolled {
                warn!(%work_item, %shift, "Work item not enrolled in shift; proceeding anyway");
            }
        }

        let key = ResolutionKey::new(work_item, process, shift);
        let result = self.engine.resolve(&key, at).await?;
        let assignment = self.book.open(&key, &result, actor).await?;
        if let Some(intent) = self.gate.evaluate(&key, &result) {
            self.emit(intent);
        }
        Ok(assignment)
    }

    /// Close the assignment when its process execution completes.
    pub async fn on_process_close(&self, assignment_id: &AssignmentId) -> ForemanResult<Assignment> {
        self.book.close(assignment_id).await
    }

    /// Route a freshly reported rework unit.
    ///
    /// The unit gets a synthetic work-item identity and binds to whoever
    /// currently holds the work-center per attendance and defaults, so a
    /// later attendance flip moves it with everything else.
    pub async fn on_rework_created(
        &self,
        process: ProcessId,
        shift: Shift,
        actor: Option<ActorId>,
        at: DateTime<Utc>,
    ) -> ForemanResult<Assignment> {
        let key = ResolutionKey::new(WorkItemId::generate_rework(), process, shift);
        // A fresh identity can carry no override, so this lands on the
        // attendance or default tier.
        let mut result = self.engine.resolve(&key, at).await?;
        if result.is_resolved() {
            result.reason = ChangeReason::ReworkRouting;
        }
        info!(
            work_item = %key.work_item,
            process = %key.process,
            supervisor = result.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
            "Rework unit routed"
        );
        let assignment = self.book.open(&key, &result, actor).await?;
        if let Some(intent) = self.gate.evaluate(&key, &result) {
            self.emit(intent);
        }
        Ok(assignment)
    }

    /// Move an open assignment onto a different shift, re-resolving for
    /// the new shift's configuration.
    pub async fn change_shift(
        &self,
        assignment_id: &AssignmentId,
        new_shift: Shift,
        actor: Option<ActorId>,
        at: DateTime<Utc>,
    ) -> ForemanResult<Assignment> {
        let current = self.book.get(assignment_id)?;
        let key = ResolutionKey::new(current.work_item, current.process, new_shift);
        let result = self.engine.resolve(&key, at).await?;
        let moved = self
            .book
            .change_shift(assignment_id, new_shift, &result, actor)
            .await?;
        if let Some(intent) = self.gate.evaluate(&key, &result) {
            self.emit(intent);
        }
        Ok(moved)
    }

    // ── Attendance ──────────────────────────────────────────────────

    /// The scheduled deadline check, plus re-routing of affected open
    /// assignments.
    pub async fn run_attendance_check(
        &self,
        date: NaiveDate,
    ) -> ForemanResult<AttendanceCheckSummary> {
        let (summary, flips) = self.board.run_attendance_check(date).await?;
        for flip in flips {
            self.apply_flip(&flip, None).await?;
        }
        Ok(summary)
    }

    /// A supervisor checked in. On-time check-ins can flip rows back to
    /// the primary, which re-routes open assignments.
    pub async fn record_check_in(
        &self,
        supervisor: &SupervisorId,
        date: NaiveDate,
        at: NaiveTime,
    ) -> ForemanResult<()> {
        for flip in self.board.record_check_in(supervisor, date, at).await? {
            self.apply_flip(&flip, None).await?;
        }
        Ok(())
    }

    /// Explicit presence report. Idempotent: a report matching current
    /// state changes nothing.
    pub async fn report_attendance(
        &self,
        work_center: &WorkCenterId,
        shift: Shift,
        date: NaiveDate,
        present: bool,
        reported_by: Option<ActorId>,
    ) -> ForemanResult<()> {
        let flip = self
            .board
            .report_attendance(work_center, shift, date, present, reported_by.clone())
            .await?;
        if let Some(flip) = flip {
            self.apply_flip(&flip, reported_by).await?;
        }
        Ok(())
    }

    /// Re-route open assignments affected by an attendance flip.
    ///
    /// Only attendance- and default-tier assignments (and unresolved
    /// ones) follow the board; override-tier assignees were placed by a
    /// person and stay put.
    async fn apply_flip(&self, flip: &AttendanceFlip, actor: Option<ActorId>) -> ForemanResult<()> {
        let as_of = flip
            .key
            .date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        let mut moved = 0usize;
        for assignment in self.book.open_assignments()? {
            if assignment.tier == ResolutionTier::Override {
                continue;
            }
            if assignment.shift != flip.key.shift {
                continue;
            }
            let Some(wc) = self.work_center_of(&assignment.process).await? else {
                continue;
            };
            if wc != flip.key.work_center {
                continue;
            }

            let key = ResolutionKey::new(
                assignment.work_item.clone(),
                assignment.process.clone(),
                assignment.shift,
            );
            let result = self.engine.resolve(&key, as_of).await?;
            let Some(target) = result.supervisor.clone() else {
                continue;
            };
            if assignment.supervisor.as_ref() == Some(&target) {
                continue;
            }
            // First assignment of a previously unresolved slot keeps the
            // resolution's own reason; moves record the absence flip.
            let reason = if assignment.supervisor.is_none() {
                result.reason
            } else {
                ChangeReason::AttendanceAbsence
            };
            self.book
                .reassign(&assignment.id, target, result.tier, reason, None, actor.clone())
                .await?;
            moved += 1;
        }
        if moved > 0 {
            info!(key = %flip.key, from = %flip.from, to = %flip.to, moved, "Attendance flip applied to open assignments");
        }
        Ok(())
    }

    // ── Manual interventions ────────────────────────────────────────

    /// Point one open assignment at a specific supervisor.
    pub async fn manual_assign(
        &self,
        assignment_id: &AssignmentId,
        supervisor: SupervisorId,
        note: Option<String>,
        actor: ActorId,
    ) -> ForemanResult<Assignment> {
        self.book
            .reassign(
                assignment_id,
                supervisor,
                ResolutionTier::Override,
                ChangeReason::MidProcessChange,
                note,
                Some(actor),
            )
            .await
    }

    /// Mid-shift manual override against an attendance row: the row's
    /// active supervisor changes and every open assignment on that
    /// work-center/shift moves, whatever tier placed it.
    pub async fn manual_override_shift(
        &self,
        key: &BoardKey,
        new_active: SupervisorId,
        actor: ActorId,
    ) -> ForemanResult<usize> {
        let Some(flip) = self
            .board
            .manual_update(key, new_active.clone(), actor.clone())
            .await?
        else {
            return Ok(0);
        };

        let mut moved = 0usize;
        for assignment in self.book.open_assignments()? {
            if assignment.shift != key.shift {
                continue;
            }
            let Some(wc) = self.work_center_of(&assignment.process).await? else {
                continue;
            };
            if wc != key.work_center {
                continue;
            }
            if assignment.supervisor.as_ref() == Some(&new_active) {
                continue;
            }
            self.book
                .reassign(
                    &assignment.id,
                    new_active.clone(),
                    ResolutionTier::Override,
                    ChangeReason::ManualOverride,
                    None,
                    Some(actor.clone()),
                )
                .await?;
            moved += 1;
        }
        info!(key = %key, from = %flip.from, to = %new_active, moved, "Manual shift override applied");
        Ok(moved)
    }

    /// Install an override for a (work item, process, shift). Supersedes
    /// any prior active override for the key; takes effect at the next
    /// resolution of the slot.
    pub async fn put_override(&self, ovr: SupervisorOverride) -> ForemanResult<()> {
        let key = ResolutionKey::new(ovr.work_item.clone(), ovr.process.clone(), ovr.shift);
        self.store.put_override(ovr).await?;
        info!(key = %key, "Supervisor override installed");
        Ok(())
    }

    /// Deactivate the active override for a key. Returns whether one
    /// existed.
    pub async fn clear_override(&self, key: &ResolutionKey) -> ForemanResult<bool> {
        self.store.deactivate_override(key).await
    }

    /// Install or replace the shift default for a work-center/shift.
    pub async fn put_shift_default(
        &self,
        default: foreman_types::ShiftDefault,
    ) -> ForemanResult<()> {
        self.store.put_shift_default(default).await
    }

    /// Enroll a work item in a shift (or replace its enrollment).
    pub async fn put_enrollment(
        &self,
        enrollment: foreman_types::ShiftEnrollment,
    ) -> ForemanResult<()> {
        self.store.put_enrollment(enrollment).await
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Resolve without committing anything.
    pub async fn resolve(
        &self,
        key: &ResolutionKey,
        at: DateTime<Utc>,
    ) -> ForemanResult<ResolutionResult> {
        self.engine.resolve(key, at).await
    }

    /// The open assignment for an execution slot.
    pub fn current_assignment(&self, key: &AssignmentKey) -> ForemanResult<Option<Assignment>> {
        self.book.open_for(key)
    }

    pub fn assignment(&self, assignment_id: &AssignmentId) -> ForemanResult<Assignment> {
        self.book.get(assignment_id)
    }

    /// Audit trail for every assignment a slot ever had, oldest first.
    pub async fn history_for(&self, key: &AssignmentKey) -> ForemanResult<Vec<SlotHistory>> {
        let mut out = Vec::new();
        for assignment in self.book.assignments_for(key)? {
            let entries = self.ledger.history_for(&assignment.id).await?;
            out.push(SlotHistory { assignment, entries });
        }
        Ok(out)
    }

    pub async fn ledger_history(
        &self,
        assignment_id: &AssignmentId,
    ) -> ForemanResult<Vec<ChangeLogEntry>> {
        // Surfacing history for an unknown id is an error, not an empty list.
        let _ = self.book.get(assignment_id)?;
        self.ledger.history_for(assignment_id).await
    }

    /// Audit trail for every assignment a work item ever had, across
    /// all its processes, oldest first.
    pub async fn history_for_work_item(
        &self,
        work_item: &WorkItemId,
    ) -> ForemanResult<Vec<SlotHistory>> {
        let mut out = Vec::new();
        for assignment in self.book.assignments_for_item(work_item)? {
            let entries = self.ledger.history_for(&assignment.id).await?;
            out.push(SlotHistory { assignment, entries });
        }
        Ok(out)
    }

    /// Open assignments that were still waiting for a supervisor at
    /// `as_of` (and still are).
    pub fn unresolved_assignments(&self, as_of: DateTime<Utc>) -> ForemanResult<Vec<Assignment>> {
        Ok(self
            .book
            .unresolved_assignments()?
            .into_iter()
            .filter(|a| a.created_at <= as_of)
            .collect())
    }

    pub fn open_assignments(&self) -> ForemanResult<Vec<Assignment>> {
        self.book.open_assignments()
    }
}

impl std::fmt::Debug for SupervisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisionService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::store::InMemoryConfigStore;
    use foreman_types::ProcessDefinition;

    const WC: &str = "coiling";
    const PROC: &str = "coiling-op";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at() -> DateTime<Utc> {
        date().and_hms_opt(10, 0, 0).unwrap().and_utc()
    }

    async fn service() -> SupervisionService {
        let store = Arc::new(InMemoryConfigStore::new());
        store
            .put_process(ProcessDefinition::new(
                ProcessId::new(PROC),
                "Coiling Operation",
                WorkCenterId::new(WC),
            ))
            .await
            .unwrap();
        store
            .put_shift_default(foreman_types::ShiftDefault::new(
                WorkCenterId::new(WC),
                Shift::First,
                SupervisorId::new("S1"),
                SupervisorId::new("S2"),
            ))
            .await
            .unwrap();
        SupervisionService::new(store, Arc::new(InMemoryLedger::new()), ResolutionPolicy::default())
    }

    #[tokio::test]
    async fn test_start_assigns_default_primary() {
        let svc = service().await;
        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();
        assert_eq!(a.supervisor, Some(SupervisorId::new("S1")));
        assert_eq!(a.tier, ResolutionTier::Default);
    }

    #[tokio::test]
    async fn test_attendance_flip_moves_open_assignment() {
        let svc = service().await;
        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();

        svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
            .await
            .unwrap();

        let moved = svc.assignment(&a.id).unwrap();
        assert_eq!(moved.supervisor, Some(SupervisorId::new("S2")));
        assert_eq!(moved.tier, ResolutionTier::Attendance);

        let history = svc.ledger_history(&a.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].reason, ChangeReason::AttendanceAbsence);
    }

    #[tokio::test]
    async fn test_flip_skips_manually_assigned() {
        let svc = service().await;
        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();
        svc.manual_assign(&a.id, SupervisorId::new("S9"), None, ActorId::new("admin"))
            .await
            .unwrap();

        svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
            .await
            .unwrap();

        // The manual assignee holds through the flip.
        let held = svc.assignment(&a.id).unwrap();
        assert_eq!(held.supervisor, Some(SupervisorId::new("S9")));
    }

    #[tokio::test]
    async fn test_unresolved_start_emits_one_intent() {
        let store = Arc::new(InMemoryConfigStore::new());
        let svc = SupervisionService::new(
            store,
            Arc::new(InMemoryLedger::new()),
            ResolutionPolicy::default(),
        );
        let mut stream = svc.take_notification_stream().unwrap();

        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new("ghost"), None, at())
            .await
            .unwrap();
        assert!(a.supervisor.is_none());
        assert_eq!(svc.unresolved_assignments(Utc::now()).unwrap().len(), 1);

        let intent = stream.try_recv().unwrap();
        assert!(intent.message.contains("MO-1"));
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rework_binds_to_active_supervisor() {
        let svc = service().await;
        svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
            .await
            .unwrap();

        let rework = svc
            .on_rework_created(ProcessId::new(PROC), Shift::First, None, at())
            .await
            .unwrap();
        assert!(rework.work_item.0.starts_with("rework-"));
        assert_eq!(rework.supervisor, Some(SupervisorId::new("S2")));

        let history = svc.ledger_history(&rework.id).await.unwrap();
        assert_eq!(history[0].reason, ChangeReason::ReworkRouting);
    }

    #[tokio::test]
    async fn test_manual_override_shift_moves_everything() {
        let svc = service().await;
        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();
        let b = svc
            .on_process_start(WorkItemId::new("MO-2"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();

        let moved = svc
            .manual_override_shift(
                &BoardKey::new(WorkCenterId::new(WC), Shift::First, date()),
                SupervisorId::new("S5"),
                ActorId::new("admin"),
            )
            .await
            .unwrap();
        assert_eq!(moved, 2);

        for id in [&a.id, &b.id] {
            let moved = svc.assignment(id).unwrap();
            assert_eq!(moved.supervisor, Some(SupervisorId::new("S5")));
            assert_eq!(moved.tier, ResolutionTier::Override);
        }
        let history = svc.ledger_history(&a.id).await.unwrap();
        assert_eq!(history[1].reason, ChangeReason::ManualOverride);
    }

    #[tokio::test]
    async fn test_close_then_slot_reusable() {
        let svc = service().await;
        let key = AssignmentKey::new(WorkItemId::new("MO-1"), ProcessId::new(PROC));
        let a = svc
            .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();
        svc.on_process_close(&a.id).await.unwrap();
        assert!(svc.current_assignment(&key).unwrap().is_none());

        svc.on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
            .await
            .unwrap();
        let history = svc.history_for(&key).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
