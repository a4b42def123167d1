//! End-to-end supervision flows against the in-memory stores.

use chrono::{DateTime, NaiveDate, Utc};
use foreman_engine::{
    ConfigStore, InMemoryConfigStore, InMemoryLedger, ResolutionPolicy, SupervisionService,
};
use foreman_types::{
    verify_continuity, ActorId, AssignmentKey, BoardKey, ChangeReason, ForemanError,
    ProcessDefinition, ProcessId, ResolutionKey, ResolutionTier, Shift, ShiftDefault,
    SupervisorId, SupervisorOverride, WorkCenterId, WorkItemId,
};
use std::sync::Arc;

const WC: &str = "coiling";
const PROC: &str = "coiling-op";

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at() -> DateTime<Utc> {
    date().and_hms_opt(10, 0, 0).unwrap().and_utc()
}

fn sup(id: &str) -> SupervisorId {
    SupervisorId::new(id)
}

async fn seeded_service(policy: ResolutionPolicy) -> SupervisionService {
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
        .put_shift_default(ShiftDefault::new(
            WorkCenterId::new(WC),
            Shift::First,
            sup("S1"),
            sup("S2"),
        ))
        .await
        .unwrap();
    SupervisionService::new(store, Arc::new(InMemoryLedger::new()), policy)
}

/// Default tier, then absence flip, then manual assign, then close.
#[tokio::test]
async fn default_then_flip_then_manual_then_close() {
    let svc = seeded_service(ResolutionPolicy::default()).await;

    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    assert_eq!(a.supervisor, Some(sup("S1")));
    assert_eq!(a.tier, ResolutionTier::Default);

    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();
    let a = svc.assignment(&a.id).unwrap();
    assert_eq!(a.supervisor, Some(sup("S2")));

    svc.manual_assign(&a.id, sup("S3"), Some("machine expertise".into()), ActorId::new("lead"))
        .await
        .unwrap();
    let a = svc.assignment(&a.id).unwrap();
    assert_eq!(a.supervisor, Some(sup("S3")));
    assert_eq!(a.tier, ResolutionTier::Override);

    svc.on_process_close(&a.id).await.unwrap();
    let err = svc
        .manual_assign(&a.id, sup("S4"), None, ActorId::new("lead"))
        .await
        .unwrap_err();
    assert!(matches!(err, ForemanError::InvalidStateTransition(_)));

    // Full chain: S1 -> S2 (absence) -> S3 (manual); close logs nothing.
    let history = svc.ledger_history(&a.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(verify_continuity(&history));
    assert_eq!(history[0].reason, ChangeReason::InitialAssignment);
    assert_eq!(history[1].reason, ChangeReason::AttendanceAbsence);
    assert_eq!(history[2].reason, ChangeReason::MidProcessChange);
    assert_eq!(history[2].changed_by, Some(ActorId::new("lead")));
    assert_eq!(history[2].note, "machine expertise");
}

/// An active override outranks attendance and default data for the key.
#[tokio::test]
async fn override_tier_takes_precedence() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), true, None)
        .await
        .unwrap();
    svc.put_override(
        SupervisorOverride::new(
            WorkItemId::new("MO-1"),
            ProcessId::new(PROC),
            Shift::First,
            sup("S7"),
        )
        .with_reason("customer audit"),
    )
    .await
    .unwrap();

    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    assert_eq!(a.supervisor, Some(sup("S7")));
    assert_eq!(a.tier, ResolutionTier::Override);
}

/// Nothing configured: unresolved outcome and exactly one intent.
#[tokio::test]
async fn unresolved_emits_exactly_one_intent() {
    let store = Arc::new(InMemoryConfigStore::new());
    let svc = SupervisionService::new(
        store,
        Arc::new(InMemoryLedger::new()),
        ResolutionPolicy::default(),
    );
    let mut intents = svc.take_notification_stream().unwrap();

    let a = svc
        .on_process_start_in_shift(
            WorkItemId::new("MO-9"),
            ProcessId::new("plating"),
            Shift::Second,
            None,
            at(),
        )
        .await
        .unwrap();
    assert!(a.supervisor.is_none());
    assert_eq!(a.tier, ResolutionTier::None);

    let intent = intents.try_recv().unwrap();
    assert_eq!(intent.work_item, WorkItemId::new("MO-9"));
    assert_eq!(intent.process, ProcessId::new("plating"));
    assert_eq!(intent.shift, Shift::Second);
    assert!(intents.try_recv().is_err());

    // Still open and queryable, with an empty ledger.
    assert_eq!(svc.unresolved_assignments(Utc::now()).unwrap().len(), 1);
    assert!(svc.ledger_history(&a.id).await.unwrap().is_empty());
}

/// Rework binds to the attendance-active supervisor even when the
/// originating item carries an override.
#[tokio::test]
async fn rework_ignores_originating_override() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    svc.put_override(SupervisorOverride::new(
        WorkItemId::new("MO-1"),
        ProcessId::new(PROC),
        Shift::First,
        sup("A"),
    ))
    .await
    .unwrap();
    // Primary absent: the board's active supervisor is the backup S2.
    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();

    let rework = svc
        .on_rework_created(ProcessId::new(PROC), Shift::First, None, at())
        .await
        .unwrap();
    assert_eq!(rework.supervisor, Some(sup("S2")));

    let history = svc.ledger_history(&rework.id).await.unwrap();
    assert_eq!(history[0].reason, ChangeReason::ReworkRouting);
}

/// A flip moves attendance/default-tier assignments and leaves
/// override-tier ones alone; flipping back restores the primary.
#[tokio::test]
async fn flip_moves_tiered_assignments_but_not_overrides() {
    let svc = seeded_service(ResolutionPolicy::default()).await;

    let tiered = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    let pinned = svc
        .on_process_start(WorkItemId::new("MO-2"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    svc.manual_assign(&pinned.id, sup("S9"), None, ActorId::new("lead"))
        .await
        .unwrap();

    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();
    assert_eq!(svc.assignment(&tiered.id).unwrap().supervisor, Some(sup("S2")));
    assert_eq!(svc.assignment(&pinned.id).unwrap().supervisor, Some(sup("S9")));

    // Primary returns mid-shift.
    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), true, None)
        .await
        .unwrap();
    assert_eq!(svc.assignment(&tiered.id).unwrap().supervisor, Some(sup("S1")));
    assert_eq!(svc.assignment(&pinned.id).unwrap().supervisor, Some(sup("S9")));

    let history = svc.ledger_history(&tiered.id).await.unwrap();
    assert!(verify_continuity(&history));
    assert_eq!(history.len(), 3);
}

/// Repeating an attendance report must not generate duplicate entries.
#[tokio::test]
async fn attendance_report_is_idempotent() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();

    for _ in 0..3 {
        svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
            .await
            .unwrap();
    }
    let history = svc.ledger_history(&a.id).await.unwrap();
    assert_eq!(history.len(), 2);
}

/// Concurrent starts for the same slot admit exactly one assignment.
#[tokio::test]
async fn concurrent_starts_admit_one() {
    let svc = Arc::new(seeded_service(ResolutionPolicy::default()).await);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
                .await
        }));
    }
    let mut ok = 0;
    let mut dup = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ForemanError::DuplicateOpenAssignment { .. }) => dup += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(dup, 3);
    assert_eq!(svc.open_assignments().unwrap().len(), 1);
}

/// The scheduled check seeds absence rows and re-routes open work.
#[tokio::test]
async fn scheduled_check_reroutes_open_assignments() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    assert_eq!(a.supervisor, Some(sup("S1")));

    let summary = svc.run_attendance_check(date()).await.unwrap();
    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.absent, 1);
    assert_eq!(svc.assignment(&a.id).unwrap().supervisor, Some(sup("S2")));

    // On-time check-in (deadline extended for the row) flips back.
    svc.record_check_in(&sup("S1"), date(), chrono::NaiveTime::from_hms_opt(9, 10, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(svc.assignment(&a.id).unwrap().supervisor, Some(sup("S1")));
}

/// Manual shift override fans out to every open assignment on the
/// work-center/shift, override tier included.
#[tokio::test]
async fn manual_shift_override_fans_out() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    let b = svc
        .on_process_start(WorkItemId::new("MO-2"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    svc.manual_assign(&b.id, sup("S9"), None, ActorId::new("lead"))
        .await
        .unwrap();

    let moved = svc
        .manual_override_shift(
            &BoardKey::new(WorkCenterId::new(WC), Shift::First, date()),
            sup("S5"),
            ActorId::new("plant-manager"),
        )
        .await
        .unwrap();
    assert_eq!(moved, 2);
    assert_eq!(svc.assignment(&a.id).unwrap().supervisor, Some(sup("S5")));
    assert_eq!(svc.assignment(&b.id).unwrap().supervisor, Some(sup("S5")));

    // Later flips leave the manual placements alone.
    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();
    assert_eq!(svc.assignment(&a.id).unwrap().supervisor, Some(sup("S5")));
}

/// Under the strict policy, an override whose primary is absent and
/// whose backup cannot be confirmed terminates as both-unavailable.
#[tokio::test]
async fn strict_policy_reports_both_unavailable() {
    let svc = seeded_service(ResolutionPolicy {
        strict_both_unavailable: true,
    })
    .await;
    let mut intents = svc.take_notification_stream().unwrap();

    svc.put_override(
        SupervisorOverride::new(
            WorkItemId::new("MO-1"),
            ProcessId::new(PROC),
            Shift::First,
            sup("S1"),
        )
        .with_backup(sup("S8")),
    )
    .await
    .unwrap();
    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();

    let key = ResolutionKey::new(WorkItemId::new("MO-1"), ProcessId::new(PROC), Shift::First);
    let result = svc.resolve(&key, at()).await.unwrap();
    assert!(result.supervisor.is_none());
    assert_eq!(result.reason, ChangeReason::BothUnavailable);

    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    assert!(a.supervisor.is_none());
    assert!(intents.try_recv().is_ok());
}

/// Shift change re-resolves under the new shift's configuration.
#[tokio::test]
async fn shift_change_re_resolves() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let key = AssignmentKey::new(WorkItemId::new("MO-1"), ProcessId::new(PROC));
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();

    let moved = svc
        .change_shift(&a.id, Shift::Second, Some(ActorId::new("planner")), at())
        .await
        .unwrap();
    // No second-shift configuration: the assignment goes unresolved.
    assert_eq!(moved.shift, Shift::Second);
    assert!(moved.supervisor.is_none());

    let history = svc.ledger_history(&a.id).await.unwrap();
    assert_eq!(history.last().unwrap().reason, ChangeReason::ShiftChange);
    assert_eq!(history.last().unwrap().shift, Shift::Second);
    assert!(verify_continuity(&history));
    assert!(svc.current_assignment(&key).unwrap().is_some());
}

/// Write-through consistency: the live assignee always equals the
/// ledger head, across every kind of transition.
#[tokio::test]
async fn live_assignee_matches_ledger_head() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();

    svc.report_attendance(&WorkCenterId::new(WC), Shift::First, date(), false, None)
        .await
        .unwrap();
    svc.manual_assign(&a.id, sup("S3"), None, ActorId::new("lead"))
        .await
        .unwrap();

    let live = svc.assignment(&a.id).unwrap();
    let head = svc.ledger_history(&a.id).await.unwrap().pop().unwrap();
    assert_eq!(live.supervisor, head.to_supervisor);
}

/// A work item's history spans every process and execution it had.
#[tokio::test]
async fn work_item_history_spans_executions() {
    let svc = seeded_service(ResolutionPolicy::default()).await;
    let a = svc
        .on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();
    svc.on_process_close(&a.id).await.unwrap();
    svc.on_process_start(WorkItemId::new("MO-1"), ProcessId::new(PROC), None, at())
        .await
        .unwrap();

    let history = svc
        .history_for_work_item(&WorkItemId::new("MO-1"))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].assignment.id, a.id);
    assert_eq!(history[0].entries.len(), 1);
}
