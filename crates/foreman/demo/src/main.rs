#![deny(unsafe_code)]
//! Demo binary walking one plant day through the supervision engine.
//!
//! Runs a self-contained demonstration of:
//! 1. Configuration seeding (processes, shift defaults, an override)
//! 2. Process starts across the resolution tiers
//! 3. The attendance deadline check and a mid-shift flip
//! 4. Manual interventions and rework routing
//! 5. The ledger audit trail and the notification stream
//!
//! No external services required; all state lives in memory.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use foreman_engine::{
    ConfigStore, InMemoryConfigStore, InMemoryLedger, ResolutionPolicy, SupervisionService,
};
use foreman_types::{
    ActorId, BoardKey, ProcessDefinition, ProcessId, Shift, ShiftDefault, SupervisorId,
    SupervisorOverride, WorkCenterId, WorkItemId,
};
use std::sync::Arc;

// ── Formatting helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║       Foreman  --  Supervisor Resolution Engine Demo          ║
 ║                                                               ║
 ║   Tiered resolution, attendance flips, manual overrides,      ║
 ║   and an append-only change ledger.                           ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("{}", BANNER);

    if let Err(e) = run_demo().await {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {}", e);
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    today()
        .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
        .and_utc()
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let coiling = WorkCenterId::new("coiling");
    let coil_op = ProcessId::new("coiling-op");
    let plating = ProcessId::new("plating-op");

    // ── Phase A: Configuration ──────────────────────────────────────
    section("Phase A: Configuration");

    let store = Arc::new(InMemoryConfigStore::new());
    store
        .put_process(ProcessDefinition::new(
            coil_op.clone(),
            "Coiling Operation",
            coiling.clone(),
        ))
        .await?;
    store
        .put_process(ProcessDefinition::new(
            plating.clone(),
            "Plating Operation",
            WorkCenterId::new("plating-line"),
        ))
        .await?;
    store
        .put_shift_default(
            ShiftDefault::new(
                coiling.clone(),
                Shift::First,
                SupervisorId::new("anna"),
                SupervisorId::new("bert"),
            )
            .with_window(
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            )
            .with_check_in_deadline(NaiveTime::from_hms_opt(6, 15, 0).unwrap()),
        )
        .await?;
    ok("Shift default: coiling / shift_1  primary=anna  backup=bert");
    info("No default configured for the plating line");

    let svc = SupervisionService::new(
        store,
        Arc::new(InMemoryLedger::new()),
        ResolutionPolicy::default(),
    );
    let mut intents = svc
        .take_notification_stream()
        .ok_or("notification stream already claimed")?;
    ok("SupervisionService online");

    // ── Phase B: Process starts ─────────────────────────────────────
    section("Phase B: Process starts");

    let mo1 = svc
        .on_process_start(WorkItemId::new("MO-1001"), coil_op.clone(), None, at(7, 0))
        .await?;
    ok(&format!(
        "MO-1001/coiling-op  assigned to {}  (tier {})",
        mo1.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
        mo1.tier
    ));

    svc.put_override(
        SupervisorOverride::new(
            WorkItemId::new("MO-1002"),
            coil_op.clone(),
            Shift::First,
            SupervisorId::new("carla"),
        )
        .with_reason("customer audit run")
        .with_created_by(ActorId::new("plant-manager")),
    )
    .await?;
    let mo2 = svc
        .on_process_start(WorkItemId::new("MO-1002"), coil_op.clone(), None, at(7, 5))
        .await?;
    ok(&format!(
        "MO-1002/coiling-op  assigned to {}  (tier {})",
        mo2.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
        mo2.tier
    ));

    let unresolved = svc
        .on_process_start(WorkItemId::new("MO-2001"), plating.clone(), None, at(7, 10))
        .await?;
    warn(&format!(
        "MO-2001/plating-op  unresolved (tier {})",
        unresolved.tier
    ));
    if let Ok(intent) = intents.try_recv() {
        warn(&format!("Notification intent: {}", intent.message));
    }

    // ── Phase C: Attendance ─────────────────────────────────────────
    section("Phase C: Attendance deadline check");

    let summary = svc.run_attendance_check(today()).await?;
    info(&format!(
        "Check complete  seeded={}  present={}  absent={}",
        summary.seeded, summary.present, summary.absent
    ));
    let mo1_now = svc.assignment(&mo1.id)?;
    ok(&format!(
        "MO-1001 moved to {} after anna missed the 06:15 deadline",
        mo1_now.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-")
    ));
    let mo2_now = svc.assignment(&mo2.id)?;
    info(&format!(
        "MO-1002 stays with {} (override tier holds)",
        mo2_now.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-")
    ));

    // ── Phase D: Manual interventions and rework ────────────────────
    section("Phase D: Manual actions and rework");

    svc.manual_assign(
        &mo1.id,
        SupervisorId::new("dmitri"),
        Some("bert called away to maintenance".into()),
        ActorId::new("shift-lead"),
    )
    .await?;
    ok("MO-1001 manually assigned to dmitri");

    let rework = svc
        .on_rework_created(coil_op.clone(), Shift::First, None, at(10, 0))
        .await?;
    ok(&format!(
        "Rework unit {} bound to {} (whoever holds the work-center now)",
        rework.work_item,
        rework.supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-")
    ));

    let moved = svc
        .manual_override_shift(
            &BoardKey::new(coiling.clone(), Shift::First, today()),
            SupervisorId::new("elena"),
            ActorId::new("plant-manager"),
        )
        .await?;
    ok(&format!(
        "Mid-shift manual override to elena moved {} open assignments",
        moved
    ));

    // ── Phase E: Audit trail ────────────────────────────────────────
    section("Phase E: Ledger audit trail");

    for entry in svc.ledger_history(&mo1.id).await? {
        info(&format!(
            "seq={}  {} -> {}  reason={}  by={}",
            entry.seq,
            entry.from_supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
            entry.to_supervisor.as_ref().map(|s| s.0.as_str()).unwrap_or("-"),
            entry.reason,
            entry.changed_by.as_ref().map(|a| a.0.as_str()).unwrap_or("system"),
        ));
    }

    svc.on_process_close(&mo1.id).await?;
    ok("MO-1001 closed; further transitions now rejected");
    if let Err(e) = svc
        .manual_assign(
            &mo1.id,
            SupervisorId::new("anna"),
            None,
            ActorId::new("shift-lead"),
        )
        .await
    {
        info(&format!("As expected: {}", e));
    }

    Ok(())
}
