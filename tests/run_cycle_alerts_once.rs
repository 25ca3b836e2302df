mod support;

use chrono::Local;
use slotwatch::application::usecases::{CycleOutcome, HandleDiffUseCase, RunCycleUseCase};
use slotwatch::application::{AppError, EventLog, EventQuery, MonitorState, ReadError, SnapshotStore};
use slotwatch::domain::{EventKind, HeartbeatStatus, InterestPolicy, Snapshot, TargetList};
use slotwatch::infrastructure::memory_store::{InMemoryEventLog, InMemorySnapshotStore};

use support::{RecordingNotifier, ScriptedReader, slots};

fn general(blacklist: &[&str]) -> MonitorState {
    let policy = InterestPolicy::new(
        TargetList::default(),
        blacklist.iter().map(|b| b.to_string()).collect(),
    );
    MonitorState::new(policy, Local::now())
}

fn sniper(targets: &[&str]) -> MonitorState {
    MonitorState::new(InterestPolicy::new(TargetList::new(targets), vec![]), Local::now())
}

#[tokio::test]
async fn alerts_once_and_again_after_reopening() {
    let reader = ScriptedReader::of(&[
        &["A"],
        &["A", "B"],
        &["A", "B"],
        &["A"],
        &["A", "B"],
    ]);
    let snapshots = InMemorySnapshotStore::new();
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();
    let scratch = tempfile::tempdir().unwrap();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: scratch.path().to_path_buf(),
        },
    };
    let mut state = general(&[]);

    // baseline: nothing sent
    cycle.execute(&mut state).await.unwrap();
    assert_eq!(alerts.count(), 0);

    // B opens: one alert
    cycle.execute(&mut state).await.unwrap();
    assert_eq!(alerts.count(), 1);
    assert!(alerts.any_contains("• B"));

    // still open: no repeat
    cycle.execute(&mut state).await.unwrap();
    assert_eq!(alerts.count(), 1);

    // B closes, then reopens: alerted again
    cycle.execute(&mut state).await.unwrap();
    cycle.execute(&mut state).await.unwrap();
    assert_eq!(alerts.count(), 2);
    assert_eq!(state.alerts_sent, 2);
    assert_eq!(snapshots.snapshot_writes(), 5);

    // newest first, baseline excluded
    let recent: Vec<&str> = state.recent.iter().map(String::as_str).collect();
    assert_eq!(recent.len(), 3);
    assert!(recent[0].starts_with("🟢 ") && recent[0].ends_with(": B"));
    assert!(recent[1].starts_with("🔴 ") && recent[1].ends_with(": B"));
    assert!(recent[2].starts_with("🟢 ") && recent[2].ends_with(": B"));

    let kinds: Vec<(EventKind, String)> = events
        .all()
        .into_iter()
        .map(|e| (e.kind, e.slot))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (EventKind::SessionStart, "A".to_string()),
            (EventKind::Added, "B".to_string()),
            (EventKind::Removed, "B".to_string()),
            (EventKind::Added, "B".to_string()),
        ]
    );
}

#[tokio::test]
async fn blacklisted_addition_is_logged_but_not_alerted() {
    let reader = ScriptedReader::of(&[&["B", "C"]]);
    let snapshots =
        InMemorySnapshotStore::with_snapshot(Snapshot::new(slots(&["A", "B"]), Local::now()));
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: std::env::temp_dir(),
        },
    };
    let mut state = general(&["C"]);

    let outcome = cycle.execute(&mut state).await.unwrap();
    let CycleOutcome::Compared(report) = outcome else {
        panic!("expected a comparison");
    };
    assert_eq!(report.added, slots(&["C"]));
    assert_eq!(report.removed, slots(&["A"]));
    assert!(report.notable.is_empty());
    assert_eq!(alerts.count(), 0);
    assert_eq!(state.engine.notified_count(), 0);

    let logged = events.list(EventQuery { limit: 10, ..Default::default() }).await.unwrap();
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().any(|e| e.kind == EventKind::Added && e.slot == "C"));
    assert!(logged.iter().any(|e| e.kind == EventKind::Removed && e.slot == "A"));
}

#[tokio::test]
async fn first_cycle_takes_baseline() {
    let reader = ScriptedReader::of(&[&["X"]]);
    let snapshots = InMemorySnapshotStore::new();
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: std::env::temp_dir(),
        },
    };
    let mut state = general(&[]);

    cycle.execute(&mut state).await.unwrap();

    assert_eq!(alerts.count(), 0);
    let snap = snapshots.load_snapshot().await.unwrap().unwrap();
    assert_eq!(snap.slots, slots(&["X"]));
    assert_eq!(state.current, slots(&["X"]));
    let hb = snapshots.load_heartbeat().await.unwrap().unwrap();
    assert_eq!(hb.status, HeartbeatStatus::Running);
    assert!(state.recent.is_empty());
}

#[tokio::test]
async fn sniper_mode_only_alerts_on_targets() {
    let reader = ScriptedReader::of(&[
        &["ORTOPEDIA"],
        &["ORTOPEDIA", "CARDIOLOGIA GERAL", "DERMATOLOGIA"],
    ])
    .with_screenshots();
    let snapshots = InMemorySnapshotStore::new();
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();
    let scratch = tempfile::tempdir().unwrap();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: scratch.path().to_path_buf(),
        },
    };
    let mut state = sniper(&["cardio"]);

    cycle.execute(&mut state).await.unwrap();
    cycle.execute(&mut state).await.unwrap();

    assert_eq!(alerts.count(), 1);
    assert_eq!(alerts.photos(), 1);
    let text = alerts.last().unwrap();
    assert!(text.contains("CARDIOLOGIA GERAL"));
    assert!(!text.contains("DERMATOLOGIA"));
    // screenshot is cleaned up after sending
    assert!(!scratch.path().join("alert_screenshot.png").exists());
}

#[tokio::test]
async fn transient_read_skips_without_touching_snapshot() {
    let reader = ScriptedReader::new(vec![Err(ReadError::Transient("timeout".into()))]);
    let before = Snapshot::new(slots(&["A"]), Local::now());
    let snapshots = InMemorySnapshotStore::with_snapshot(before.clone());
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: std::env::temp_dir(),
        },
    };
    let mut state = general(&[]);

    let outcome = cycle.execute(&mut state).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped("timeout".into()));
    assert_eq!(snapshots.snapshot_writes(), 0);
    assert_eq!(snapshots.load_snapshot().await.unwrap(), Some(before));
    assert!(events.all().is_empty());
    let hb = snapshots.load_heartbeat().await.unwrap().unwrap();
    assert_eq!(hb.status, HeartbeatStatus::Error);
}

#[tokio::test]
async fn invalid_session_is_reported_to_caller() {
    let reader = ScriptedReader::new(vec![Err(ReadError::SessionInvalid)]);
    let snapshots = InMemorySnapshotStore::new();
    let events = InMemoryEventLog::new();
    let alerts = RecordingNotifier::new();

    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &snapshots,
        handle_diff: HandleDiffUseCase {
            events: &events,
            publisher: None,
            alerts: &alerts,
            reader: &reader,
            scratch_dir: std::env::temp_dir(),
        },
    };
    let mut state = general(&[]);

    let err = cycle.execute(&mut state).await.unwrap_err();
    assert!(matches!(err, AppError::Session));
    assert_eq!(snapshots.snapshot_writes(), 0);
}
