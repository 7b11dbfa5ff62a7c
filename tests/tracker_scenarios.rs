use chrono::{DateTime, Duration, TimeZone, Utc};
use work_tracker::{
    Clock, Database, ManualClock, MemorySessionStore, SessionFilter, SessionStatus, SessionStore,
    TrackerError, TrackerService,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 8, 30, 0).unwrap()
}

fn memory_tracker() -> (TrackerService<MemorySessionStore, ManualClock>, ManualClock) {
    let clock = ManualClock::new(t0());
    (
        TrackerService::new(MemorySessionStore::new(), clock.clone()),
        clock,
    )
}

fn sqlite_tracker() -> (TrackerService<Database, ManualClock>, ManualClock) {
    let clock = ManualClock::new(t0());
    let database = Database::open_in_memory().expect("in-memory database");
    (TrackerService::new(database, clock.clone()), clock)
}

/// Runs each scenario once per store implementation.
macro_rules! against_both_stores {
    ($($scenario:ident),* $(,)?) => {
        $(
            mod $scenario {
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn memory() {
                    let (tracker, clock) = super::memory_tracker();
                    super::$scenario(tracker, clock).await;
                }

                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn sqlite() {
                    let (tracker, clock) = super::sqlite_tracker();
                    super::$scenario(tracker, clock).await;
                }
            }
        )*
    };
}

against_both_stores!(
    worked_time_excludes_pauses,
    alternating_pauses_match_wall_time,
    repeated_start_returns_same_session,
    double_pause_is_rejected,
    finish_closes_open_pause,
    finished_session_is_no_longer_active,
    concurrent_pauses_apply_once,
    concurrent_starts_create_one_record,
);

async fn worked_time_excludes_pauses<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    clock.set(t0() + Duration::seconds(300));
    tracker.pause_session(&session.id, "u1").await.unwrap();
    clock.set(t0() + Duration::seconds(900));
    tracker.resume_session(&session.id, "u1").await.unwrap();
    clock.set(t0() + Duration::seconds(1200));
    let finished = tracker
        .finish_session(&session.id, "u1", "Billing integration", None)
        .await
        .unwrap();

    assert_eq!(tracker.elapsed_worked_seconds(&finished), 600);
    assert_eq!(finished.ended_at, Some(t0() + Duration::seconds(1200)));
}

async fn alternating_pauses_match_wall_time<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    let mut paused_total = 0;

    for cycle in 1..=6 {
        clock.advance_secs(cycle * 37);
        tracker.pause_session(&session.id, "u1").await.unwrap();
        clock.advance_secs(cycle * 11);
        tracker.resume_session(&session.id, "u1").await.unwrap();
        paused_total += cycle * 11;
    }
    clock.advance_secs(5);

    let current = tracker.get_active_session("u1").await.unwrap().unwrap();
    let wall = (clock.now() - t0()).num_seconds();
    assert_eq!(
        tracker.elapsed_worked_seconds(&current),
        (wall - paused_total) as u64
    );
    assert_eq!(current.paused_intervals.len(), 6);
    assert!(current
        .paused_intervals
        .windows(2)
        .all(|pair| pair[0].pause_end.unwrap() <= pair[1].pause_start));
}

async fn repeated_start_returns_same_session<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let first = tracker.start_session("u1", "w1").await.unwrap();
    clock.advance_secs(45);
    tracker.pause_session(&first.id, "u1").await.unwrap();
    let again = tracker.start_session("u1", "w1").await.unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.status(), SessionStatus::Paused);

    let history = tracker
        .list_sessions("u1", SessionFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

async fn double_pause_is_rejected<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    clock.advance_secs(10);
    let paused = tracker.pause_session(&session.id, "u1").await.unwrap();

    clock.advance_secs(10);
    let err = tracker.pause_session(&session.id, "u1").await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidTransition { .. }));

    let stored = tracker.get_active_session("u1").await.unwrap().unwrap();
    assert_eq!(stored.paused_intervals, paused.paused_intervals);
    assert_eq!(stored.version, paused.version);
}

async fn finish_closes_open_pause<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    clock.advance_secs(200);
    tracker.pause_session(&session.id, "u1").await.unwrap();
    clock.advance_secs(50);

    let finished = tracker
        .finish_session(&session.id, "u1", "Incident follow-up", Some("postmortem draft"))
        .await
        .unwrap();

    assert!(!finished.is_paused());
    assert_eq!(finished.status(), SessionStatus::Completed);
    let last = finished.paused_intervals.last().unwrap();
    assert_eq!(last.pause_end, finished.ended_at);
    assert_eq!(finished.description.as_deref(), Some("postmortem draft"));
    assert_eq!(tracker.elapsed_worked_seconds(&finished), 200);

    let err = tracker.resume_session(&session.id, "u1").await.unwrap_err();
    assert!(matches!(
        err,
        TrackerError::InvalidTransition {
            from: SessionStatus::Completed,
            ..
        }
    ));
}

async fn finished_session_is_no_longer_active<S: SessionStore>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    clock.advance_secs(60);
    tracker
        .finish_session(&session.id, "u1", "Docs", None)
        .await
        .unwrap();

    assert!(tracker.get_active_session("u1").await.unwrap().is_none());

    clock.advance_secs(60);
    let next = tracker.start_session("u1", "w1").await.unwrap();
    assert_ne!(next.id, session.id);
}

async fn concurrent_pauses_apply_once<S: SessionStore + 'static>(
    tracker: TrackerService<S, ManualClock>,
    clock: ManualClock,
) {
    let session = tracker.start_session("u1", "w1").await.unwrap();
    clock.advance_secs(30);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let tracker = tracker.clone();
            let session_id = session.id.clone();
            tokio::spawn(async move { tracker.pause_session(&session_id, "u1").await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(TrackerError::InvalidTransition { .. }) | Err(TrackerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(successes, 1);

    let stored = tracker.get_active_session("u1").await.unwrap().unwrap();
    assert_eq!(stored.paused_intervals.len(), 1);
    assert!(stored.is_paused());
    assert_eq!(stored.version, 1);
}

async fn concurrent_starts_create_one_record<S: SessionStore + 'static>(
    tracker: TrackerService<S, ManualClock>,
    _clock: ManualClock,
) {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.start_session("u1", "w1").await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let history = tracker
        .list_sessions("u1", SessionFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}
