//! Integration tests for the task/step state machine: the five engine
//! operations end to end over the in-memory store, including rollback,
//! fencing, and pause/resume semantics.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use nudge_core::engine::AdvanceResult;
use nudge_core::error::EngineError;
use nudge_core::store::Store;
use nudge_db::models::{EnergyLevel, TaskStatus};
use nudge_test_utils::{ScriptedBackend, engine_with_backend, step_json};

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_issues_first_step() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, store) = engine_with_backend(backend.clone());

    let view = engine
        .start("Clean my room", EnergyLevel::Medium)
        .await
        .expect("start should succeed");

    assert_eq!(view.step_text, "pick up one item from the floor");
    assert!(view.estimated_seconds <= 10);
    assert_eq!(view.step_order, 0);
    assert_eq!(view.simplification_level, 0);
    assert!(!view.is_complete);

    let task = store.get_task(view.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(task.original_goal, "Clean my room");
    assert_eq!(task.current_step_index, 0);
}

#[tokio::test]
async fn start_sanitizes_goal() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("tap the desk", 2);
    let (engine, store) = engine_with_backend(backend);

    let view = engine
        .start("  clean\tmy room \n", EnergyLevel::Low)
        .await
        .unwrap();

    let task = store.get_task(view.task_id).await.unwrap().unwrap();
    assert_eq!(task.original_goal, "clean my room");
}

#[tokio::test]
async fn start_rejects_empty_goal_without_backend_call() {
    let backend = Arc::new(ScriptedBackend::new());
    let (engine, store) = engine_with_backend(backend.clone());

    let result = engine.start("   ", EnergyLevel::Medium).await;
    assert!(matches!(result, Err(EngineError::EmptyGoal)));
    assert_eq!(backend.call_count(), 0);
    assert_eq!(store.task_count().await, 0);
}

#[tokio::test]
async fn start_rolls_back_on_generator_error() {
    // Backend fails on the call and on the client's transparent retry;
    // no task may survive.
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_fail("model not loaded");
    backend.push_fail("model not loaded");
    let (engine, store) = engine_with_backend(backend);

    let result = engine.start("clean my room", EnergyLevel::Medium).await;
    assert!(matches!(result, Err(EngineError::BackendFailure(_))));
    assert_eq!(store.task_count().await, 0, "no orphaned task");
    assert_eq!(store.step_count().await, 0);
}

// ---------------------------------------------------------------------------
// next
// ---------------------------------------------------------------------------

#[tokio::test]
async fn next_completes_current_and_issues_following_step() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_step("put the item on the shelf", 6);
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();

    let result = engine
        .next(first.task_id, first.step_id, Some(5), false)
        .await
        .expect("next should succeed");

    let AdvanceResult::Step(second) = result else {
        panic!("expected a new step");
    };
    assert_eq!(second.step_order, 1, "next increments order by exactly 1");
    assert_eq!(second.simplification_level, 0);
    assert_eq!(second.step_text, "put the item on the shelf");

    let completed = store.get_step(first.step_id).await.unwrap().unwrap();
    assert!(completed.completed);
    assert_eq!(completed.actual_duration_seconds, Some(5));

    let task = store.get_task(first.task_id).await.unwrap().unwrap();
    assert_eq!(task.current_step_index, 1);
}

#[tokio::test]
async fn next_resets_simplification_level() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_step("walk to the nearest item", 4);
    backend.push_step("put the item on the shelf", 6);
    let (engine, _store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let simplified = engine.simplify(first.task_id, first.step_id).await.unwrap();
    assert_eq!(simplified.simplification_level, 1);

    let result = engine
        .next(first.task_id, simplified.step_id, None, false)
        .await
        .unwrap();
    let AdvanceResult::Step(next) = result else {
        panic!("expected a new step");
    };
    assert_eq!(next.simplification_level, 0, "next resets the level");
    assert_eq!(next.step_order, 1);
}

#[tokio::test]
async fn next_with_goal_complete_finishes_task_without_generation() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, store) = engine_with_backend(backend.clone());

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let calls_before = backend.call_count();

    let result = engine
        .next(first.task_id, first.step_id, Some(6), true)
        .await
        .unwrap();
    assert_eq!(
        result,
        AdvanceResult::Completed {
            task_id: first.task_id
        }
    );

    let task = store.get_task(first.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    let step = store.get_step(first.step_id).await.unwrap().unwrap();
    assert!(step.completed);
    assert_eq!(backend.call_count(), calls_before, "completion never generates");
}

#[tokio::test]
async fn next_surfaces_timeout_and_leaves_state_unchanged() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_slow(Duration::from_secs(10), step_json("too late", 2));
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();

    let result = engine.next(first.task_id, first.step_id, None, false).await;
    assert!(matches!(result, Err(EngineError::Timeout)));

    // The user-visible current step is exactly as before the call.
    let task = store.get_task(first.task_id).await.unwrap().unwrap();
    assert_eq!(task.current_step_index, 0);
    let current = store.get_current_step(first.task_id).await.unwrap().unwrap();
    assert_eq!(current.id, first.step_id);
    assert!(!current.completed);
}

#[tokio::test]
async fn next_rollback_on_exhausted_retries() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    // Three denylisted candidates exhaust the attempt budget.
    backend.push_step("organize the shelf", 4);
    backend.push_step("organize the shelf", 4);
    backend.push_step("organize the shelf", 4);
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let task_before = store.get_task(first.task_id).await.unwrap().unwrap();

    let result = engine.next(first.task_id, first.step_id, Some(3), false).await;
    assert!(matches!(result, Err(EngineError::ExhaustedRetries { .. })));

    let task_after = store.get_task(first.task_id).await.unwrap().unwrap();
    assert_eq!(task_after.status, task_before.status);
    assert_eq!(task_after.current_step_index, task_before.current_step_index);
    assert_eq!(task_after.version, task_before.version);

    let current = store.get_current_step(first.task_id).await.unwrap().unwrap();
    assert_eq!(current.id, first.step_id);
    assert!(!current.completed, "no progress is silently lost");
}

#[tokio::test]
async fn next_with_stale_step_handle_is_a_conflict() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, _store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();

    let result = engine.next(first.task_id, Uuid::new_v4(), None, false).await;
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn next_on_paused_task_is_invalid() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, _store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    engine.pause(first.task_id).await.unwrap();

    let result = engine.next(first.task_id, first.step_id, None, false).await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition { op: "next", .. })
    ));
}

#[tokio::test]
async fn concurrent_next_calls_serialize_to_one_winner() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_slow(Duration::from_millis(30), step_json("put the item away", 5));
    let (engine, _store) = engine_with_backend(backend.clone());
    let engine = Arc::new(engine);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();

    let a = {
        let engine = Arc::clone(&engine);
        let (task_id, step_id) = (first.task_id, first.step_id);
        tokio::spawn(async move { engine.next(task_id, step_id, None, false).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        let (task_id, step_id) = (first.task_id, first.step_id);
        tokio::spawn(async move { engine.next(task_id, step_id, None, false).await })
    };

    let (a, b) = futures::join!(a, b);
    let results = [a.unwrap(), b.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one concurrent next may win");
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(EngineError::Conflict(_)))),
        "the loser sees a conflict"
    );
    assert_eq!(backend.call_count(), 2, "the losing call never generates");
}

// ---------------------------------------------------------------------------
// simplify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn simplify_twice_increments_level_and_keeps_order() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_step("walk to the nearest item", 4);
    backend.push_step("take one step toward the floor", 2);
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    assert_eq!(first.simplification_level, 0);

    let once = engine.simplify(first.task_id, first.step_id).await.unwrap();
    assert_eq!(once.simplification_level, 1);
    assert_eq!(once.step_order, first.step_order);
    assert_eq!(once.step_id, first.step_id, "replacement is in place");
    assert_eq!(once.step_text, "walk to the nearest item");

    let twice = engine.simplify(first.task_id, once.step_id).await.unwrap();
    assert_eq!(twice.simplification_level, 2);
    assert_eq!(twice.step_order, first.step_order);
    assert_eq!(twice.step_text, "take one step toward the floor");

    // The superseded content is gone; only the replacement remains.
    let stored = store.get_step(first.step_id).await.unwrap().unwrap();
    assert_eq!(stored.step_text, "take one step toward the floor");
    assert_eq!(stored.simplification_level, 2);
    assert_eq!(store.step_count().await, 1);
}

#[tokio::test]
async fn simplify_enforces_tighter_time_bound() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    // 6 seconds is too long once simplified; the retry at 4 passes.
    backend.push_step("walk to the nearest item", 6);
    backend.push_step("walk to the nearest item", 4);
    let (engine, _store) = engine_with_backend(backend.clone());

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let simplified = engine.simplify(first.task_id, first.step_id).await.unwrap();

    assert_eq!(simplified.estimated_seconds, 4);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn simplify_rollback_leaves_step_unchanged() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    backend.push_step("organize it", 3);
    backend.push_step("organize it", 3);
    backend.push_step("organize it", 3);
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();

    let result = engine.simplify(first.task_id, first.step_id).await;
    assert!(matches!(result, Err(EngineError::ExhaustedRetries { .. })));

    let stored = store.get_step(first.step_id).await.unwrap().unwrap();
    assert_eq!(stored.step_text, "pick up one item from the floor");
    assert_eq!(stored.simplification_level, 0);
}

// ---------------------------------------------------------------------------
// pause / resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_then_resume_returns_identical_step() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, store) = engine_with_backend(backend.clone());

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let calls_before = backend.call_count();

    engine.pause(first.task_id).await.unwrap();
    let task = store.get_task(first.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Paused);

    let resumed = engine.resume(first.task_id).await.unwrap();
    assert_eq!(resumed.status, TaskStatus::Active);
    assert_eq!(resumed.original_goal, "clean my room");

    let step = resumed.current_step.expect("current step survives the pause");
    assert_eq!(step.step_id, first.step_id);
    assert_eq!(step.step_text, first.step_text);
    assert_eq!(step.step_order, first.step_order);
    assert_eq!(step.simplification_level, first.simplification_level);

    assert_eq!(backend.call_count(), calls_before, "resume never generates");
}

#[tokio::test]
async fn pause_on_paused_task_is_invalid() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, _store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    engine.pause(first.task_id).await.unwrap();

    let result = engine.pause(first.task_id).await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition { op: "pause", .. })
    ));
}

#[tokio::test]
async fn resume_on_active_task_is_a_read_only_noop() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    let version_before = store.get_task(first.task_id).await.unwrap().unwrap().version;

    let resumed = engine.resume(first.task_id).await.unwrap();
    assert_eq!(resumed.status, TaskStatus::Active);
    assert_eq!(resumed.current_step.unwrap().step_id, first.step_id);

    let version_after = store.get_task(first.task_id).await.unwrap().unwrap().version;
    assert_eq!(version_after, version_before, "no write happened");
}

#[tokio::test]
async fn resume_on_completed_task_is_invalid() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_step("pick up one item from the floor", 7);
    let (engine, _store) = engine_with_backend(backend);

    let first = engine.start("clean my room", EnergyLevel::Medium).await.unwrap();
    engine
        .next(first.task_id, first.step_id, None, true)
        .await
        .unwrap();

    let result = engine.resume(first.task_id).await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition { op: "resume", .. })
    ));
}

#[tokio::test]
async fn operations_on_unknown_task_report_not_found() {
    let backend = Arc::new(ScriptedBackend::new());
    let (engine, _store) = engine_with_backend(backend);

    let ghost = Uuid::new_v4();
    assert!(matches!(
        engine.pause(ghost).await,
        Err(EngineError::TaskNotFound(_))
    ));
    assert!(matches!(
        engine.resume(ghost).await,
        Err(EngineError::TaskNotFound(_))
    ));
    assert!(matches!(
        engine.next(ghost, Uuid::new_v4(), None, false).await,
        Err(EngineError::TaskNotFound(_))
    ));
}
