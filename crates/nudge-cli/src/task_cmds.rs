//! Task commands: start, next, simplify, pause, resume.

use anyhow::{Context, Result};
use uuid::Uuid;

use nudge_core::engine::{AdvanceResult, StepView, TaskEngine};
use nudge_core::store::Store;
use nudge_db::models::EnergyLevel;

/// Parse a task ID argument.
fn parse_task_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("invalid task ID: {input}"))
}

/// Look up the task's current step; commands act on what the user sees.
async fn current_step_id(store: &dyn Store, task_id: Uuid) -> Result<Uuid> {
    let step = store
        .get_current_step(task_id)
        .await?
        .with_context(|| format!("task {task_id} has no current step"))?;
    Ok(step.id)
}

fn print_step(view: &StepView) {
    println!();
    println!("  -> {}", view.step_text);
    println!("     about {} seconds", view.estimated_seconds);
    if view.simplification_level > 0 {
        println!("     (simplified x{})", view.simplification_level);
    }
    println!();
    println!("task {}  step {}", view.task_id, view.step_order + 1);
}

/// Run the start command: create a task and show its first micro-step.
pub async fn run_start(engine: &TaskEngine, goal: &str, energy: &str) -> Result<()> {
    let energy_level: EnergyLevel = energy
        .parse()
        .with_context(|| format!("invalid energy level: {energy} (use low, medium, or high)"))?;

    let view = engine.start(goal, energy_level).await?;
    println!("Started: {goal}");
    print_step(&view);
    Ok(())
}

/// Run the next command: complete the current step, show the next one.
pub async fn run_next(
    engine: &TaskEngine,
    store: &dyn Store,
    task_id_str: &str,
    duration: Option<i32>,
    done: bool,
) -> Result<()> {
    let task_id = parse_task_id(task_id_str)?;
    let step_id = current_step_id(store, task_id).await?;

    match engine.next(task_id, step_id, duration, done).await? {
        AdvanceResult::Step(view) => {
            println!("Nice. Next:");
            print_step(&view);
        }
        AdvanceResult::Completed { task_id } => {
            println!("Goal complete. Task {task_id} is done.");
        }
    }
    Ok(())
}

/// Run the simplify command: replace the current step with a smaller one.
pub async fn run_simplify(engine: &TaskEngine, store: &dyn Store, task_id_str: &str) -> Result<()> {
    let task_id = parse_task_id(task_id_str)?;
    let step_id = current_step_id(store, task_id).await?;

    let view = engine.simplify(task_id, step_id).await?;
    println!("Smaller:");
    print_step(&view);
    Ok(())
}

/// Run the pause command.
pub async fn run_pause(engine: &TaskEngine, task_id_str: &str) -> Result<()> {
    let task_id = parse_task_id(task_id_str)?;
    engine.pause(task_id).await?;
    println!("Paused task {task_id}. Resume whenever you are ready.");
    Ok(())
}

/// Run the resume command: reactivate and show the last-seen step.
pub async fn run_resume(engine: &TaskEngine, task_id_str: &str) -> Result<()> {
    let task_id = parse_task_id(task_id_str)?;
    let resumed = engine.resume(task_id).await?;

    println!("Resumed: {}", resumed.original_goal);
    match resumed.current_step {
        Some(view) => print_step(&view),
        None => println!("(no current step)"),
    }
    Ok(())
}
