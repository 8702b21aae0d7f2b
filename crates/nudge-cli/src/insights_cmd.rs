//! `nudge insights` command: show energy efficiency and peak hours.

use anyhow::Result;

use nudge_core::insights;
use nudge_core::store::Store;

/// Run the insights command.
pub async fn run_insights(store: &dyn Store) -> Result<()> {
    let report = insights::energy_insights(store).await?;

    if report.efficiency.is_empty() && report.peak_hours.is_empty() {
        println!("No completed steps yet. Finish a few micro-steps first.");
        return Ok(());
    }

    println!("Efficiency by energy level (estimated vs actual):");
    for entry in &report.efficiency {
        println!(
            "  {:<6} {:>6.1}%  ({} steps)",
            entry.level.to_string(),
            entry.efficiency_pct,
            entry.completed_steps,
        );
    }

    if !report.peak_hours.is_empty() {
        let hours: Vec<String> = report
            .peak_hours
            .iter()
            .map(|h| format!("{h:02}:00"))
            .collect();
        println!();
        println!("Peak completion hours: {}", hours.join(", "));
    }
    if let Some(best) = report.best_hour {
        println!("Best time to start: {best:02}:00");
    }

    Ok(())
}
