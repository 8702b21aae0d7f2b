//! Energy insights: aggregate historical step performance.
//!
//! Summarizes completed steps into per-energy-level efficiency (estimated
//! vs actual duration) and the hours of day with the most completions.
//! Pure computation over [`Store::completed_step_stats`].

use std::collections::HashMap;

use chrono::Timelike;
use serde::Serialize;

use nudge_db::models::{CompletedStepStat, EnergyLevel};

use crate::error::EngineError;
use crate::store::Store;

/// Efficiency summary for one energy level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyEfficiency {
    pub level: EnergyLevel,
    /// Estimated time as a percentage of actual time; above 100 means the
    /// user beat the estimates.
    pub efficiency_pct: f64,
    pub completed_steps: u64,
}

/// Aggregated insight report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyInsights {
    /// Per-level efficiency, ordered low/medium/high, levels with no
    /// measured steps omitted.
    pub efficiency: Vec<EnergyEfficiency>,
    /// Up to three hours of day (0-23) with the most completions, busiest
    /// first.
    pub peak_hours: Vec<u32>,
    pub best_hour: Option<u32>,
}

/// Fetch stats from the store and aggregate them.
pub async fn energy_insights(store: &dyn Store) -> Result<EnergyInsights, EngineError> {
    let stats = store.completed_step_stats().await?;
    Ok(aggregate(&stats))
}

/// Aggregate completed-step stats into an insight report.
pub fn aggregate(stats: &[CompletedStepStat]) -> EnergyInsights {
    // Efficiency per energy level, over steps with a measured duration.
    let mut sums: HashMap<EnergyLevel, (f64, f64, u64)> = HashMap::new();
    for stat in stats {
        let Some(actual) = stat.actual_duration_seconds else {
            continue;
        };
        if actual <= 0 {
            continue;
        }
        let entry = sums.entry(stat.energy_level).or_insert((0.0, 0.0, 0));
        entry.0 += f64::from(stat.estimated_seconds);
        entry.1 += f64::from(actual);
        entry.2 += 1;
    }

    let efficiency: Vec<EnergyEfficiency> =
        [EnergyLevel::Low, EnergyLevel::Medium, EnergyLevel::High]
            .into_iter()
            .filter_map(|level| {
                sums.get(&level).map(|(est, actual, count)| EnergyEfficiency {
                    level,
                    efficiency_pct: (est / actual * 100.0 * 10.0).round() / 10.0,
                    completed_steps: *count,
                })
            })
            .collect();

    // Peak hours by completion count.
    let mut by_hour: HashMap<u32, u64> = HashMap::new();
    for stat in stats {
        if let Some(completed_at) = stat.completed_at {
            *by_hour.entry(completed_at.hour()).or_insert(0) += 1;
        }
    }
    let mut hours: Vec<(u32, u64)> = by_hour.into_iter().collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let peak_hours: Vec<u32> = hours.iter().take(3).map(|(hour, _)| *hour).collect();
    let best_hour = peak_hours.first().copied();

    EnergyInsights {
        efficiency,
        peak_hours,
        best_hour,
    }
}
