//! Whole-schedule quality metrics.
//!
//! The overall score (0-100) weighs slot fill, workload balance, weekend
//! balance and post rotation, minus a penalty for hard-rule violations
//! reported by the oracle. Checkpoints and dead-end detection both read it.

use serde::Serialize;

use rosterforge_core::ScheduleState;

use crate::oracle::ScheduleOracle;

const FILL_WEIGHT: f64 = 0.35;
const WORKLOAD_WEIGHT: f64 = 0.25;
const WEEKEND_WEIGHT: f64 = 0.15;
const ROTATION_WEIGHT: f64 = 0.15;
const PENALTY_WEIGHT: f64 = 0.10;

/// Measured quality of one schedule state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    /// Weighted overall score, clamped to `0..=100`.
    pub overall: f64,
    pub fill: f64,
    pub workload: f64,
    pub weekend: f64,
    pub rotation: f64,
    pub penalty: f64,
    /// `(max - min) / max` over work-percentage-normalized shift counts.
    pub workload_imbalance: f64,
    /// `(max - min) / max` over Saturday/Sunday counts.
    pub weekend_imbalance: f64,
    pub empty_shifts: usize,
    pub constraint_violations: usize,
}

/// Computes [`QualityReport`]s.
///
/// # Example
///
/// ```
/// use rosterforge_core::{WorkerId, WorkerProfile};
/// use rosterforge_solver::metrics::QualityMetrics;
/// use rosterforge_solver::oracle::RuleOracle;
/// use rosterforge_test::ScheduleBuilder;
///
/// let state = ScheduleBuilder::new(2, 1)
///     .worker(WorkerProfile::new(WorkerId(1), 1))
///     .assign(WorkerId(1), 0, 0)
///     .build();
/// let report = QualityMetrics::evaluate(&state, &RuleOracle::permissive());
/// assert_eq!(report.fill, 50.0);
/// assert_eq!(report.empty_shifts, 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityMetrics;

impl QualityMetrics {
    pub fn evaluate<O: ScheduleOracle>(state: &ScheduleState, oracle: &O) -> QualityReport {
        let normalized = normalized_counts(state);
        let sat_sun: Vec<f64> = state
            .roster()
            .ids()
            .map(|w| f64::from(state.sat_sun_count(w)))
            .collect();

        let empty_shifts = state.count_empty();
        let constraint_violations = oracle.constraint_violations(state);

        let fill = fill_score(state.grid().total_slots(), empty_shifts);
        let workload = balance_score(&normalized, 100.0);
        let weekend = balance_score(&sat_sun, 80.0);
        let rotation = rotation_score(state);
        let penalty = (constraint_violations as f64 * 10.0).min(100.0);

        let overall = (fill * FILL_WEIGHT
            + workload * WORKLOAD_WEIGHT
            + weekend * WEEKEND_WEIGHT
            + rotation * ROTATION_WEIGHT
            - penalty * PENALTY_WEIGHT)
            .clamp(0.0, 100.0);

        QualityReport {
            overall,
            fill,
            workload,
            weekend,
            rotation,
            penalty,
            workload_imbalance: imbalance(&normalized),
            weekend_imbalance: imbalance(&sat_sun),
            empty_shifts,
            constraint_violations,
        }
    }
}

fn normalized_counts(state: &ScheduleState) -> Vec<f64> {
    state
        .roster()
        .iter()
        .filter(|p| p.work_percentage > 0.0)
        .map(|p| f64::from(state.assigned_count(p.id)) * 100.0 / p.work_percentage)
        .collect()
}

fn fill_score(total: usize, empty: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (total - empty) as f64 / total as f64 * 100.0
}

/// `100 - cv * factor`, where cv is the coefficient of variation.
fn balance_score(counts: &[f64], factor: f64) -> f64 {
    if counts.is_empty() {
        return 100.0;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 100.0;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    (100.0 - variance.sqrt() / mean * factor).max(0.0)
}

fn rotation_score(state: &ScheduleState) -> f64 {
    let posts = state.posts_per_day();
    if posts <= 1 {
        return 100.0;
    }
    let mut scores = Vec::new();
    for worker in state.roster().ids() {
        let Some(counters) = state.counters(worker) else {
            continue;
        };
        if counters.total == 0 {
            continue;
        }
        let expected = f64::from(counters.total) / posts as f64;
        let held: Vec<f64> = counters
            .posts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| f64::from(c))
            .collect();
        if held.is_empty() {
            continue;
        }
        let variance = held.iter().map(|c| (c - expected).powi(2)).sum::<f64>() / held.len() as f64;
        scores.push((100.0 - variance * 20.0).max(0.0));
    }
    if scores.is_empty() {
        100.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn imbalance(counts: &[f64]) -> f64 {
    let max = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = counts.iter().copied().fold(f64::INFINITY, f64::min);
    if counts.is_empty() || max <= 0.0 {
        return 0.0;
    }
    (max - min) / max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RuleOracle;
    use rosterforge_core::WorkerProfile;
    use rosterforge_test::{balanced_scenario, imbalanced_pair_scenario, ScheduleBuilder, A};

    #[test]
    fn test_balanced_schedule_scores_high() {
        let state = balanced_scenario();
        let report = QualityMetrics::evaluate(&state, &RuleOracle::permissive());
        assert_eq!(report.fill, 100.0);
        assert_eq!(report.workload, 100.0);
        assert_eq!(report.workload_imbalance, 0.0);
        assert_eq!(report.empty_shifts, 0);
        assert_eq!(report.penalty, 0.0);
        assert!(report.overall > 70.0);
    }

    #[test]
    fn test_imbalance_lowers_workload_score() {
        let balanced = QualityMetrics::evaluate(&balanced_scenario(), &RuleOracle::permissive());
        let skewed =
            QualityMetrics::evaluate(&imbalanced_pair_scenario(), &RuleOracle::permissive());
        assert!(skewed.workload < balanced.workload);
        // 13 vs 7 shifts
        assert!((skewed.workload_imbalance - 6.0 / 13.0).abs() < 1e-9);
        assert!(skewed.overall < balanced.overall);
    }

    #[test]
    fn test_penalty_counts_oracle_violations() {
        let state = balanced_scenario();
        // Consecutive shifts everywhere break a two-day gap
        let report = QualityMetrics::evaluate(&state, &RuleOracle::new(2));
        assert!(report.constraint_violations > 0);
        assert!(report.penalty <= 100.0);
        assert!(report.penalty > 0.0);
    }

    #[test]
    fn test_rotation_single_post_is_perfect() {
        let state = ScheduleBuilder::new(3, 1)
            .worker(WorkerProfile::new(A, 3))
            .assign(A, 0, 0)
            .assign(A, 1, 0)
            .build();
        let report = QualityMetrics::evaluate(&state, &RuleOracle::permissive());
        assert_eq!(report.rotation, 100.0);
        assert!((report.fill - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.weekend_imbalance, 0.0);
    }
}
