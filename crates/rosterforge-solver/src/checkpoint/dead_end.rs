//! Dead-end detection.

use serde::Serialize;
use tracing::warn;

use rosterforge_config::DeadEndConfig;

use crate::metrics::QualityReport;

/// Signals that the search has stopped making progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeadEndIndicators {
    /// Consecutive evaluations whose score tied the previous best.
    pub stagnation_iterations: u32,
    /// Consecutive evaluations that did not beat the best score.
    pub no_improvement_cycles: u32,
    /// Hard-rule violations reported by the oracle.
    pub constraint_violations: usize,
    pub severe_imbalance: bool,
    /// Empty slots that could not be filled in the last pass.
    pub impossible_assignments: usize,
    pub empty_shifts: usize,
}

impl DeadEndIndicators {
    /// Standard dead-end predicate.
    pub fn is_dead_end(&self, thresholds: &DeadEndConfig) -> bool {
        self.stagnation_iterations >= thresholds.stagnation
            || self.no_improvement_cycles >= thresholds.no_improvement
            || self.constraint_violations >= thresholds.violations as usize
            || (self.severe_imbalance && self.no_improvement_cycles >= 2)
            || self.impossible_assignments >= thresholds.impossible as usize
    }
}

/// Tracks the best score seen and decides when the search is stuck.
///
/// # Example
///
/// ```
/// use rosterforge_config::DeadEndConfig;
/// use rosterforge_solver::checkpoint::DeadEndDetector;
/// use rosterforge_solver::metrics::QualityReport;
///
/// let mut detector = DeadEndDetector::new(DeadEndConfig::default());
/// let report = QualityReport { overall: 80.0, ..QualityReport::default() };
///
/// assert!(!detector.detect_dead_end(&report, 0, 0));
/// assert!(!detector.detect_dead_end(&report, 0, 0));
/// assert_eq!(detector.indicators().no_improvement_cycles, 1);
/// ```
#[derive(Debug, Clone)]
pub struct DeadEndDetector {
    thresholds: DeadEndConfig,
    indicators: DeadEndIndicators,
    last_score: f64,
}

impl DeadEndDetector {
    pub fn new(thresholds: DeadEndConfig) -> Self {
        Self {
            thresholds,
            indicators: DeadEndIndicators::default(),
            last_score: f64::NEG_INFINITY,
        }
    }

    pub fn indicators(&self) -> &DeadEndIndicators {
        &self.indicators
    }

    /// Best score seen since the last reset.
    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    pub fn iterations_without_improvement(&self) -> u32 {
        self.indicators.no_improvement_cycles
    }

    /// Clears the indicators and resumes from `score`.
    pub fn reset(&mut self, score: f64) {
        self.indicators = DeadEndIndicators::default();
        self.last_score = score;
    }

    /// Updates the indicators from a fresh quality measurement.
    ///
    /// Many tolerance violations shorten the patience: more than ten with
    /// any stall is a dead end outright, more than five with two stalled
    /// evaluations counts as severe imbalance.
    pub fn detect_dead_end(
        &mut self,
        quality: &QualityReport,
        tolerance_violations: usize,
        impossible_assignments: usize,
    ) -> bool {
        let score = quality.overall;
        let indicators = &mut self.indicators;
        if score <= self.last_score {
            indicators.no_improvement_cycles += 1;
            if score == self.last_score {
                indicators.stagnation_iterations += 1;
            } else {
                indicators.stagnation_iterations = 0;
            }
        } else {
            indicators.no_improvement_cycles = 0;
            indicators.stagnation_iterations = 0;
            self.last_score = score;
        }

        indicators.constraint_violations = quality.constraint_violations;
        indicators.empty_shifts = quality.empty_shifts;
        indicators.impossible_assignments = impossible_assignments;
        indicators.severe_imbalance = quality.workload_imbalance
            > self.thresholds.workload_imbalance
            || quality.weekend_imbalance > self.thresholds.weekend_imbalance;

        let stalled = indicators.no_improvement_cycles;
        let dead_end = if tolerance_violations > 10 && stalled >= 1 {
            indicators.severe_imbalance = true;
            true
        } else if tolerance_violations > 5 && stalled >= 2 {
            indicators.severe_imbalance = true;
            indicators.is_dead_end(&self.thresholds)
        } else {
            indicators.is_dead_end(&self.thresholds)
        };

        if dead_end {
            warn!(
                event = "dead_end",
                no_improvement = indicators.no_improvement_cycles,
                stagnation = indicators.stagnation_iterations,
                violations = indicators.constraint_violations,
                tolerance_violations,
                empty = indicators.empty_shifts,
                impossible = indicators.impossible_assignments,
                severe_imbalance = indicators.severe_imbalance,
            );
        }
        dead_end
    }
}
