//! The rebalancing loop.
//!
//! Each iteration reclassifies every worker, runs the redistribution
//! passes, then decides between convergence, another iteration, or a stop
//! on stagnation. Dead ends are recovered by rolling back to a checkpoint.
//! The loop always ends on the best schedule it has seen.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use rosterforge_config::RebalanceConfig;
use rosterforge_core::{Result, ScheduleState};

use crate::checkpoint::{BacktrackStatistics, Backtracker, CheckpointPhase};
use crate::metrics::QualityMetrics;
use crate::oracle::ScheduleOracle;
use crate::redistribution::{
    forced_pass, general_redistribution, greedy_fill, perturb, relaxed_pass,
    weekend_redistribution, weekend_swaps,
};
use crate::scope::RebalanceScope;
use crate::stats::RebalanceStats;
use crate::strict::{BalanceStats, StrictBalanceOptimizer};
use crate::termination::{self, LoopTermination, Termination};
use crate::tolerance::{ToleranceClassifier, ViolationReport};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No worker is outside its bounds.
    Converged,
    MaxIterations,
    /// Too many iterations without beating the best result.
    Stalled,
    /// A termination condition or the external flag fired.
    Terminated,
}

/// Outcome of one [`RebalancingLoop::run`].
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub success: bool,
    pub iterations_used: u32,
    pub total_violations: usize,
    pub general_violations: usize,
    pub weekend_violations: usize,
    pub stop_reason: StopReason,
    /// The best schedule found.
    pub schedule: ScheduleState,
}

/// Violation counts after one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub total: usize,
    pub general: usize,
    pub weekend: usize,
    pub improvement_made: bool,
    pub weekend_only_mode: bool,
}

/// Diagnostics over a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationSummary {
    pub total_iterations: u32,
    pub initial_violations: usize,
    pub final_violations: usize,
    pub best_violations: usize,
    pub improvement: i64,
    pub convergence_achieved: bool,
    pub stagnation_counter: u32,
    pub average_improvement_rate: f64,
    pub history: Vec<IterationRecord>,
}

/// Drives a schedule towards every worker being inside their tolerance
/// bounds.
#[derive(Debug)]
pub struct RebalancingLoop<O: ScheduleOracle> {
    scope: RebalanceScope<O>,
    config: RebalanceConfig,
    backtracker: Backtracker,
    terminate_flag: Option<Arc<AtomicBool>>,
    history: Vec<IterationRecord>,
    initial_violations: usize,
    best_violations: usize,
    final_violations: usize,
    iterations_used: u32,
    stagnation: u32,
    converged: bool,
}

impl<O: ScheduleOracle> RebalancingLoop<O> {
    pub fn new(state: ScheduleState, oracle: O, config: RebalanceConfig) -> Self {
        let classifier = ToleranceClassifier::from_config(&config.tolerance);
        let mut scope = RebalanceScope::new(state, oracle, classifier)
            .with_chain_max_depth(config.strategy.chain_max_depth);
        if let Some(seed) = config.random_seed {
            scope = scope.with_seed(seed);
        }
        Self {
            scope,
            backtracker: Backtracker::new(&config),
            config,
            terminate_flag: None,
            history: Vec::new(),
            initial_violations: 0,
            best_violations: 0,
            final_violations: 0,
            iterations_used: 0,
            stagnation: 0,
            converged: false,
        }
    }

    /// Stops the run at the next iteration boundary once `flag` is set.
    pub fn with_terminate_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.scope = self.scope.with_terminate_flag(flag.clone());
        self.terminate_flag = Some(flag);
        self
    }

    pub fn state(&self) -> &ScheduleState {
        self.scope.state()
    }

    pub fn into_state(self) -> ScheduleState {
        self.scope.into_state()
    }

    pub fn statistics(&self) -> &RebalanceStats {
        self.scope.stats()
    }

    pub fn backtrack_statistics(&self) -> BacktrackStatistics {
        self.backtracker.statistics()
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Pushes every worker to within `target_tolerance` shifts of target.
    ///
    /// Usually run after [`run`](Self::run), on the schedule it left. The
    /// pass shares the run's termination budget and stop flag.
    pub fn optimize_balance(
        &mut self,
        max_iterations: u32,
        target_tolerance: u32,
    ) -> Result<(bool, BalanceStats)> {
        let stop = termination::from_config(&self.config, self.terminate_flag.clone());
        let mut optimizer =
            StrictBalanceOptimizer::new(&mut self.scope, self.config.strict_balance.relaxed_every)
                .with_termination(stop);
        let balanced = optimizer.optimize_balance(max_iterations, target_tolerance)?;
        Ok((balanced, *optimizer.stats()))
    }

    /// Runs the loop and returns the best schedule found.
    pub fn run(&mut self) -> Result<OptimizationResult> {
        let stop: LoopTermination =
            termination::from_config(&self.config, self.terminate_flag.clone());
        let classifier = self.scope.classifier().clone();
        self.scope.start();

        let initial = classifier.violations(self.scope.state())?;
        self.initial_violations = initial.total();
        self.best_violations = initial.total();
        info!(
            event = "optimize_start",
            workers = self.scope.state().roster().len(),
            days = self.scope.state().num_days(),
            general = initial.general.len(),
            weekend = initial.weekend.len(),
            max_iterations = self.config.max_iterations,
        );
        self.backtracker.create_checkpoint(
            &self.scope,
            CheckpointPhase::Mandatory,
            "initial",
            initial.total(),
        );

        let mut best = self.scope.snapshot();
        let mut no_change = 0u32;
        let mut weekend_only = false;
        let mut stop_reason = StopReason::MaxIterations;

        for iteration in 1..=self.config.max_iterations {
            if stop.is_terminated(&self.scope) || self.scope.is_terminate_early() {
                stop_reason = StopReason::Terminated;
                break;
            }
            self.scope.set_iteration(iteration);
            self.scope.stats_mut().record_iteration();
            self.iterations_used = iteration;

            let report = classifier.violations(self.scope.state())?;
            let general = report.general.len();
            let weekend = report.weekend.len();
            let total = report.total();
            if total == 0 {
                best = self.scope.snapshot();
                self.best_violations = 0;
                self.converged = true;
                stop_reason = StopReason::Converged;
                break;
            }

            let wants_weekend_only =
                weekend >= 2 && (weekend * 100 >= 75 * total || weekend > general || general <= 2);
            if wants_weekend_only != weekend_only {
                weekend_only = wants_weekend_only;
                if weekend_only && self.stagnation > 2 {
                    self.stagnation = 2;
                }
                info!(event = "weekend_mode", enabled = weekend_only, general, weekend);
            }

            let impossible = self.run_passes(iteration, &report, weekend_only)?;

            let after = classifier.violations(self.scope.state())?;
            let new_total = after.total();
            let improvement_made = new_total < self.best_violations;
            if improvement_made {
                self.best_violations = new_total;
                best = self.scope.snapshot();
                no_change = 0;
                self.stagnation = 0;
            } else {
                if new_total == self.best_violations {
                    no_change += 1;
                } else {
                    no_change = 0;
                }
                self.stagnation += 1;
            }

            self.history.push(IterationRecord {
                iteration,
                total: new_total,
                general: after.general.len(),
                weekend: after.weekend.len(),
                improvement_made,
                weekend_only_mode: weekend_only,
            });
            info!(
                event = "iteration",
                iteration,
                total = new_total,
                general = after.general.len(),
                weekend = after.weekend.len(),
                best = self.best_violations,
                stagnation = self.stagnation,
                weekend_only,
            );

            let quality = QualityMetrics::evaluate(self.scope.state(), self.scope.oracle());
            if self.backtracker.should_create_checkpoint(
                iteration,
                CheckpointPhase::Improvement,
                quality.overall,
            ) {
                self.backtracker.create_checkpoint(
                    &self.scope,
                    CheckpointPhase::Improvement,
                    "progress",
                    new_total,
                );
            }
            if new_total > 0 {
                self.backtracker
                    .auto_recovery(&mut self.scope, &quality, new_total, impossible)?;
            }

            if no_change >= self.config.max_no_change
                || self.stagnation >= self.config.convergence_threshold
            {
                stop_reason = StopReason::Stalled;
                break;
            }
        }

        if let Err(err) = self.scope.restore(&best) {
            error!(event = "rollback", error = %err, "restoring the best schedule failed");
        }
        let last = classifier.violations(self.scope.state())?;
        self.final_violations = last.total();
        self.backtracker.create_checkpoint(
            &self.scope,
            CheckpointPhase::Finalization,
            "final",
            last.total(),
        );

        let stats = self.scope.stats();
        info!(
            event = "optimize_end",
            success = self.converged,
            reason = ?stop_reason,
            iterations = self.iterations_used,
            violations = last.total(),
            moves = stats.moves_accepted,
            rollbacks = stats.rollbacks,
            duration_ms = stats.elapsed().as_millis() as u64,
        );

        Ok(OptimizationResult {
            success: self.converged,
            iterations_used: self.iterations_used,
            total_violations: last.total(),
            general_violations: last.general.len(),
            weekend_violations: last.weekend.len(),
            stop_reason,
            schedule: self.scope.state().clone(),
        })
    }

    /// Runs the redistribution passes of one iteration and returns the
    /// number of empty slots that could not be filled.
    fn run_passes(
        &mut self,
        iteration: u32,
        report: &ViolationReport,
        weekend_only: bool,
    ) -> Result<usize> {
        let scope = &mut self.scope;
        let general = report.general.len();
        let weekend = report.weekend.len();
        let total = report.total();
        let stagnation = self.stagnation;

        if weekend_only {
            weekend_redistribution(scope)?;
            weekend_redistribution(scope)?;
            weekend_swaps(scope)?;
            if weekend >= 4 && stagnation >= 2 {
                weekend_swaps(scope)?;
                weekend_redistribution(scope)?;
            }
        } else {
            if weekend > 0 {
                weekend_redistribution(scope)?;
            }
            if general > 0 {
                general_redistribution(scope)?;
            }
        }

        let balance = scope.classifier().validate_schedule(scope.state())?;
        if !balance.is_balanced() {
            warn!(
                event = "critical_violations",
                iteration,
                critical = balance.critical.len(),
                max_deviation = balance.max_deviation,
            );
        }

        let fill = greedy_fill(scope)?;

        if iteration > 1 && (total > 8 || stagnation > 0) {
            let intensity = (0.3 + 0.2 * f64::from(stagnation)).min(1.0);
            let volume = (1.0 + total as f64 / 10.0).min(2.0);
            let perturbation = (intensity * 0.8 * volume * (1.0 + f64::from(stagnation) * 0.3))
                .min(self.config.strategy.perturbation_cap);
            perturb(scope, perturbation)?;
        }

        if stagnation >= 2 && total > 8 {
            forced_pass(scope)?;
        }

        let strategy = &self.config.strategy;
        let stalled_turn = stagnation > 0
            && strategy.relaxed_every_stalled > 0
            && stagnation % strategy.relaxed_every_stalled == 0;
        let periodic_turn = strategy.relaxed_every > 0 && iteration % strategy.relaxed_every == 0;
        if stalled_turn || periodic_turn {
            relaxed_pass(scope)?;
        }

        Ok(fill.failed)
    }

    /// Summary of the last run.
    pub fn optimization_summary(&self) -> OptimizationSummary {
        let improvement = self.initial_violations as i64 - self.final_violations as i64;
        let average_improvement_rate = if self.iterations_used > 0 {
            (improvement as f64 / f64::from(self.iterations_used)).max(0.0)
        } else {
            0.0
        };
        OptimizationSummary {
            total_iterations: self.iterations_used,
            initial_violations: self.initial_violations,
            final_violations: self.final_violations,
            best_violations: self.best_violations,
            improvement,
            convergence_achieved: self.converged,
            stagnation_counter: self.stagnation,
            average_improvement_rate,
            history: self.history.clone(),
        }
    }
}

/// Rebalances `state` with `oracle` under `config`.
///
/// # Example
///
/// ```
/// use rosterforge_config::RebalanceConfig;
/// use rosterforge_solver::oracle::RuleOracle;
/// use rosterforge_solver::rebalance::optimize;
/// use rosterforge_test::imbalanced_pair_scenario;
///
/// let config = RebalanceConfig::new().with_random_seed(1).with_max_iterations(10);
/// let result = optimize(imbalanced_pair_scenario(), RuleOracle::permissive(), config).unwrap();
///
/// assert!(result.success);
/// assert_eq!(result.total_violations, 0);
/// ```
pub fn optimize<O: ScheduleOracle>(
    state: ScheduleState,
    oracle: O,
    config: RebalanceConfig,
) -> Result<OptimizationResult> {
    RebalancingLoop::new(state, oracle, config).run()
}

#[cfg(test)]
#[path = "rebalance_tests.rs"]
mod tests;
