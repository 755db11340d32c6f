//! RosterForge - workload rebalancing for shift schedules
//!
//! Takes a filled schedule and moves assignments between workers until
//! everyone is within their tolerance band, then tightens the result to
//! ±N shifts.
//!
//! # Example
//!
//! ```rust
//! use rosterforge::prelude::*;
//! use rosterforge_test::imbalanced_pair_scenario;
//!
//! let config = RebalanceConfig::new().with_random_seed(7).with_max_iterations(10);
//! let outcome =
//!     rebalance(imbalanced_pair_scenario(), RuleOracle::permissive(), config).unwrap();
//!
//! assert!(outcome.success);
//! assert!(outcome.balanced);
//! assert!(outcome.violations.is_empty());
//! ```

use tracing::info;

// Schedule model
pub use rosterforge_core::{
    Calendar, DayIndex, PostIndex, Result, Roster, RosterError, ScheduleGrid, ScheduleState,
    SlotKey, StateSnapshot, WorkerId, WorkerProfile,
};

// Configuration
pub use rosterforge_config::{
    CheckpointConfig, ConfigError, DeadEndConfig, RebalanceConfig, StrategyConfig,
    StrictBalanceConfig, TerminationConfig, ToleranceConfig,
};

// Engine
pub use rosterforge_solver::{
    is_forbidden, optimize, BalanceStats, IterationBudget, OptimizationResult,
    OptimizationSummary, QualityMetrics, QualityReport, RebalanceStats, RebalancingLoop,
    Relaxation, RuleOracle, ScheduleOracle, StopReason, StrategyKind, ToleranceClassifier,
    ViolationReport,
};

pub use rosterforge_solver as solver;

#[cfg(feature = "console")]
pub mod console;

/// Everything a typical caller needs.
pub mod prelude {
    pub use super::{rebalance, RebalanceOutcome};
    pub use super::{RebalanceConfig, RuleOracle, ScheduleOracle, ScheduleState, WorkerId};
    pub use super::{Relaxation, StopReason};
}

/// Result of [`rebalance`]: the loop's outcome followed by the strict pass.
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    /// The final schedule has no tolerance violations.
    pub success: bool,
    /// The loop itself reached zero violations, before the strict pass.
    pub converged: bool,
    /// The strict pass left every worker within
    /// `strict_balance.target_tolerance` shifts.
    pub balanced: bool,
    pub iterations_used: u32,
    pub stop_reason: StopReason,
    /// Violations of the final schedule.
    pub violations: ViolationReport,
    pub balance: BalanceStats,
    pub summary: OptimizationSummary,
    pub statistics: RebalanceStats,
    pub schedule: ScheduleState,
}

/// Runs the rebalancing loop, then the strict balance pass.
///
/// The strict pass is skipped when `config.strict_balance.max_iterations`
/// is 0 or when the loop was terminated. It shares the loop's termination
/// budget. `success` is judged on the schedule after the strict pass.
pub fn rebalance<O: ScheduleOracle>(
    state: ScheduleState,
    oracle: O,
    config: RebalanceConfig,
) -> Result<RebalanceOutcome> {
    let classifier = ToleranceClassifier::from_config(&config.tolerance);
    let strict = config.strict_balance.clone();
    let mut rebalancer = RebalancingLoop::new(state, oracle, config);

    let result = rebalancer.run()?;
    let strict_allowed =
        strict.max_iterations > 0 && result.stop_reason != StopReason::Terminated;
    let (balanced, balance) = if strict_allowed {
        rebalancer.optimize_balance(strict.max_iterations, strict.target_tolerance)?
    } else {
        (false, BalanceStats::default())
    };

    let summary = rebalancer.optimization_summary();
    let statistics = rebalancer.statistics().clone();
    let schedule = rebalancer.into_state();
    let violations = classifier.violations(&schedule)?;
    let success = violations.is_empty();
    info!(
        event = "rebalance_end",
        success,
        converged = result.success,
        balanced,
        violations = violations.total(),
    );

    Ok(RebalanceOutcome {
        success,
        converged: result.success,
        balanced,
        iterations_used: result.iterations_used,
        stop_reason: result.stop_reason,
        violations,
        balance,
        summary,
        statistics,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterforge_test::{balanced_scenario, imbalanced_pair_scenario, A, B};

    fn config() -> RebalanceConfig {
        RebalanceConfig::new().with_random_seed(5).with_max_iterations(10)
    }

    #[test]
    fn test_rebalance_tightens_to_one_shift() {
        let outcome =
            rebalance(imbalanced_pair_scenario(), RuleOracle::permissive(), config()).unwrap();

        assert!(outcome.success);
        assert!(outcome.converged);
        assert!(outcome.balanced);
        assert!(outcome.violations.is_empty());
        assert!(outcome.schedule.deviation(A).unwrap().abs() <= 1);
        assert!(outcome.schedule.deviation(B).unwrap().abs() <= 1);
        assert_eq!(outcome.summary.initial_violations, 2);
        assert!(outcome.schedule.verify_consistency().is_ok());
    }

    #[test]
    fn test_balanced_input_is_untouched() {
        let state = balanced_scenario();
        let generation = state.generation();
        let outcome = rebalance(state, RuleOracle::permissive(), config()).unwrap();

        assert!(outcome.success);
        assert!(outcome.balanced);
        assert_eq!(outcome.iterations_used, 1);
        assert_eq!(outcome.balance.swaps_performed, 0);
        assert_eq!(outcome.schedule.generation(), generation);
    }

    #[test]
    fn test_strict_pass_can_be_disabled() {
        let mut config = config();
        config.strict_balance.max_iterations = 0;
        let outcome =
            rebalance(imbalanced_pair_scenario(), RuleOracle::permissive(), config).unwrap();

        assert!(outcome.success);
        assert!(!outcome.balanced);
        assert_eq!(outcome.balance, BalanceStats::default());
    }

    #[test]
    fn test_terminated_run_skips_strict_pass() {
        let mut config = config();
        config.termination = Some(TerminationConfig {
            iteration_limit: Some(0),
            ..TerminationConfig::default()
        });
        let state = imbalanced_pair_scenario();
        let generation = state.generation();
        let outcome = rebalance(state, RuleOracle::permissive(), config).unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Terminated);
        assert_eq!(outcome.iterations_used, 0);
        assert!(!outcome.success);
        assert!(!outcome.balanced);
        assert_eq!(outcome.balance, BalanceStats::default());
        assert_eq!(outcome.schedule.generation(), generation);
        assert_eq!(outcome.schedule.deviation(A).unwrap(), 3);
    }
}
