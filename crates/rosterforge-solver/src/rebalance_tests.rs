//! Tests for the rebalancing loop

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rosterforge_config::{RebalanceConfig, TerminationConfig};
use rosterforge_core::{ScheduleState, WorkerProfile};
use rosterforge_test::{balanced_scenario, imbalanced_pair_scenario, ScheduleBuilder, A, B};

use super::*;
use crate::oracle::RuleOracle;
use crate::strategy::StrategyKind;

fn config() -> RebalanceConfig {
    RebalanceConfig::new()
        .with_random_seed(42)
        .with_max_iterations(10)
}

/// Four weekdays, one post, all held by `A`. `B` is incompatible with `A`
/// and has no shifts, so no move is ever legal.
fn deadlocked_pair() -> ScheduleState {
    ScheduleBuilder::new(4, 1)
        .workers([
            WorkerProfile::new(A, 1).with_incompatible([B]),
            WorkerProfile::new(B, 3),
        ])
        .assign(A, 0, 0)
        .assign(A, 1, 0)
        .assign(A, 2, 0)
        .assign(A, 3, 0)
        .build()
}

/// Two weeks, one post. General counts are on target, but `A` holds every
/// weekend-like day.
fn weekend_heavy_pair() -> ScheduleState {
    let mut builder = ScheduleBuilder::new(14, 1).workers([
        WorkerProfile::new(A, 7),
        WorkerProfile::new(B, 7),
    ]);
    for day in [0, 4, 5, 6, 11, 12, 13] {
        builder = builder.assign(A, day, 0);
    }
    for day in [1, 2, 3, 7, 8, 9, 10] {
        builder = builder.assign(B, day, 0);
    }
    builder.build()
}

#[test]
fn test_balanced_schedule_is_left_alone() {
    let state = balanced_scenario();
    let generation = state.generation();
    let mut rebalancer = RebalancingLoop::new(state, RuleOracle::permissive(), config());

    let result = rebalancer.run().unwrap();
    assert!(result.success);
    assert_eq!(result.iterations_used, 1);
    assert_eq!(result.stop_reason, StopReason::Converged);
    assert_eq!(result.total_violations, 0);
    assert_eq!(result.schedule.generation(), generation);
    assert_eq!(rebalancer.statistics().moves_accepted, 0);
}

#[test]
fn test_direct_convergence() {
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config());
    let result = rebalancer.run().unwrap();

    assert!(result.success);
    assert!(result.iterations_used <= 3);
    let converged_at = rebalancer
        .history()
        .iter()
        .find(|record| record.general == 0)
        .map(|record| record.iteration)
        .unwrap();
    assert!(converged_at <= 3);
    assert!(rebalancer.statistics().commits(StrategyKind::DirectSwap) >= 1);

    let schedule = &result.schedule;
    assert!(schedule.deviation(A).unwrap().abs() <= 1);
    assert!(schedule.deviation(B).unwrap().abs() <= 1);
    assert!(schedule.verify_consistency().is_ok());
}

#[test]
fn test_summary_after_convergence() {
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config());
    rebalancer.run().unwrap();

    let summary = rebalancer.optimization_summary();
    assert_eq!(summary.initial_violations, 2);
    assert_eq!(summary.final_violations, 0);
    assert_eq!(summary.best_violations, 0);
    assert_eq!(summary.improvement, 2);
    assert!(summary.convergence_achieved);
    assert!(summary.average_improvement_rate > 0.0);
    assert!(summary.history.iter().any(|record| record.improvement_made));
}

#[test]
fn test_locked_assignments_survive() {
    let mut state = imbalanced_pair_scenario();
    state.lock(A, 0).unwrap();
    state.lock(B, 15).unwrap();

    let mut rebalancer = RebalancingLoop::new(state, RuleOracle::permissive(), config());
    let result = rebalancer.run().unwrap();

    assert!(result.schedule.is_assigned(A, 0));
    assert!(result.schedule.is_assigned(B, 15));
    assert!(result.schedule.is_locked(A, 0));
    assert!(result.schedule.verify_consistency().is_ok());
    assert!(result.total_violations <= 2);
}

#[test]
fn test_external_flag_stops_before_first_iteration() {
    let state = imbalanced_pair_scenario();
    let generation = state.generation();
    let flag = Arc::new(AtomicBool::new(true));
    let mut rebalancer = RebalancingLoop::new(state, RuleOracle::permissive(), config())
        .with_terminate_flag(flag);

    let result = rebalancer.run().unwrap();
    assert!(!result.success);
    assert_eq!(result.stop_reason, StopReason::Terminated);
    assert_eq!(result.iterations_used, 0);
    assert_eq!(result.total_violations, 2);
    assert_eq!(result.schedule.generation(), generation);
}

#[test]
fn test_iteration_limit_from_config() {
    let mut config = config();
    config.termination = Some(TerminationConfig {
        iteration_limit: Some(1),
        ..TerminationConfig::default()
    });
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config);
    let result = rebalancer.run().unwrap();

    assert_eq!(result.stop_reason, StopReason::Terminated);
    assert_eq!(result.iterations_used, 1);
    assert_eq!(rebalancer.statistics().iterations, 1);
    assert_eq!(result.total_violations, 0);
}

#[test]
fn test_checkpoints_bracket_the_run() {
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config());
    rebalancer.run().unwrap();

    let stats = rebalancer.backtrack_statistics();
    assert!(stats.total_checkpoints >= 2);
    assert_eq!(stats.total_rollbacks, 0);
}

#[test]
fn test_optimize_entry_point() {
    let result = optimize(imbalanced_pair_scenario(), RuleOracle::permissive(), config()).unwrap();
    assert!(result.success);
    assert_eq!(result.general_violations, 0);
    assert_eq!(result.weekend_violations, 0);
}

#[test]
fn test_strict_balance_after_run() {
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config());
    assert!(rebalancer.run().unwrap().success);

    let (balanced, stats) = rebalancer.optimize_balance(200, 0).unwrap();
    assert!(balanced);
    assert_eq!(stats.max_deviation_after, 0);
    assert_eq!(rebalancer.state().deviation(A).unwrap(), 0);
    assert_eq!(rebalancer.state().deviation(B).unwrap(), 0);
}

#[test]
fn test_stalls_when_nothing_can_move() {
    let state = deadlocked_pair();
    let generation = state.generation();
    let mut rebalancer = RebalancingLoop::new(state, RuleOracle::permissive(), config());
    let result = rebalancer.run().unwrap();

    assert!(!result.success);
    assert_eq!(result.stop_reason, StopReason::Stalled);
    assert_eq!(result.iterations_used, 2);
    assert_eq!(result.total_violations, 2);
    assert_eq!(result.schedule.generation(), generation);
    assert_eq!(rebalancer.history().len(), 2);
    assert!(rebalancer.history().iter().all(|record| !record.improvement_made));
}

#[test]
fn test_weekend_only_mode_for_weekend_violations() {
    let mut rebalancer =
        RebalancingLoop::new(weekend_heavy_pair(), RuleOracle::permissive(), config());
    let result = rebalancer.run().unwrap();

    let first = &rebalancer.history()[0];
    assert!(first.weekend_only_mode);
    assert_eq!(rebalancer.optimization_summary().initial_violations, 2);
    let stats = rebalancer.statistics();
    let weekend_moves =
        stats.commits(StrategyKind::WeekendTransfer) + stats.commits(StrategyKind::WeekendSwap);
    assert!(weekend_moves >= 1);
    assert!(result.total_violations <= 2);
    assert!(result.schedule.verify_consistency().is_ok());
}

#[test]
fn test_weekend_only_mode_off_for_general_violations() {
    let mut rebalancer =
        RebalancingLoop::new(imbalanced_pair_scenario(), RuleOracle::permissive(), config());
    rebalancer.run().unwrap();

    assert!(rebalancer.history().iter().all(|record| !record.weekend_only_mode));
}
