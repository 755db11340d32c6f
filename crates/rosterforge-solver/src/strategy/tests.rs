//! Tests for the swap strategies

use rosterforge_core::WorkerProfile;
use rosterforge_test::{
    bridge_scenario, chain_scenario, imbalanced_pair_scenario, ScheduleBuilder, A, B, C, D,
};

use super::*;
use crate::oracle::RuleOracle;
use crate::tolerance::ToleranceClassifier;

fn scope_for(state: rosterforge_core::ScheduleState) -> RebalanceScope<RuleOracle> {
    RebalanceScope::new(state, RuleOracle::permissive(), ToleranceClassifier::default())
        .with_seed(42)
}

fn abs_dev(scope: &RebalanceScope<RuleOracle>, workers: &[WorkerId]) -> i64 {
    workers
        .iter()
        .map(|&w| scope.state().deviation(w).unwrap().abs())
        .sum()
}

#[test]
fn test_direct_swap_moves_latest_free_day() {
    let mut scope = scope_for(imbalanced_pair_scenario());
    let before = abs_dev(&scope, &[A, B]);

    assert!(direct_swap(&mut scope, A, B).unwrap());

    // Day 18 is shared by A and B; day 14 is A's latest weekday
    assert!(scope.state().is_assigned(B, 14));
    assert!(!scope.state().is_assigned(A, 14));
    assert_eq!(abs_dev(&scope, &[A, B]), before - 2);
    assert!(scope.state().verify_consistency().is_ok());
}

#[test]
fn test_direct_swap_requires_opposite_signs() {
    let mut scope = scope_for(imbalanced_pair_scenario());
    let generation = scope.state().generation();
    assert!(!direct_swap(&mut scope, B, A).unwrap());
    assert!(!direct_swap(&mut scope, A, C).unwrap());
    assert_eq!(scope.state().generation(), generation);
}

#[test]
fn test_locked_days_are_never_moved() {
    let mut state = imbalanced_pair_scenario();
    state.lock(A, 14).unwrap();
    let mut scope = scope_for(state);

    assert!(direct_swap(&mut scope, A, B).unwrap());
    assert!(scope.state().is_assigned(A, 14));
    assert!(scope.state().is_assigned(B, 10));
}

#[test]
fn test_bridge_needs_three_way_swap() {
    let mut scope = scope_for(bridge_scenario());
    assert!(!direct_swap(&mut scope, A, B).unwrap());

    let kind = rebalance_pair(&mut scope, A, B).unwrap();
    assert_eq!(kind, Some(StrategyKind::ThreeWaySwap));

    let state = scope.state();
    assert!(state.is_assigned(C, 3));
    assert!(state.is_assigned(B, 5));
    assert_eq!(state.non_mandatory_count(C), 2);
    assert_eq!(state.deviation(A).unwrap(), 1);
    assert_eq!(state.deviation(B).unwrap(), -1);
    assert!(state.verify_consistency().is_ok());
}

#[test]
fn test_rebalance_pair_records_attempts() {
    let mut scope = scope_for(bridge_scenario());
    rebalance_pair(&mut scope, A, B).unwrap();

    let stats = scope.stats();
    assert_eq!(stats.attempts(StrategyKind::DirectSwap), 1);
    assert_eq!(stats.commits(StrategyKind::DirectSwap), 0);
    assert_eq!(stats.attempts(StrategyKind::ThreeWaySwap), 1);
    assert_eq!(stats.commits(StrategyKind::ThreeWaySwap), 1);
    assert_eq!(stats.attempts(StrategyKind::ChainSwap), 0);
    assert_eq!(stats.moves_accepted, 1);
}

#[test]
fn test_three_way_window_excludes_far_over_intermediary() {
    let mut scope = scope_for(chain_scenario());
    assert!(!three_way_swap(&mut scope, A, B).unwrap());
    assert!(!aggressive_three_way_swap(&mut scope, A, B).unwrap());
    assert!(scope.state().is_assigned(A, 3));
}

#[test]
fn test_chain_swap_through_overloaded_worker() {
    let mut scope = scope_for(chain_scenario());

    let kind = rebalance_pair(&mut scope, A, B).unwrap();
    assert_eq!(kind, Some(StrategyKind::ChainSwap));

    let state = scope.state();
    assert!(state.is_assigned(C, 3));
    assert!(state.is_assigned(B, 7));
    assert_eq!(state.non_mandatory_count(C), 4);
    assert_eq!(state.deviation(A).unwrap(), 1);
    assert_eq!(state.deviation(B).unwrap(), -1);
    assert!(state.verify_consistency().is_ok());
}

#[test]
fn test_chain_depth_one_finds_nothing() {
    let mut scope = scope_for(chain_scenario()).with_chain_max_depth(1);
    assert!(!chain_swap(&mut scope, A, B).unwrap());
}

#[test]
fn test_forced_redistribution_fills_empty_slot() {
    let state = ScheduleBuilder::new(4, 1)
        .workers([WorkerProfile::new(A, 2), WorkerProfile::new(B, 1)])
        .assign(A, 0, 0)
        .assign(B, 1, 0)
        .build();
    let mut scope = scope_for(state);

    assert!(forced_redistribution(&mut scope, A).unwrap());
    assert_eq!(scope.state().assigned_count(A), 2);
    assert_eq!(scope.state().count_empty(), 1);
    // B is on target: nothing to force
    assert!(!forced_redistribution(&mut scope, B).unwrap());
}

#[test]
fn test_forced_redistribution_takes_from_slack_donor() {
    let mut builder = ScheduleBuilder::new(12, 1).workers([
        WorkerProfile::new(B, 1),
        WorkerProfile::new(C, 1),
        WorkerProfile::new(D, 10),
    ]);
    for day in 0..11 {
        builder = builder.assign(D, day, 0);
    }
    let mut scope = scope_for(builder.assign(C, 11, 0).build());

    assert!(forced_redistribution(&mut scope, B).unwrap());
    assert!(scope.state().is_assigned(B, 10));
    assert_eq!(scope.state().non_mandatory_count(D), 10);
    assert_eq!(scope.state().non_mandatory_count(C), 1);
}

#[test]
fn test_relaxed_swap() {
    let mut scope = scope_for(imbalanced_pair_scenario());
    assert!(relaxed_swap(&mut scope, A, B).unwrap());
    assert_eq!(scope.state().deviation(A).unwrap(), 2);
    assert_eq!(scope.state().deviation(B).unwrap(), -2);

    // C sits on target; B taking nothing from it would worsen both
    assert!(!relaxed_swap(&mut scope, B, C).unwrap());
}

#[test]
fn test_strategy_names() {
    assert_eq!(StrategyKind::AggressiveThreeWaySwap.name(), "aggressive_three_way_swap");
    assert_eq!(StrategyKind::ChainSwap.to_string(), "chain_swap");
    assert_eq!(ESCALATION[0], StrategyKind::DirectSwap);
}
