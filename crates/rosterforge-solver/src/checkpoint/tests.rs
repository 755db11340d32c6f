//! Tests for checkpoints, dead-end detection and recovery

use rosterforge_config::{CheckpointConfig, DeadEndConfig, RebalanceConfig};
use rosterforge_core::{RosterError, ScheduleState};
use rosterforge_test::{balanced_scenario, imbalanced_pair_scenario, A, B};

use super::*;
use crate::metrics::QualityReport;
use crate::oracle::RuleOracle;
use crate::scope::RebalanceScope;
use crate::tolerance::ToleranceClassifier;

fn scope_for(state: ScheduleState) -> RebalanceScope<RuleOracle> {
    RebalanceScope::new(state, RuleOracle::permissive(), ToleranceClassifier::default())
        .with_seed(5)
}

fn quality(overall: f64) -> QualityReport {
    QualityReport {
        overall,
        ..QualityReport::default()
    }
}

/// Three checkpoints of the same state at iterations 1 to 3.
fn three_checkpoints(backtracker: &mut Backtracker, scope: &mut RebalanceScope<RuleOracle>) {
    for iteration in 1..=3 {
        scope.set_iteration(iteration);
        backtracker.create_checkpoint(scope, CheckpointPhase::Improvement, "periodic", 0);
    }
}

#[test]
fn test_checkpoint_ids() {
    let scope = scope_for(balanced_scenario());
    let mut store = CheckpointStore::new(CheckpointConfig::default());
    let first = store.create(&scope, CheckpointPhase::Mandatory, "initial", 0);
    let second = store.create(&scope, CheckpointPhase::Improvement, "periodic", 0);

    assert_eq!(first, "cp_mandatory_0_1");
    assert_eq!(second, "cp_improvement_0_2");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&first).unwrap().reason, "initial");
}

#[test]
fn test_capacity_keeps_first_and_latest() {
    let mut scope = scope_for(balanced_scenario());
    let mut store = CheckpointStore::new(CheckpointConfig {
        capacity: 3,
        ..CheckpointConfig::default()
    });
    for iteration in 0..5 {
        scope.set_iteration(iteration);
        store.create(&scope, CheckpointPhase::Improvement, "periodic", 0);
    }

    let ids: Vec<&str> = store.checkpoints().iter().map(|cp| cp.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["cp_improvement_0_1", "cp_improvement_3_4", "cp_improvement_4_5"]
    );
}

#[test]
fn test_should_create_checkpoint() {
    let scope = scope_for(balanced_scenario());
    let mut store = CheckpointStore::new(CheckpointConfig::default());

    assert!(store.should_create_checkpoint(3, CheckpointPhase::Mandatory, 0.0));
    assert!(store.should_create_checkpoint(3, CheckpointPhase::Finalization, 0.0));
    assert!(store.should_create_checkpoint(10, CheckpointPhase::Improvement, 0.0));
    assert!(!store.should_create_checkpoint(3, CheckpointPhase::Improvement, 50.0));

    store.create(&scope, CheckpointPhase::Mandatory, "initial", 0);
    let last = store.last().unwrap().score();
    assert!(store.should_create_checkpoint(3, CheckpointPhase::Improvement, last * 1.06));
    assert!(!store.should_create_checkpoint(3, CheckpointPhase::Improvement, last * 1.04));
}

#[test]
fn test_rollback_prefers_recent_without_penalties() {
    let mut scope = scope_for(balanced_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    three_checkpoints(&mut backtracker, &mut scope);

    let best = backtracker.store().find_best_rollback_point().unwrap();
    assert_eq!(best.iteration, 3);
}

#[test]
fn test_consecutive_recoveries_pick_different_checkpoints() {
    let mut scope = scope_for(balanced_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    three_checkpoints(&mut backtracker, &mut scope);

    let mut chosen = Vec::new();
    for _ in 0..3 {
        let id = backtracker
            .store()
            .find_best_rollback_point()
            .unwrap()
            .id
            .clone();
        backtracker.rollback(&mut scope, &id).unwrap();
        chosen.push(id);
    }

    assert_ne!(chosen[0], chosen[1]);
    assert_ne!(chosen[1], chosen[2]);
    assert_ne!(chosen[0], chosen[2]);
    let recent: Vec<&str> = backtracker.store().recent_rollbacks().collect();
    assert_eq!(recent.first().copied(), Some(chosen[2].as_str()));
}

#[test]
fn test_detector_counts_stalls() {
    let mut detector = DeadEndDetector::new(DeadEndConfig::default());
    assert!(!detector.detect_dead_end(&quality(50.0), 0, 0));
    assert!(!detector.detect_dead_end(&quality(60.0), 0, 0));
    assert_eq!(detector.indicators().no_improvement_cycles, 0);

    assert!(!detector.detect_dead_end(&quality(55.0), 0, 0));
    assert!(!detector.detect_dead_end(&quality(60.0), 0, 0));
    assert_eq!(detector.indicators().no_improvement_cycles, 2);
    assert_eq!(detector.indicators().stagnation_iterations, 1);
    assert_eq!(detector.last_score(), 60.0);
}

#[test]
fn test_many_tolerance_violations_trigger_immediately() {
    let mut detector = DeadEndDetector::new(DeadEndConfig::default());
    assert!(!detector.detect_dead_end(&quality(50.0), 11, 0));
    assert!(detector.detect_dead_end(&quality(50.0), 11, 0));
    assert!(detector.indicators().severe_imbalance);
}

#[test]
fn test_impossible_assignments_trigger() {
    let mut detector = DeadEndDetector::new(DeadEndConfig::default());
    assert!(!detector.detect_dead_end(&quality(50.0), 0, 2));
    assert!(detector.detect_dead_end(&quality(51.0), 0, 3));
}

#[test]
fn test_dead_end_recovery() {
    let mut scope = scope_for(balanced_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    let id = backtracker.create_checkpoint(&scope, CheckpointPhase::Mandatory, "initial", 0);

    let report = quality(50.0);
    for _ in 0..16 {
        backtracker.detect_dead_end(&report, 0, 0);
    }
    assert_eq!(backtracker.detector().iterations_without_improvement(), 15);

    let recovered = backtracker.auto_recovery(&mut scope, &report, 6, 0).unwrap();
    assert!(recovered);

    let checkpoint = backtracker.store().get(&id).unwrap();
    assert_eq!(checkpoint.usage_count(), 1);
    assert!(backtracker.store().recent_rollbacks().any(|recent| recent == id));
    assert!(scope.shuffle_candidates());

    let stats = backtracker.statistics();
    assert_eq!(stats.total_rollbacks, 1);
    assert_eq!(stats.total_checkpoints, 1);
    assert_eq!(stats.iterations_without_improvement, 0);
    assert_eq!(stats.indicators, DeadEndIndicators::default());
    assert_eq!(scope.stats().rollbacks, 1);
}

#[test]
fn test_rollback_restores_state() {
    let mut scope = scope_for(imbalanced_pair_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    let id = backtracker.create_checkpoint(&scope, CheckpointPhase::Mandatory, "initial", 2);

    scope.transfer(14, 0, B).unwrap();
    assert_eq!(scope.state().occupant(14, 0).unwrap(), Some(B));

    backtracker.rollback(&mut scope, &id).unwrap();
    assert_eq!(scope.state().occupant(14, 0).unwrap(), Some(A));
    assert!(scope.state().verify_consistency().is_ok());
}

#[test]
fn test_rollback_to_unknown_checkpoint_fails() {
    let mut scope = scope_for(balanced_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    let result = backtracker.rollback(&mut scope, "cp_missing");
    assert!(matches!(result, Err(RosterError::RestoreFailed(_))));
    assert_eq!(backtracker.statistics().total_rollbacks, 0);
}

#[test]
fn test_repeated_use_swaps_posts() {
    let mut scope = scope_for(balanced_scenario());
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    let id = backtracker.create_checkpoint(&scope, CheckpointPhase::Mandatory, "initial", 0);

    backtracker.rollback(&mut scope, &id).unwrap();
    assert_eq!(
        backtracker
            .apply_post_recovery_variation(&mut scope, &id)
            .unwrap(),
        0
    );

    backtracker.rollback(&mut scope, &id).unwrap();
    let counts_before: Vec<u32> = scope
        .state()
        .roster()
        .ids()
        .map(|w| scope.state().assigned_count(w))
        .collect();
    let swaps = backtracker
        .apply_post_recovery_variation(&mut scope, &id)
        .unwrap();

    assert_eq!(swaps, 2);
    let counts_after: Vec<u32> = scope
        .state()
        .roster()
        .ids()
        .map(|w| scope.state().assigned_count(w))
        .collect();
    assert_eq!(counts_before, counts_after);
    assert!(scope.state().verify_consistency().is_ok());
}

#[test]
fn test_failed_restore_leaves_state_untouched() {
    let mut backtracker = Backtracker::new(&RebalanceConfig::default());
    let donor = scope_for(imbalanced_pair_scenario());
    let id = backtracker.create_checkpoint(&donor, CheckpointPhase::Mandatory, "initial", 2);

    // The live schedule has locked B on a day the checkpoint gives to A.
    let mut state = imbalanced_pair_scenario();
    state.reassign(14, 0, B).unwrap();
    state.lock(B, 14).unwrap();
    let mut scope = scope_for(state);
    let generation = scope.state().generation();

    let report = quality(50.0);
    for _ in 0..16 {
        backtracker.detect_dead_end(&report, 0, 0);
    }
    let recovered = backtracker.auto_recovery(&mut scope, &report, 6, 0).unwrap();

    assert!(!recovered);
    assert_eq!(scope.state().generation(), generation);
    assert_eq!(scope.state().occupant(14, 0).unwrap(), Some(B));
    assert!(scope.state().is_locked(B, 14));
    assert_eq!(backtracker.store().get(&id).unwrap().usage_count(), 0);
    assert_eq!(backtracker.statistics().total_rollbacks, 0);
    assert_eq!(scope.stats().rollbacks, 0);
}
