//! Tests for termination conditions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rosterforge_config::RebalanceConfig;
use rosterforge_test::balanced_scenario;

use super::*;
use crate::oracle::RuleOracle;
use crate::tolerance::ToleranceClassifier;

fn create_scope() -> RebalanceScope<RuleOracle> {
    RebalanceScope::new(
        balanced_scenario(),
        RuleOracle::permissive(),
        ToleranceClassifier::default(),
    )
    .with_seed(1)
}

#[test]
fn test_iteration_count_termination() {
    let mut scope = create_scope();
    let term = IterationCountTermination::new(2);

    assert!(!term.is_terminated(&scope));
    scope.stats_mut().record_iteration();
    assert!(!term.is_terminated(&scope));
    scope.stats_mut().record_iteration();
    assert!(term.is_terminated(&scope));
}

#[test]
fn test_time_termination_requires_start() {
    let mut scope = create_scope();
    let term = TimeTermination::millis(0);

    assert!(!term.is_terminated(&scope));
    scope.start();
    assert!(term.is_terminated(&scope));
    assert!(!TimeTermination::seconds(3600).is_terminated(&scope));
}

#[test]
fn test_external_termination() {
    let scope = create_scope();
    let flag = Arc::new(AtomicBool::new(false));
    let term = ExternalTermination::new(flag.clone());

    assert!(!term.is_terminated(&scope));
    flag.store(true, Ordering::SeqCst);
    assert!(term.is_terminated(&scope));
}

#[test]
fn test_or_termination_any_child() {
    let mut scope = create_scope();
    let term = OrTermination((
        IterationCountTermination::new(1),
        TimeTermination::seconds(3600),
    ));

    scope.start();
    assert!(!term.is_terminated(&scope));
    scope.stats_mut().record_iteration();
    assert!(term.is_terminated(&scope));
}

#[test]
fn test_absent_condition_never_terminates() {
    let scope = create_scope();
    let term: Option<IterationCountTermination> = None;
    assert!(!term.is_terminated(&scope));
}

#[test]
fn test_from_config() {
    let mut scope = create_scope();
    let flag = Arc::new(AtomicBool::new(false));
    let mut config = RebalanceConfig::default().with_termination_seconds(3600);
    if let Some(termination) = config.termination.as_mut() {
        termination.iteration_limit = Some(1);
    }
    let term = from_config(&config, Some(flag.clone()));

    scope.start();
    assert!(!term.is_terminated(&scope));
    flag.store(true, Ordering::SeqCst);
    assert!(term.is_terminated(&scope));

    let unbounded = from_config(&RebalanceConfig::default(), None);
    scope.stats_mut().record_iteration();
    assert!(!unbounded.is_terminated(&scope));
}
