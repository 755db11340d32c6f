//! General redistribution: move shifts from workers above their objective
//! bound to workers below it.

use std::cmp::Ordering;

use tracing::{debug, warn};

use rosterforge_core::{Result, WorkerId};

use super::shift_counts;
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;
use crate::strategy::rebalance_pair;
use crate::tolerance::WorkerClassification;

/// Upper bound on moves for a whole pass.
const MAX_PASS_MOVES: usize = 100;

/// Removable-shift cap of an overloaded worker, scaled by severity.
fn removal_cap(worker: &WorkerClassification) -> usize {
    let pct = worker.deviation_pct.abs();
    if pct > 20.0 {
        15
    } else if pct > 15.0 {
        12
    } else if pct > 10.0 {
        10
    } else {
        (worker.deviation.unsigned_abs() as usize).min(8)
    }
}

/// Priority of an underloaded worker; severe shortages count 1.5 times.
fn need_priority(worker: &WorkerClassification) -> f64 {
    let magnitude = worker.deviation_pct.abs();
    if worker.deviation_pct < -15.0 {
        magnitude * 1.5
    } else {
        magnitude
    }
}

fn by_priority_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Moves shifts from over-assigned to under-assigned workers.
///
/// Each overloaded worker gives shifts, one [`rebalance_pair`] at a time,
/// until it is back inside its objective bound, its removal cap is reached
/// or no underloaded worker can take anything more.
pub fn general_redistribution<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let classifier = scope.classifier().clone();
    let violations = classifier.violations(scope.state())?.general;
    if violations.is_empty() {
        return Ok(0);
    }

    let mut excess: Vec<WorkerClassification> =
        violations.iter().filter(|c| c.is_over()).cloned().collect();
    excess.sort_by_key(|c| std::cmp::Reverse(c.deviation.unsigned_abs()));
    let max_moves = MAX_PASS_MOVES.min(violations.len() * 5);

    let before = shift_counts(scope.state());
    let mut moves = 0;
    for over in &excess {
        let cap = removal_cap(over);
        let mut removed = 0;
        while removed < cap && moves < max_moves {
            if !classifier.classify(scope.state(), over.worker)?.is_over() {
                break;
            }
            let needs = need_workers(scope, over.worker)?;
            if needs.is_empty() {
                break;
            }
            let mut moved = false;
            for under in needs {
                if rebalance_pair(scope, over.worker, under)?.is_some() {
                    moved = true;
                    break;
                }
            }
            if !moved {
                break;
            }
            removed += 1;
            moves += 1;
        }
    }

    check_conservation(scope, &before, &excess);
    debug!(
        event = "redistribution",
        pass = "general",
        violations = violations.len(),
        moves,
    );
    Ok(moves)
}

/// Workers below their objective minimum, highest priority first.
fn need_workers<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    exclude: WorkerId,
) -> Result<Vec<WorkerId>> {
    let mut needs = Vec::new();
    for &worker in scope.worker_order() {
        if worker == exclude {
            continue;
        }
        let c = scope.classifier().classify(scope.state(), worker)?;
        if c.is_under() {
            needs.push((worker, need_priority(&c)));
        }
    }
    needs.sort_by(|a, b| by_priority_desc(a.1, b.1));
    Ok(needs.into_iter().map(|(w, _)| w).collect())
}

/// Shifts removed from the overloaded workers must have landed somewhere.
fn check_conservation<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    before: &[(WorkerId, u32)],
    excess: &[WorkerClassification],
) {
    let state = scope.state();
    let mut removed = 0i64;
    let mut added = 0i64;
    for &(worker, count) in before {
        let delta = i64::from(state.non_mandatory_count(worker)) - i64::from(count);
        if excess.iter().any(|c| c.worker == worker) {
            removed -= delta;
        } else {
            added += delta;
        }
    }
    if removed != added {
        warn!(
            event = "redistribution_mismatch",
            removed,
            added,
        );
    }
}
