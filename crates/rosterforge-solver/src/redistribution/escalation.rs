//! Escalation passes for stalled runs: forced redistribution and the
//! periodic relaxed swap.

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use rosterforge_core::{DayIndex, Result, WorkerId};

use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;
use crate::strategy::{forced_redistribution, isolate, relaxed_swap, StrategyKind};

/// Shifts taken from one overloaded worker per forced pass.
const SHIFTS_PER_OVERLOADED: usize = 5;

/// Forces progress on every worker outside the objective band.
///
/// Overloaded workers give up to five random shifts each to the
/// most-deficient worker that can take them at relaxation 1; underloaded
/// workers go through [`forced_redistribution`]. No net-improvement check
/// is made.
pub fn forced_pass<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let classifier = scope.classifier().clone();
    let general = classifier.violations(scope.state())?.general.len();
    let max_moves = if general > 20 { general * 15 } else { general * 10 };

    let mut over = Vec::new();
    let mut under = Vec::new();
    for &worker in scope.worker_order() {
        let c = classifier.classify(scope.state(), worker)?;
        if c.deviation_pct > classifier.objective_pct() {
            over.push(worker);
        } else if c.deviation_pct < -classifier.objective_pct() {
            under.push(worker);
        }
    }
    if over.is_empty() && under.is_empty() {
        return Ok(0);
    }
    warn!(
        event = "forced_redistribution",
        over = over.len(),
        under = under.len(),
    );

    let mut moves = 0;
    for worker in over {
        let mut days = scope.state().movable_days(worker);
        days.shuffle(scope.rng());
        let mut given = 0;
        for day in days {
            if given >= SHIFTS_PER_OVERLOADED || moves >= max_moves {
                break;
            }
            if give_away(scope, worker, day)? {
                given += 1;
                moves += 1;
            }
        }
    }

    for worker in under {
        if moves >= max_moves {
            break;
        }
        let committed = isolate(
            StrategyKind::ForcedRedistribution,
            forced_redistribution(scope, worker),
        )?;
        scope
            .stats_mut()
            .record_attempt(StrategyKind::ForcedRedistribution, committed);
        if committed {
            moves += 1;
        }
    }

    debug!(event = "redistribution", pass = "forced", moves);
    Ok(moves)
}

/// Hands `(worker, day)` to the deficient worker with the largest deficit.
fn give_away<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    worker: WorkerId,
    day: DayIndex,
) -> Result<bool> {
    if !scope.can_modify(worker, day, "forced") {
        return Ok(false);
    }
    let Some(post) = scope.state().post_of(worker, day) else {
        return Ok(false);
    };

    let mut best: Option<(WorkerId, i64)> = None;
    for &candidate in scope.worker_order() {
        if candidate == worker || scope.state().is_assigned(candidate, day) {
            continue;
        }
        let Some(dev) = scope.deviation(candidate) else {
            continue;
        };
        if dev >= 0 || is_forbidden(scope.can_assign(candidate, day, post, Relaxation::Relaxed)) {
            continue;
        }
        if best.map_or(true, |(_, d)| dev < d) {
            best = Some((candidate, dev));
        }
    }
    let Some((to, _)) = best else {
        return Ok(false);
    };

    let committed = match scope.transfer(day, post, to) {
        Ok(_) => {
            debug!(
                event = "strategy_applied",
                strategy = "forced_redistribution",
                from = %worker,
                to = %to,
                day,
                post,
            );
            true
        }
        Err(err) => {
            debug!(event = "attempt_failed", strategy = "forced_redistribution", error = %err);
            false
        }
    };
    scope
        .stats_mut()
        .record_attempt(StrategyKind::ForcedRedistribution, committed);
    Ok(committed)
}

/// Runs a relaxed swap for every over/under recommendation.
pub fn relaxed_pass<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let recommendations = scope
        .classifier()
        .rebalancing_recommendations(scope.state())?;
    let mut moves = 0;
    for rec in recommendations {
        let committed = isolate(
            StrategyKind::RelaxedSwap,
            relaxed_swap(scope, rec.from, rec.to),
        )?;
        scope
            .stats_mut()
            .record_attempt(StrategyKind::RelaxedSwap, committed);
        if committed {
            moves += 1;
        }
    }
    debug!(event = "redistribution", pass = "relaxed", moves);
    Ok(moves)
}
