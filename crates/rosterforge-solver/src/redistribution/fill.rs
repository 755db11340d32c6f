//! Empty-slot fill and random perturbation.

use rand::Rng;
use tracing::{debug, trace};

use rosterforge_core::{DayIndex, PostIndex, Result, WorkerId};

use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;
use crate::strategy::StrategyKind;

/// Result of a greedy fill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillOutcome {
    pub filled: usize,
    /// Empty slots no eligible worker could take.
    pub failed: usize,
}

/// Assigns every empty slot to the most under-assigned worker that can
/// take it at relaxation 0 without leaving their objective bound.
pub fn greedy_fill<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<FillOutcome> {
    let mut outcome = FillOutcome::default();
    for slot in scope.state().empty_slots() {
        match best_filler(scope, slot.day, slot.post)? {
            Some(worker) => match scope.place(worker, slot.day, slot.post) {
                Ok(()) => {
                    scope
                        .stats_mut()
                        .record_attempt(StrategyKind::EmptySlotFill, true);
                    debug!(
                        event = "strategy_applied",
                        strategy = "empty_slot_fill",
                        to = %worker,
                        day = slot.day,
                        post = slot.post,
                    );
                    outcome.filled += 1;
                }
                Err(err) => {
                    debug!(event = "attempt_failed", strategy = "empty_slot_fill", error = %err);
                    outcome.failed += 1;
                }
            },
            None => {
                trace!(event = "fill_impossible", day = slot.day, post = slot.post);
                outcome.failed += 1;
            }
        }
    }
    if outcome.filled + outcome.failed > 0 {
        debug!(
            event = "redistribution",
            pass = "greedy_fill",
            filled = outcome.filled,
            failed = outcome.failed,
        );
    }
    Ok(outcome)
}

fn best_filler<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    day: DayIndex,
    post: PostIndex,
) -> Result<Option<WorkerId>> {
    let mut best: Option<(WorkerId, i64, f64)> = None;
    for &worker in scope.worker_order() {
        if scope.state().is_assigned(worker, day) {
            continue;
        }
        let c = scope.classifier().classify(scope.state(), worker)?;
        if c.assigned + 1 > c.max {
            continue;
        }
        let score = scope.can_assign(worker, day, post, Relaxation::Strict);
        if is_forbidden(score) {
            continue;
        }
        let deficit = -c.deviation;
        let better = best.map_or(true, |(_, d, s)| deficit > d || (deficit == d && score > s));
        if better {
            best = Some((worker, deficit, score));
        }
    }
    Ok(best.map(|(w, _, _)| w))
}

/// Randomly hands shifts between workers to escape local optima.
///
/// Makes `assigned_slots * intensity` attempts. A hand-over is kept only
/// when it is legal at relaxation 0, keeps both workers inside their
/// objective bounds and does not push the recipient over its weekend
/// limit or the donor under its weekend minimum.
pub fn perturb<O: ScheduleOracle>(scope: &mut RebalanceScope<O>, intensity: f64) -> Result<usize> {
    let days = scope.state().num_days();
    let posts = scope.state().posts_per_day();
    let workers = scope.worker_order().len();
    if days == 0 || posts == 0 || workers < 2 {
        return Ok(0);
    }
    let assigned = scope.state().grid().total_slots() - scope.state().count_empty();
    let attempts = (assigned as f64 * intensity.clamp(0.0, 1.0)) as usize;

    let classifier = scope.classifier().clone();
    let mut moves = 0;
    for _ in 0..attempts {
        let day = scope.rng().random_range(0..days);
        let post = scope.rng().random_range(0..posts);
        let pick = scope.rng().random_range(0..workers);
        let to = scope.worker_order()[pick];

        let Some(from) = scope.state().occupant(day, post)? else {
            continue;
        };
        if from == to
            || scope.state().is_assigned(to, day)
            || !scope.can_modify(from, day, "perturbation")
            || is_forbidden(scope.can_assign(to, day, post, Relaxation::Strict))
            || !classifier.transfer_within_objective(scope.state(), from, to)?
        {
            continue;
        }
        if scope.state().calendar().is_weekend_like(day) {
            let donor = classifier.classify_weekend(scope.state(), from)?;
            if donor.assigned <= donor.min
                || !classifier.within_weekend_limit(scope.state(), to, day)?
            {
                continue;
            }
        }

        match scope.transfer(day, post, to) {
            Ok(_) => {
                scope
                    .stats_mut()
                    .record_attempt(StrategyKind::Perturbation, true);
                trace!(
                    event = "strategy_applied",
                    strategy = "perturbation",
                    from = %from,
                    to = %to,
                    day,
                );
                moves += 1;
            }
            Err(err) => {
                debug!(event = "attempt_failed", strategy = "perturbation", error = %err);
            }
        }
    }
    debug!(event = "redistribution", pass = "perturbation", attempts, moves);
    Ok(moves)
}
