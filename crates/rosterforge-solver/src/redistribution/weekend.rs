//! Weekend passes: redistribution of Saturday/Sunday shifts and
//! weekend-for-weekday swaps.

use std::cmp::Ordering;

use tracing::{debug, trace};

use rosterforge_core::{DayIndex, PostIndex, Result, WorkerId};

use super::movable_sat_sun;
use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;
use crate::strategy::{settle, StrategyKind};
use crate::tolerance::WorkerClassification;

const SATURDAY: usize = 5;

fn pass_budget(violations: usize) -> usize {
    if violations > 6 {
        35.min(violations * 4)
    } else {
        25.min(violations * 3)
    }
}

/// Per-worker cap on handed-over weekend shifts.
fn worker_cap(worker: &WorkerClassification) -> usize {
    let cap = if worker.deviation_pct > 25.0 {
        4
    } else if worker.deviation_pct > 20.0 {
        3
    } else {
        2
    };
    cap.min(worker.deviation.unsigned_abs() as usize)
}

#[derive(Debug, Clone, Copy)]
struct Handover {
    day: DayIndex,
    post: PostIndex,
    to: WorkerId,
    priority: f64,
    score: f64,
}

/// Hands Saturday/Sunday shifts of weekend-overloaded workers to
/// weekend-underloaded ones.
///
/// A recipient's priority is its weekend shortage in percent, doubled for
/// shortages beyond 25% and raised by a tenth on Saturdays. The move must
/// pass the transfer-validity check, or keep both workers inside the
/// emergency band.
pub fn weekend_redistribution<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let classifier = scope.classifier().clone();
    let violations = classifier.violations(scope.state())?.weekend;
    if violations.is_empty() {
        return Ok(0);
    }
    let max_moves = pass_budget(violations.len());

    let mut excess: Vec<WorkerClassification> =
        violations.iter().filter(|c| c.is_over()).cloned().collect();
    excess.sort_by(|a, b| {
        b.deviation_pct
            .partial_cmp(&a.deviation_pct)
            .unwrap_or(Ordering::Equal)
    });

    let mut moves = 0;
    for over in &excess {
        let cap = worker_cap(over);
        let mut given = 0;
        while given < cap && moves < max_moves {
            let Some(handover) = best_handover(scope, over.worker)? else {
                break;
            };
            match scope.transfer(handover.day, handover.post, handover.to) {
                Ok(_) => {
                    scope
                        .stats_mut()
                        .record_attempt(StrategyKind::WeekendTransfer, true);
                    debug!(
                        event = "strategy_applied",
                        strategy = "weekend_transfer",
                        from = %over.worker,
                        to = %handover.to,
                        day = handover.day,
                        post = handover.post,
                    );
                    given += 1;
                    moves += 1;
                }
                Err(err) => {
                    scope
                        .stats_mut()
                        .record_attempt(StrategyKind::WeekendTransfer, false);
                    debug!(event = "attempt_failed", strategy = "weekend_transfer", error = %err);
                    break;
                }
            }
        }
    }

    debug!(
        event = "redistribution",
        pass = "weekend",
        violations = violations.len(),
        moves,
    );
    Ok(moves)
}

/// Weekend-short workers eligible to receive, with their priority.
fn weekend_recipients<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    exclude: WorkerId,
) -> Result<Vec<(WorkerId, f64)>> {
    let mut recipients = Vec::new();
    for &worker in scope.worker_order() {
        if worker == exclude {
            continue;
        }
        let c = scope.classifier().classify_weekend(scope.state(), worker)?;
        if c.is_under() {
            let mut priority = c.deviation_pct.abs();
            if c.deviation_pct < -25.0 {
                priority *= 2.0;
            }
            recipients.push((worker, priority));
        }
    }
    Ok(recipients)
}

fn best_handover<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    over: WorkerId,
) -> Result<Option<Handover>> {
    let recipients = weekend_recipients(scope, over)?;
    if recipients.is_empty() {
        return Ok(None);
    }
    let state = scope.state();
    let classifier = scope.classifier();

    let mut best: Option<Handover> = None;
    for day in movable_sat_sun(state, over) {
        if !scope.can_modify(over, day, "weekend_redistribution") {
            continue;
        }
        let Some(post) = state.post_of(over, day) else {
            continue;
        };
        let saturday = state.calendar().weekday(day) == SATURDAY;
        for &(to, base) in &recipients {
            if state.is_assigned(to, day) {
                continue;
            }
            let score = scope.can_assign(to, day, post, Relaxation::Strict);
            if is_forbidden(score) {
                continue;
            }
            let acceptable = classifier.check_transfer_validity(state, over, to).is_ok()
                || classifier.stays_within_emergency(state, over, to)?;
            if !acceptable {
                trace!(event = "transfer_rejected", over = %over, under = %to, day);
                continue;
            }
            let priority = if saturday { base * 1.1 } else { base };
            let better = best.map_or(true, |b| {
                priority > b.priority || (priority == b.priority && score > b.score)
            });
            if better {
                best = Some(Handover {
                    day,
                    post,
                    to,
                    priority,
                    score,
                });
            }
        }
    }
    Ok(best)
}

/// Exchanges a Saturday/Sunday shift of a weekend-overloaded worker with a
/// weekday shift of a weekend-underloaded one.
///
/// Both general counts stay unchanged; the swap is kept only when both
/// weekend deviations shrink.
pub fn weekend_swaps<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let classifier = scope.classifier().clone();
    let violations = classifier.violations(scope.state())?.weekend;
    let over: Vec<WorkerId> = violations
        .iter()
        .filter(|c| c.is_over())
        .map(|c| c.worker)
        .collect();
    let under: Vec<WorkerId> = violations
        .iter()
        .filter(|c| c.is_under())
        .map(|c| c.worker)
        .collect();
    if over.is_empty() || under.is_empty() {
        return Ok(0);
    }
    let max_swaps = 20.min(violations.len() * 2);

    let mut swaps = 0;
    'pairs: for &heavy in &over {
        for &light in &under {
            if swaps >= max_swaps {
                break 'pairs;
            }
            let committed = swap_once(scope, heavy, light)?;
            scope
                .stats_mut()
                .record_attempt(StrategyKind::WeekendSwap, committed);
            if committed {
                swaps += 1;
            }
        }
    }

    debug!(event = "redistribution", pass = "weekend_swaps", swaps);
    Ok(swaps)
}

fn swap_once<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    heavy: WorkerId,
    light: WorkerId,
) -> Result<bool> {
    let classifier = scope.classifier().clone();
    let heavy_before = classifier.classify_weekend(scope.state(), heavy)?.deviation;
    let light_before = classifier.classify_weekend(scope.state(), light)?.deviation;

    let weekend_days = movable_sat_sun(scope.state(), heavy);
    let mut weekdays: Vec<DayIndex> = scope
        .state()
        .movable_days(light)
        .into_iter()
        .filter(|&d| !scope.state().calendar().is_weekend_like(d))
        .collect();
    weekdays.reverse();

    for &weekend_day in &weekend_days {
        let Some(weekend_post) = placement(scope, heavy, light, weekend_day) else {
            continue;
        };
        for &weekday in &weekdays {
            if weekday == weekend_day {
                continue;
            }
            let Some(weekday_post) = placement(scope, light, heavy, weekday) else {
                continue;
            };

            let snapshot = scope.snapshot();
            let applied = scope
                .transfer(weekend_day, weekend_post, light)
                .and_then(|_| scope.transfer(weekday, weekday_post, heavy));
            if let Err(err) = applied {
                debug!(event = "attempt_failed", strategy = "weekend_swap", error = %err);
                scope.restore(&snapshot)?;
                continue;
            }

            let heavy_after = classifier.classify_weekend(scope.state(), heavy)?.deviation;
            let light_after = classifier.classify_weekend(scope.state(), light)?.deviation;
            let accept = heavy_after.abs() < heavy_before.abs()
                && light_after.abs() < light_before.abs();
            if settle(scope, &snapshot, accept)? {
                debug!(
                    event = "strategy_applied",
                    strategy = "weekend_swap",
                    from = %heavy,
                    to = %light,
                    weekend_day,
                    weekday,
                );
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Post of `holder` on `day` if `taker` may take it over at relaxation 1.
fn placement<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    holder: WorkerId,
    taker: WorkerId,
    day: DayIndex,
) -> Option<PostIndex> {
    if scope.state().is_assigned(taker, day) || !scope.can_modify(holder, day, "weekend_swap") {
        return None;
    }
    let post = scope.state().post_of(holder, day)?;
    if is_forbidden(scope.can_assign(taker, day, post, Relaxation::Relaxed)) {
        return None;
    }
    Some(post)
}
