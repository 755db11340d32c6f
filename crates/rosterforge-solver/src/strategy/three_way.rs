//! Three-way swaps through an intermediary worker.
//!
//! When `over` cannot hand a shift to `under` directly, an intermediary `C`
//! takes one of `over`'s dates and gives one of its own dates to `under`.
//! `C`'s total is unchanged; the net effect is one shift from `over` to
//! `under`.

use tracing::debug;

use rosterforge_core::{DayIndex, PostIndex, Result, WorkerId};

use super::{donor_days, settle};
use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;

#[derive(Debug, Clone, Copy)]
struct BridgeWindow {
    min_dev: i64,
    max_dev: i64,
    relaxation: Relaxation,
    max_intermediaries: usize,
    aggressive: bool,
}

const STRICT: BridgeWindow = BridgeWindow {
    min_dev: -1,
    max_dev: 2,
    relaxation: Relaxation::Strict,
    max_intermediaries: 10,
    aggressive: false,
};

const AGGRESSIVE: BridgeWindow = BridgeWindow {
    min_dev: -2,
    max_dev: 3,
    relaxation: Relaxation::Relaxed,
    max_intermediaries: usize::MAX,
    aggressive: true,
};

/// Strict three-way swap.
///
/// The intermediary's deviation must lie in `[-1, 2]`; both placements are
/// checked at relaxation 0, and the move is kept only if `over` and `under`
/// both improve while the intermediary moves by at most one.
pub fn three_way_swap<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<bool> {
    bridge(scope, over, under, STRICT)
}

/// Aggressive three-way swap.
///
/// Intermediary window `[-2, 3]`, relaxation 1, every worker considered.
/// Kept when the summed absolute deviation of the three workers shrinks.
pub fn aggressive_three_way_swap<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<bool> {
    bridge(scope, over, under, AGGRESSIVE)
}

fn bridge<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
    window: BridgeWindow,
) -> Result<bool> {
    let over_dev = scope.state().deviation(over)?;
    let under_dev = scope.state().deviation(under)?;
    if over_dev <= 0 || under_dev >= 0 {
        return Ok(false);
    }
    if scope
        .classifier()
        .check_transfer_validity(scope.state(), over, under)
        .is_err()
    {
        return Ok(false);
    }

    let mut intermediaries: Vec<(WorkerId, i64)> = scope
        .worker_order()
        .iter()
        .copied()
        .filter(|&w| w != over && w != under)
        .filter_map(|w| scope.deviation(w).map(|dev| (w, dev)))
        .filter(|&(_, dev)| dev >= window.min_dev && dev <= window.max_dev)
        .collect();
    intermediaries.sort_by_key(|&(_, dev)| dev);
    scope.order_candidates(&mut intermediaries);
    intermediaries.truncate(window.max_intermediaries);

    let over_days = donor_days(scope, over);
    for (bridge_worker, bridge_dev) in intermediaries {
        let bridge_days = donor_days(scope, bridge_worker);
        for &take_day in &over_days {
            let Some(take_post) = placement(scope, over, bridge_worker, take_day, window) else {
                continue;
            };
            for &give_day in &bridge_days {
                if give_day == take_day {
                    continue;
                }
                let Some(give_post) = placement(scope, bridge_worker, under, give_day, window)
                else {
                    continue;
                };
                if !window.aggressive {
                    let classifier = scope.classifier();
                    if !classifier.within_monthly_limit(scope.state(), under, give_day)?
                        || !classifier.within_weekend_limit(scope.state(), under, give_day)?
                    {
                        continue;
                    }
                }

                let snapshot = scope.snapshot();
                let applied = scope
                    .transfer(take_day, take_post, bridge_worker)
                    .and_then(|_| scope.transfer(give_day, give_post, under));
                if let Err(err) = applied {
                    debug!(event = "attempt_failed", strategy = "three_way_swap", error = %err);
                    scope.restore(&snapshot)?;
                    continue;
                }

                let over_after = scope.state().deviation(over)?;
                let under_after = scope.state().deviation(under)?;
                let bridge_after = scope.state().deviation(bridge_worker)?;
                let accept = if window.aggressive {
                    over_after.abs() + under_after.abs() + bridge_after.abs()
                        < over_dev.abs() + under_dev.abs() + bridge_dev.abs()
                } else {
                    over_after.abs() < over_dev.abs()
                        && under_after.abs() < under_dev.abs()
                        && (bridge_after - bridge_dev).abs() <= 1
                };
                if settle(scope, &snapshot, accept)? {
                    debug!(
                        event = "strategy_applied",
                        strategy = if window.aggressive {
                            "aggressive_three_way_swap"
                        } else {
                            "three_way_swap"
                        },
                        from = %over,
                        via = %bridge_worker,
                        to = %under,
                        take_day,
                        give_day,
                    );
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Post of `holder` on `day` if `taker` may take it over.
fn placement<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    holder: WorkerId,
    taker: WorkerId,
    day: DayIndex,
    window: BridgeWindow,
) -> Option<PostIndex> {
    if scope.state().is_assigned(taker, day) || !scope.can_modify(holder, day, "three_way_swap") {
        return None;
    }
    let post = scope.state().post_of(holder, day)?;
    if is_forbidden(scope.can_assign(taker, day, post, window.relaxation)) {
        return None;
    }
    Some(post)
}
