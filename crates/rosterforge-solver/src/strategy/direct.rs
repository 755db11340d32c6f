//! Direct swap: hand one of `over`'s shifts straight to `under`.

use tracing::{debug, trace};

use rosterforge_core::{Result, WorkerId};

use super::{donor_days, settle};
use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;

/// Tries to move one shift from `over` to `under` at relaxation 0.
///
/// The recipient must also respect its monthly and weekend sub-limits, and
/// the move is kept only if both deviations strictly shrink.
pub fn direct_swap<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<bool> {
    let over_dev = scope.state().deviation(over)?;
    let under_dev = scope.state().deviation(under)?;
    if over_dev <= 0 || under_dev >= 0 {
        return Ok(false);
    }
    if let Err(err) = scope
        .classifier()
        .check_transfer_validity(scope.state(), over, under)
    {
        trace!(event = "transfer_rejected", over = %over, under = %under, reason = %err);
        return Ok(false);
    }

    for day in donor_days(scope, over) {
        if scope.state().is_assigned(under, day) || !scope.can_modify(over, day, "direct_swap") {
            continue;
        }
        let Some(post) = scope.state().post_of(over, day) else {
            continue;
        };
        if is_forbidden(scope.can_assign(under, day, post, Relaxation::Strict)) {
            continue;
        }
        let classifier = scope.classifier();
        if !classifier.within_monthly_limit(scope.state(), under, day)?
            || !classifier.within_weekend_limit(scope.state(), under, day)?
        {
            continue;
        }

        let snapshot = scope.snapshot();
        if let Err(err) = scope.transfer(day, post, under) {
            debug!(event = "attempt_failed", strategy = "direct_swap", day, error = %err);
            continue;
        }
        let over_after = scope.state().deviation(over)?;
        let under_after = scope.state().deviation(under)?;
        let improved = over_after.abs() < over_dev.abs() && under_after.abs() < under_dev.abs();
        if settle(scope, &snapshot, improved)? {
            debug!(
                event = "strategy_applied",
                strategy = "direct_swap",
                from = %over,
                to = %under,
                day,
                post,
            );
            return Ok(true);
        }
    }
    Ok(false)
}
