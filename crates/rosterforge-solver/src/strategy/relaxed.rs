//! Relaxed swap, the periodic fallback used to escape stagnation.

use tracing::{debug, trace};

use rosterforge_core::{Result, WorkerId};

use super::donor_days;
use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;

/// Moves one shift from `over` to `under` at relaxation 1.
///
/// Only the transfer-validity check gates the move; neither sub-limits nor
/// a dual improvement are required.
pub fn relaxed_swap<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<bool> {
    if let Err(err) = scope
        .classifier()
        .check_transfer_validity(scope.state(), over, under)
    {
        trace!(event = "transfer_rejected", over = %over, under = %under, reason = %err);
        return Ok(false);
    }

    for day in donor_days(scope, over) {
        if scope.state().is_assigned(under, day) || !scope.can_modify(over, day, "relaxed_swap") {
            continue;
        }
        let Some(post) = scope.state().post_of(over, day) else {
            continue;
        };
        if is_forbidden(scope.can_assign(under, day, post, Relaxation::Relaxed)) {
            continue;
        }
        match scope.transfer(day, post, under) {
            Ok(_) => {
                debug!(
                    event = "strategy_applied",
                    strategy = "relaxed_swap",
                    from = %over,
                    to = %under,
                    day,
                    post,
                );
                return Ok(true);
            }
            Err(err) => {
                debug!(event = "attempt_failed", strategy = "relaxed_swap", day, error = %err);
            }
        }
    }
    Ok(false)
}
