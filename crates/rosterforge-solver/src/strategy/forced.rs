//! Forced redistribution, the last resort against persistent stalemates.

use tracing::debug;

use rosterforge_core::{Result, WorkerId};

use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;

/// Gives `under` one more shift at relaxation 1.
///
/// An empty slot is filled first. Without one, a shift is taken from a
/// worker with small positive slack (above target but inside their
/// objective bound). No whole-schedule improvement check is made.
pub fn forced_redistribution<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    under: WorkerId,
) -> Result<bool> {
    if scope.state().deviation(under)? >= 0 {
        return Ok(false);
    }

    let mut empty = scope.state().empty_slots();
    scope.order_candidates(&mut empty);
    for slot in empty {
        if scope.state().is_assigned(under, slot.day)
            || is_forbidden(scope.can_assign(under, slot.day, slot.post, Relaxation::Relaxed))
        {
            continue;
        }
        match scope.place(under, slot.day, slot.post) {
            Ok(()) => {
                debug!(
                    event = "strategy_applied",
                    strategy = "forced_redistribution",
                    to = %under,
                    day = slot.day,
                    post = slot.post,
                    filled = true,
                );
                return Ok(true);
            }
            Err(err) => {
                debug!(event = "attempt_failed", strategy = "forced_redistribution", error = %err);
            }
        }
    }

    let mut donors = Vec::new();
    for &worker in scope.worker_order() {
        if worker == under {
            continue;
        }
        let c = scope.classifier().classify(scope.state(), worker)?;
        if c.deviation > 0 && c.assigned <= c.max {
            donors.push(worker);
        }
    }
    scope.order_candidates(&mut donors);

    for donor in donors {
        for day in scope.state().movable_days(donor).into_iter().rev() {
            if scope.state().is_assigned(under, day) || !scope.can_modify(donor, day, "forced") {
                continue;
            }
            let Some(post) = scope.state().post_of(donor, day) else {
                continue;
            };
            if is_forbidden(scope.can_assign(under, day, post, Relaxation::Relaxed)) {
                continue;
            }
            match scope.transfer(day, post, under) {
                Ok(_) => {
                    debug!(
                        event = "strategy_applied",
                        strategy = "forced_redistribution",
                        from = %donor,
                        to = %under,
                        day,
                        post,
                    );
                    return Ok(true);
                }
                Err(err) => {
                    debug!(
                        event = "attempt_failed",
                        strategy = "forced_redistribution",
                        error = %err,
                    );
                }
            }
        }
    }
    Ok(false)
}
