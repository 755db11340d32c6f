//! Chain swap: a bounded breadth-first search for a path of hand-overs.
//!
//! An edge `X -> Y` means X holds a movable shift that Y could legally take
//! at relaxation 1. The search starts at the overloaded worker and stops at
//! the first underloaded worker it reaches. Every hand-over in the path is
//! applied atomically.

use std::collections::{BTreeSet, VecDeque};

use smallvec::SmallVec;
use tracing::{debug, trace};

use rosterforge_core::{DayIndex, PostIndex, Result, WorkerId};

use super::settle;
use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;

/// Upper bound on expanded nodes per search.
const MAX_EXPANSIONS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    from: WorkerId,
    to: WorkerId,
    day: DayIndex,
    post: PostIndex,
}

type Path = SmallVec<[Link; 4]>;

/// Searches and applies a hand-over chain starting at `over`.
///
/// `under` is preferred as the chain's end, but any underloaded worker
/// terminates the search. The chain is kept only if both its first and its
/// last worker move towards their targets.
pub fn chain_swap<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<bool> {
    let over_dev = scope.state().deviation(over)?;
    if over_dev <= 0 {
        return Ok(false);
    }
    let Some(path) = find_chain(scope, over, under) else {
        return Ok(false);
    };
    let Some(last) = path.last().map(|link| link.to) else {
        return Ok(false);
    };
    let last_dev = scope.state().deviation(last)?;
    if let Err(err) = scope
        .classifier()
        .check_transfer_validity(scope.state(), over, last)
    {
        trace!(event = "transfer_rejected", over = %over, under = %last, reason = %err);
        return Ok(false);
    }

    let snapshot = scope.snapshot();
    for link in &path {
        if let Err(err) = scope.transfer(link.day, link.post, link.to) {
            debug!(
                event = "attempt_failed",
                strategy = "chain_swap",
                from = %link.from,
                to = %link.to,
                error = %err,
            );
            scope.restore(&snapshot)?;
            return Ok(false);
        }
    }

    let over_after = scope.state().deviation(over)?;
    let last_after = scope.state().deviation(last)?;
    let accept = over_after.abs() < over_dev.abs() && last_after.abs() < last_dev.abs();
    let committed = settle(scope, &snapshot, accept)?;
    if committed {
        debug!(
            event = "strategy_applied",
            strategy = "chain_swap",
            from = %over,
            to = %last,
            length = path.len(),
        );
    }
    Ok(committed)
}

fn find_chain<O: ScheduleOracle>(
    scope: &RebalanceScope<O>,
    start: WorkerId,
    preferred: WorkerId,
) -> Option<Path> {
    let state = scope.state();
    let max_depth = scope.chain_max_depth();
    let mut candidates: Vec<WorkerId> = vec![preferred];
    candidates.extend(scope.worker_order().iter().copied().filter(|&w| w != preferred));

    let mut visited = BTreeSet::from([start]);
    let mut queue: VecDeque<(WorkerId, Path)> = VecDeque::from([(start, Path::new())]);
    let mut expansions = 0;

    while let Some((node, path)) = queue.pop_front() {
        if path.len() >= max_depth {
            continue;
        }
        expansions += 1;
        if expansions > MAX_EXPANSIONS {
            break;
        }

        for day in state.movable_days(node).into_iter().rev() {
            if path.iter().any(|link| link.day == day) || !scope.can_modify(node, day, "chain_swap")
            {
                continue;
            }
            let Some(post) = state.post_of(node, day) else {
                continue;
            };
            for &next in &candidates {
                if visited.contains(&next)
                    || state.is_assigned(next, day)
                    || is_forbidden(scope.can_assign(next, day, post, Relaxation::Relaxed))
                {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(Link {
                    from: node,
                    to: next,
                    day,
                    post,
                });
                if scope.deviation(next).is_some_and(|dev| dev < 0) {
                    return Some(extended);
                }
                visited.insert(next);
                queue.push_back((next, extended));
            }
        }
    }
    None
}
