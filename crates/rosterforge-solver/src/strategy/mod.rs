//! Local moves that shift load from an overloaded worker to an underloaded
//! one without breaking hard rules.
//!
//! Every strategy follows the same discipline: take a snapshot, mutate,
//! validate, then commit or restore. A strategy returns `Ok(true)` when it
//! committed a move and `Ok(false)` when no candidate applied. Errors raised
//! by a single candidate are logged and skipped; only a failed restore
//! escapes.
//!
//! [`rebalance_pair`] tries the escalating strategies in order until one
//! commits.

mod chain;
mod direct;
mod forced;
mod relaxed;
mod three_way;

use std::fmt;

use tracing::{debug, trace};

use rosterforge_core::{Result, RosterError, StateSnapshot, WorkerId};

use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

pub use chain::chain_swap;
pub use direct::direct_swap;
pub use forced::forced_redistribution;
pub use relaxed::relaxed_swap;
pub use three_way::{aggressive_three_way_swap, three_way_swap};

/// Kind of move, used for statistics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrategyKind {
    DirectSwap,
    ThreeWaySwap,
    AggressiveThreeWaySwap,
    ChainSwap,
    ForcedRedistribution,
    RelaxedSwap,
    WeekendTransfer,
    WeekendSwap,
    EmptySlotFill,
    Perturbation,
    Reassignment,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::DirectSwap => "direct_swap",
            StrategyKind::ThreeWaySwap => "three_way_swap",
            StrategyKind::AggressiveThreeWaySwap => "aggressive_three_way_swap",
            StrategyKind::ChainSwap => "chain_swap",
            StrategyKind::ForcedRedistribution => "forced_redistribution",
            StrategyKind::RelaxedSwap => "relaxed_swap",
            StrategyKind::WeekendTransfer => "weekend_transfer",
            StrategyKind::WeekendSwap => "weekend_swap",
            StrategyKind::EmptySlotFill => "empty_slot_fill",
            StrategyKind::Perturbation => "perturbation",
            StrategyKind::Reassignment => "reassignment",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategies tried by [`rebalance_pair`], in order.
pub const ESCALATION: [StrategyKind; 4] = [
    StrategyKind::DirectSwap,
    StrategyKind::ThreeWaySwap,
    StrategyKind::AggressiveThreeWaySwap,
    StrategyKind::ChainSwap,
];

/// Moves one shift's worth of load from `over` towards `under`.
///
/// Returns the strategy that committed, or `None` if every strategy in
/// [`ESCALATION`] failed.
pub fn rebalance_pair<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    over: WorkerId,
    under: WorkerId,
) -> Result<Option<StrategyKind>> {
    for kind in ESCALATION {
        let result = match kind {
            StrategyKind::DirectSwap => direct_swap(scope, over, under),
            StrategyKind::ThreeWaySwap => three_way_swap(scope, over, under),
            StrategyKind::AggressiveThreeWaySwap => aggressive_three_way_swap(scope, over, under),
            _ => chain_swap(scope, over, under),
        };
        let committed = isolate(kind, result)?;
        scope.stats_mut().record_attempt(kind, committed);
        if committed {
            return Ok(Some(kind));
        }
        trace!(event = "strategy_skipped", strategy = %kind, over = %over, under = %under);
    }
    Ok(None)
}

/// Turns a failed attempt into "skip", keeping restore failures fatal.
pub(crate) fn isolate(kind: StrategyKind, result: Result<bool>) -> Result<bool> {
    match result {
        Ok(committed) => Ok(committed),
        Err(err @ RosterError::RestoreFailed(_)) => Err(err),
        Err(err) => {
            debug!(event = "attempt_failed", strategy = %kind, error = %err);
            Ok(false)
        }
    }
}

/// Commits when `accept` holds, otherwise restores `snapshot`.
pub(crate) fn settle<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    snapshot: &StateSnapshot,
    accept: bool,
) -> Result<bool> {
    if accept {
        Ok(true)
    } else {
        scope.restore(snapshot)?;
        Ok(false)
    }
}

/// Movable days of `worker`, latest first, in candidate order.
pub(crate) fn donor_days<O: ScheduleOracle>(
    scope: &mut RebalanceScope<O>,
    worker: WorkerId,
) -> Vec<usize> {
    let mut days = scope.state().movable_days(worker);
    days.reverse();
    scope.order_candidates(&mut days);
    days
}

#[cfg(test)]
mod tests;
