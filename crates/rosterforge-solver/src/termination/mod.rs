//! Termination conditions for the rebalancing loop.
//!
//! Conditions are evaluated once per iteration boundary, never in the
//! middle of a strategy.

mod composite;
mod external;
mod iteration;
mod time;

use std::fmt::Debug;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rosterforge_config::RebalanceConfig;

use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

pub use composite::OrTermination;
pub use external::ExternalTermination;
pub use iteration::IterationCountTermination;
pub use time::TimeTermination;

/// Trait for determining when to stop rebalancing.
///
/// # Type Parameters
/// * `O` - The oracle type of the scope being inspected
pub trait Termination<O: ScheduleOracle>: Debug {
    /// Returns true if rebalancing should stop before the next iteration.
    fn is_terminated(&self, scope: &RebalanceScope<O>) -> bool;
}

/// An absent condition never terminates.
impl<O: ScheduleOracle, T: Termination<O>> Termination<O> for Option<T> {
    fn is_terminated(&self, scope: &RebalanceScope<O>) -> bool {
        self.as_ref().is_some_and(|t| t.is_terminated(scope))
    }
}

/// Termination used by the rebalancing loop.
pub type LoopTermination = OrTermination<(
    Option<IterationCountTermination>,
    Option<TimeTermination>,
    Option<ExternalTermination>,
)>;

/// Builds the loop termination from the `[termination]` section plus an
/// optional external stop flag.
pub fn from_config(config: &RebalanceConfig, flag: Option<Arc<AtomicBool>>) -> LoopTermination {
    let iterations = config
        .termination
        .as_ref()
        .and_then(|t| t.iteration_limit)
        .map(|limit| IterationCountTermination::new(u64::from(limit)));
    let time = config.time_limit().map(TimeTermination::new);
    OrTermination((iterations, time, flag.map(ExternalTermination::new)))
}

#[cfg(test)]
mod tests;
