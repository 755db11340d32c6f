//! Iteration count termination.

use super::Termination;
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

/// Terminates once the loop has started `limit` iterations.
///
/// # Example
///
/// ```
/// use rosterforge_solver::termination::IterationCountTermination;
///
/// let term = IterationCountTermination::new(25);
/// ```
#[derive(Debug, Clone)]
pub struct IterationCountTermination {
    limit: u64,
}

impl IterationCountTermination {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl<O: ScheduleOracle> Termination<O> for IterationCountTermination {
    fn is_terminated(&self, scope: &RebalanceScope<O>) -> bool {
        scope.stats().iterations >= self.limit
    }
}
