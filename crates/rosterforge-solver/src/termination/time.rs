//! Time-based termination.

use std::time::Duration;

use super::Termination;
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

/// Terminates after a time limit.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rosterforge_solver::termination::TimeTermination;
///
/// // Terminate after 30 seconds
/// let term = TimeTermination::new(Duration::from_secs(30));
///
/// // Or use convenience constructors
/// let term = TimeTermination::seconds(30);
/// let term = TimeTermination::millis(500);
/// ```
#[derive(Debug, Clone)]
pub struct TimeTermination {
    limit: Duration,
}

impl TimeTermination {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn seconds(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl<O: ScheduleOracle> Termination<O> for TimeTermination {
    fn is_terminated(&self, scope: &RebalanceScope<O>) -> bool {
        scope.elapsed().is_some_and(|e| e >= self.limit)
    }
}
