//! Rebalancing run statistics.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::strategy::StrategyKind;

/// Attempts and commits of one strategy kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyCounts {
    pub attempts: u64,
    pub commits: u64,
}

/// Run-level statistics.
///
/// Tracks loop iterations, evaluated and committed moves per strategy and
/// checkpoint rollbacks.
///
/// # Example
///
/// ```
/// use rosterforge_solver::stats::RebalanceStats;
/// use rosterforge_solver::StrategyKind;
///
/// let mut stats = RebalanceStats::default();
/// stats.start();
/// stats.record_iteration();
/// stats.record_attempt(StrategyKind::DirectSwap, true);
/// stats.record_attempt(StrategyKind::ThreeWaySwap, false);
///
/// assert_eq!(stats.iterations, 1);
/// assert_eq!(stats.moves_evaluated, 2);
/// assert_eq!(stats.moves_accepted, 1);
/// assert_eq!(stats.commits(StrategyKind::DirectSwap), 1);
/// assert_eq!(stats.acceptance_rate(), 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RebalanceStats {
    start_time: Option<Instant>,
    /// Loop iterations executed.
    pub iterations: u64,
    /// Strategy attempts across all kinds.
    pub moves_evaluated: u64,
    /// Committed strategy attempts across all kinds.
    pub moves_accepted: u64,
    /// Checkpoint rollbacks performed.
    pub rollbacks: u64,
    per_strategy: BTreeMap<StrategyKind, StrategyCounts>,
}

impl RebalanceStats {
    /// Marks the start of the run.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Returns the elapsed time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Records one attempt of `kind` and whether it was committed.
    pub fn record_attempt(&mut self, kind: StrategyKind, committed: bool) {
        self.moves_evaluated += 1;
        let counts = self.per_strategy.entry(kind).or_default();
        counts.attempts += 1;
        if committed {
            self.moves_accepted += 1;
            counts.commits += 1;
        }
    }

    pub fn record_rollback(&mut self) {
        self.rollbacks += 1;
    }

    pub fn attempts(&self, kind: StrategyKind) -> u64 {
        self.per_strategy.get(&kind).map_or(0, |c| c.attempts)
    }

    pub fn commits(&self, kind: StrategyKind) -> u64 {
        self.per_strategy.get(&kind).map_or(0, |c| c.commits)
    }

    /// Per-strategy counts, in strategy order.
    pub fn per_strategy(&self) -> impl Iterator<Item = (StrategyKind, StrategyCounts)> + '_ {
        self.per_strategy.iter().map(|(k, c)| (*k, *c))
    }

    /// Returns the moves per second rate.
    pub fn moves_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.moves_evaluated as f64 / secs
        } else {
            0.0
        }
    }

    /// Returns the acceptance rate (accepted / evaluated).
    pub fn acceptance_rate(&self) -> f64 {
        if self.moves_evaluated == 0 {
            0.0
        } else {
            self.moves_accepted as f64 / self.moves_evaluated as f64
        }
    }
}
