//! Strict balance pass in absolute shift counts.
//!
//! Where the rebalancing loop works with percentage bands, this pass
//! pushes every worker to within `±target_tolerance` shifts of their
//! target. Each round performs at most one move and the pass ends as soon
//! as a round finds nothing to do.

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use rosterforge_core::{DayIndex, PostIndex, Result, WorkerId};

use crate::oracle::{is_forbidden, Relaxation, ScheduleOracle};
use crate::scope::RebalanceScope;
use crate::strategy::{isolate, three_way_swap, StrategyKind};
use crate::termination::Termination;

/// Overloaded and underloaded workers examined by the direct move.
const DIRECT_WINDOW: usize = 5;
/// Workers examined by the other moves.
const NARROW_WINDOW: usize = 3;

type Ranked = [(WorkerId, i64)];

/// Outcome counters of one strict balance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceStats {
    pub swaps_performed: u32,
    /// Workers brought inside the tolerance, net.
    pub workers_balanced: i64,
    pub max_deviation_before: u32,
    pub max_deviation_after: u32,
    /// The pass stopped on a termination condition.
    pub terminated: bool,
}

/// Strict ±N balance optimizer working on a [`RebalanceScope`].
///
/// Every round first checks the scope's stop flag and the optional
/// [`Termination`], so the pass honors the same budget as the loop.
#[derive(Debug)]
pub struct StrictBalanceOptimizer<'a, O: ScheduleOracle> {
    scope: &'a mut RebalanceScope<O>,
    relaxed_every: u32,
    termination: Option<Box<dyn Termination<O> + 'a>>,
    stats: BalanceStats,
}

impl<'a, O: ScheduleOracle> StrictBalanceOptimizer<'a, O> {
    pub fn new(scope: &'a mut RebalanceScope<O>, relaxed_every: u32) -> Self {
        Self {
            scope,
            relaxed_every,
            termination: None,
            stats: BalanceStats::default(),
        }
    }

    pub fn with_termination(mut self, termination: impl Termination<O> + 'a) -> Self {
        self.termination = Some(Box::new(termination));
        self
    }

    pub fn stats(&self) -> &BalanceStats {
        &self.stats
    }

    /// Runs up to `max_iterations` rounds.
    ///
    /// Returns true iff no worker with a positive target is left more than
    /// `target_tolerance` shifts away from it.
    pub fn optimize_balance(&mut self, max_iterations: u32, target_tolerance: u32) -> Result<bool> {
        let tolerance = i64::from(target_tolerance);
        let (max_before, outside_before) = self.analyze(tolerance)?;
        self.stats.max_deviation_before = max_before;
        info!(
            event = "balance_start",
            tolerance = target_tolerance,
            outside = outside_before,
            max_deviation = max_before,
        );

        let mut rounds = 0;
        for iteration in 1..=max_iterations {
            if self.is_terminated() {
                self.stats.terminated = true;
                break;
            }
            rounds = iteration;
            let (over, under) = self.imbalanced(tolerance)?;
            if over.is_empty() || under.is_empty() {
                break;
            }

            let moved = self.try_direct(&over, &under)?
                || self.try_three_way(&over, &under)?
                || self.try_reassignment(&over, &under)?
                || (self.relaxed_every > 0
                    && iteration % self.relaxed_every == 0
                    && self.try_relaxed(&over, &under)?);
            if !moved {
                break;
            }
            self.stats.swaps_performed += 1;
        }

        let (max_after, outside_after) = self.analyze(tolerance)?;
        self.stats.max_deviation_after = max_after;
        self.stats.workers_balanced = outside_before as i64 - outside_after as i64;
        info!(
            event = "balance_end",
            rounds,
            swaps = self.stats.swaps_performed,
            balanced = self.stats.workers_balanced,
            terminated = self.stats.terminated,
            max_before,
            max_after,
        );
        if outside_after > 0 {
            warn!(
                event = "balance_end",
                outside = outside_after,
                "workers left outside tolerance"
            );
        }
        Ok(outside_after == 0)
    }

    fn is_terminated(&self) -> bool {
        self.scope.is_terminate_early()
            || self
                .termination
                .as_ref()
                .is_some_and(|t| t.is_terminated(&*self.scope))
    }

    /// Largest absolute deviation and the count of workers outside the
    /// tolerance.
    fn analyze(&self, tolerance: i64) -> Result<(u32, usize)> {
        let state = self.scope.state();
        let mut max = 0;
        let mut outside = 0;
        for worker in state.roster().iter() {
            if worker.target_shifts == 0 {
                continue;
            }
            let dev = state.deviation(worker.id)?;
            max = max.max(dev.unsigned_abs() as u32);
            if dev.abs() > tolerance {
                outside += 1;
            }
        }
        Ok((max, outside))
    }

    /// Overloaded workers by descending deviation, underloaded by
    /// descending shortage.
    fn imbalanced(&self, tolerance: i64) -> Result<(Vec<(WorkerId, i64)>, Vec<(WorkerId, i64)>)> {
        let state = self.scope.state();
        let mut over = Vec::new();
        let mut under = Vec::new();
        for worker in state.roster().iter() {
            if worker.target_shifts == 0 {
                continue;
            }
            let dev = state.deviation(worker.id)?;
            if dev > tolerance {
                over.push((worker.id, dev));
            } else if dev < -tolerance {
                under.push((worker.id, dev));
            }
        }
        over.sort_by(|a, b| b.1.cmp(&a.1));
        under.sort_by(|a, b| a.1.cmp(&b.1));
        Ok((over, under))
    }

    fn try_direct(&mut self, over: &Ranked, under: &Ranked) -> Result<bool> {
        for &(from, _) in over.iter().take(DIRECT_WINDOW) {
            for &(to, _) in under.iter().take(DIRECT_WINDOW) {
                let committed = isolate(StrategyKind::DirectSwap, self.direct_move(from, to))?;
                if committed {
                    self.scope
                        .stats_mut()
                        .record_attempt(StrategyKind::DirectSwap, true);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Hands one shift from `from` to `to`, gated by the transfer check.
    fn direct_move(&mut self, from: WorkerId, to: WorkerId) -> Result<bool> {
        if let Err(err) = self
            .scope
            .classifier()
            .check_transfer_validity(self.scope.state(), from, to)
        {
            trace!(event = "transfer_rejected", over = %from, under = %to, reason = %err);
            return Ok(false);
        }

        let mut days = self.scope.state().movable_days(from);
        days.shuffle(self.scope.rng());
        for day in days {
            let Some(post) = self.open_slot(from, to, day, "strict_balance", Relaxation::Strict)
            else {
                continue;
            };
            self.scope.transfer(day, post, to)?;
            debug!(
                event = "strategy_applied",
                strategy = "strict_direct",
                from = %from,
                to = %to,
                day,
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Post `from` holds on `day` if `to` may take it at `relaxation`.
    fn open_slot(
        &self,
        from: WorkerId,
        to: WorkerId,
        day: DayIndex,
        reason: &str,
        relaxation: Relaxation,
    ) -> Option<PostIndex> {
        if self.scope.state().is_assigned(to, day) || !self.scope.can_modify(from, day, reason) {
            return None;
        }
        let post = self.scope.state().post_of(from, day)?;
        if is_forbidden(self.scope.can_assign(to, day, post, relaxation)) {
            return None;
        }
        Some(post)
    }

    fn try_three_way(&mut self, over: &Ranked, under: &Ranked) -> Result<bool> {
        for &(from, _) in over.iter().take(NARROW_WINDOW) {
            for &(to, _) in under.iter().take(NARROW_WINDOW) {
                let committed =
                    isolate(StrategyKind::ThreeWaySwap, three_way_swap(self.scope, from, to))?;
                self.scope
                    .stats_mut()
                    .record_attempt(StrategyKind::ThreeWaySwap, committed);
                if committed {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Vacates a slot of an overloaded worker and gives it to the first
    /// underloaded worker that can take it.
    fn try_reassignment(&mut self, over: &Ranked, under: &Ranked) -> Result<bool> {
        for &(from, _) in over.iter().take(NARROW_WINDOW) {
            for day in self.scope.state().movable_days(from).into_iter().rev() {
                if !self.scope.can_modify(from, day, "reassignment") {
                    continue;
                }
                let Some(post) = self.scope.state().post_of(from, day) else {
                    continue;
                };
                let committed =
                    isolate(StrategyKind::Reassignment, self.reassign(day, post, under))?;
                if committed {
                    self.scope
                        .stats_mut()
                        .record_attempt(StrategyKind::Reassignment, true);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn reassign(&mut self, day: DayIndex, post: PostIndex, under: &Ranked) -> Result<bool> {
        let snapshot = self.scope.snapshot();
        let from = self.scope.vacate(day, post)?;
        for &(to, _) in under.iter().take(NARROW_WINDOW) {
            if self.scope.state().is_assigned(to, day)
                || is_forbidden(self.scope.can_assign(to, day, post, Relaxation::Strict))
            {
                continue;
            }
            self.scope.place(to, day, post)?;
            debug!(
                event = "strategy_applied",
                strategy = "reassignment",
                from = %from,
                to = %to,
                day,
                post,
            );
            return Ok(true);
        }
        self.scope.restore(&snapshot)?;
        Ok(false)
    }

    fn try_relaxed(&mut self, over: &Ranked, under: &Ranked) -> Result<bool> {
        for &(from, _) in over.iter().take(NARROW_WINDOW) {
            for &(to, _) in under.iter().take(NARROW_WINDOW) {
                for day in self.scope.state().movable_days(from) {
                    let Some(post) =
                        self.open_slot(from, to, day, "strict_relaxed", Relaxation::Relaxed)
                    else {
                        continue;
                    };
                    let committed = match self.scope.transfer(day, post, to) {
                        Ok(_) => true,
                        Err(err) => {
                            debug!(
                                event = "attempt_failed",
                                strategy = "strict_relaxed",
                                error = %err,
                            );
                            false
                        }
                    };
                    self.scope
                        .stats_mut()
                        .record_attempt(StrategyKind::RelaxedSwap, committed);
                    if committed {
                        debug!(
                            event = "strategy_applied",
                            strategy = "strict_relaxed",
                            from = %from,
                            to = %to,
                            day,
                        );
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }
}
