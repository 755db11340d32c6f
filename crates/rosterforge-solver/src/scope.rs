//! Rebalancing scope: the state being worked on plus everything a strategy
//! needs to mutate it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use rosterforge_core::{
    DayIndex, PostIndex, Result, RosterError, ScheduleState, StateSnapshot, WorkerId,
};

use crate::oracle::{Relaxation, ScheduleOracle};
use crate::stats::RebalanceStats;
use crate::tolerance::ToleranceClassifier;

/// Owns the schedule for one run.
///
/// Every mutation goes through the scope so the oracle's tracking data is
/// updated together with the state.
#[derive(Debug)]
pub struct RebalanceScope<O: ScheduleOracle> {
    state: ScheduleState,
    oracle: O,
    classifier: ToleranceClassifier,
    rng: StdRng,
    stats: RebalanceStats,
    worker_order: Vec<WorkerId>,
    shuffle_candidates: bool,
    chain_max_depth: usize,
    iteration: u32,
    start_time: Option<Instant>,
    terminate_early_flag: Option<Arc<AtomicBool>>,
}

impl<O: ScheduleOracle> RebalanceScope<O> {
    pub fn new(state: ScheduleState, mut oracle: O, classifier: ToleranceClassifier) -> Self {
        oracle.reset_tracking(&state);
        let worker_order = state.roster().ids().collect();
        Self {
            state,
            oracle,
            classifier,
            rng: StdRng::from_os_rng(),
            stats: RebalanceStats::default(),
            worker_order,
            shuffle_candidates: false,
            chain_max_depth: 4,
            iteration: 0,
            start_time: None,
            terminate_early_flag: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_chain_max_depth(mut self, depth: usize) -> Self {
        self.chain_max_depth = depth.max(1);
        self
    }

    pub fn with_terminate_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.terminate_early_flag = Some(flag);
        self
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn into_state(self) -> ScheduleState {
        self.state
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn classifier(&self) -> &ToleranceClassifier {
        &self.classifier
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn stats(&self) -> &RebalanceStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RebalanceStats {
        &mut self.stats
    }

    /// Order in which workers are processed when no priority applies.
    pub fn worker_order(&self) -> &[WorkerId] {
        &self.worker_order
    }

    /// Exchanges `count` random pairs in the worker processing order.
    pub fn perturb_worker_order(&mut self, count: usize) {
        let len = self.worker_order.len();
        if len < 2 {
            return;
        }
        for _ in 0..count {
            let a = self.rng.random_range(0..len);
            let b = self.rng.random_range(0..len);
            self.worker_order.swap(a, b);
        }
    }

    pub fn shuffle_candidates(&self) -> bool {
        self.shuffle_candidates
    }

    pub fn set_shuffle_candidates(&mut self, shuffle: bool) {
        self.shuffle_candidates = shuffle;
    }

    /// Shuffles `items` when candidate shuffling is enabled.
    pub fn order_candidates<T>(&mut self, items: &mut [T]) {
        if self.shuffle_candidates {
            items.shuffle(&mut self.rng);
        }
    }

    pub fn chain_max_depth(&self) -> usize {
        self.chain_max_depth
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.stats.start();
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|t| t.elapsed())
    }

    /// True if an external caller asked the run to stop.
    pub fn is_terminate_early(&self) -> bool {
        self.terminate_early_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn can_assign(
        &self,
        worker: WorkerId,
        day: DayIndex,
        post: PostIndex,
        relaxation: Relaxation,
    ) -> f64 {
        self.oracle
            .can_assign(&self.state, worker, day, post, relaxation)
    }

    pub fn can_modify(&self, worker: WorkerId, day: DayIndex, reason: &str) -> bool {
        self.oracle
            .can_modify_assignment(&self.state, worker, day, reason)
    }

    /// Hands the slot `(day, post)` to `to`; returns the previous holder.
    pub fn transfer(&mut self, day: DayIndex, post: PostIndex, to: WorkerId) -> Result<WorkerId> {
        if let Some(from) = self.state.occupant(day, post)? {
            if !self.can_modify(from, day, "transfer") {
                return Err(RosterError::ConstraintViolation(format!(
                    "assignment of {from} on day {day} may not be modified"
                )));
            }
        }
        let from = self.state.reassign(day, post, to)?;
        self.oracle
            .update_tracking_data(&self.state, from, day, post, true);
        self.oracle
            .update_tracking_data(&self.state, to, day, post, false);
        Ok(from)
    }

    /// Puts `worker` into an empty slot.
    pub fn place(&mut self, worker: WorkerId, day: DayIndex, post: PostIndex) -> Result<()> {
        self.state.assign(worker, day, post)?;
        self.oracle
            .update_tracking_data(&self.state, worker, day, post, false);
        Ok(())
    }

    /// Empties a slot and returns its previous holder.
    pub fn vacate(&mut self, day: DayIndex, post: PostIndex) -> Result<WorkerId> {
        if let Some(worker) = self.state.occupant(day, post)? {
            if !self.can_modify(worker, day, "vacate") {
                return Err(RosterError::ConstraintViolation(format!(
                    "assignment of {worker} on day {day} may not be modified"
                )));
            }
        }
        let worker = self.state.unassign(day, post)?;
        self.oracle
            .update_tracking_data(&self.state, worker, day, post, true);
        Ok(worker)
    }

    /// Exchanges the holders of posts `a` and `b` on `day`.
    pub fn swap_posts(&mut self, day: DayIndex, a: PostIndex, b: PostIndex) -> Result<()> {
        let holder_a = self.state.occupant(day, a)?;
        let holder_b = self.state.occupant(day, b)?;
        let generation = self.state.generation();
        self.state.swap_posts(day, a, b)?;
        if self.state.generation() == generation {
            return Ok(());
        }
        for (worker, from, to) in [(holder_a, a, b), (holder_b, b, a)] {
            if let Some(worker) = worker {
                self.oracle
                    .update_tracking_data(&self.state, worker, day, from, true);
                self.oracle
                    .update_tracking_data(&self.state, worker, day, to, false);
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Restores a snapshot and rebuilds oracle tracking.
    pub fn restore(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        if self.state.is_unchanged_since(snapshot) {
            return Ok(());
        }
        self.state.restore(snapshot)?;
        self.oracle.reset_tracking(&self.state);
        Ok(())
    }

    /// Deviation from target, or `None` for an unknown worker.
    pub fn deviation(&self, worker: WorkerId) -> Option<i64> {
        self.state.deviation(worker).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::oracle::RuleOracle;
    use rosterforge_test::{bridge_scenario, A, C, D};

    /// Counts assignments per `(worker, post)` from notifications only.
    #[derive(Debug, Default)]
    struct PostTally {
        held: BTreeMap<(WorkerId, PostIndex), i64>,
    }

    impl PostTally {
        fn rebuilt(state: &ScheduleState) -> BTreeMap<(WorkerId, PostIndex), i64> {
            let mut held = BTreeMap::new();
            for (slot, worker) in state.grid().iter() {
                if let Some(worker) = worker {
                    *held.entry((worker, slot.post)).or_insert(0) += 1;
                }
            }
            held
        }
    }

    impl ScheduleOracle for PostTally {
        fn can_assign(
            &self,
            _state: &ScheduleState,
            _worker: WorkerId,
            _day: DayIndex,
            _post: PostIndex,
            _relaxation: Relaxation,
        ) -> f64 {
            0.0
        }

        fn update_tracking_data(
            &mut self,
            _state: &ScheduleState,
            worker: WorkerId,
            _day: DayIndex,
            post: PostIndex,
            removing: bool,
        ) {
            let held = self.held.entry((worker, post)).or_insert(0);
            *held += if removing { -1 } else { 1 };
            if *held == 0 {
                self.held.remove(&(worker, post));
            }
        }

        fn reset_tracking(&mut self, state: &ScheduleState) {
            self.held = Self::rebuilt(state);
        }
    }

    fn scope() -> RebalanceScope<RuleOracle> {
        RebalanceScope::new(
            bridge_scenario(),
            RuleOracle::permissive(),
            ToleranceClassifier::default(),
        )
        .with_seed(7)
    }

    #[test]
    fn test_transfer_updates_tracking() {
        let mut scope = scope();
        assert_eq!(scope.oracle().last_assignment(A), Some(3));
        let from = scope.transfer(3, 0, C).unwrap();
        assert_eq!(from, A);
        assert_eq!(scope.oracle().last_assignment(A), Some(2));
        assert_eq!(scope.oracle().weekday_count(C, 3), 1);
    }

    #[test]
    fn test_restore_rebuilds_tracking() {
        let mut scope = scope();
        let snap = scope.snapshot();
        scope.transfer(3, 0, C).unwrap();
        scope.restore(&snap).unwrap();
        assert_eq!(scope.state().occupant(3, 0).unwrap(), Some(A));
        assert_eq!(scope.oracle().last_assignment(A), Some(3));
        assert_eq!(scope.oracle().weekday_count(C, 3), 0);
    }

    #[test]
    fn test_restore_of_untouched_state_is_noop() {
        let mut scope = scope();
        let snap = scope.snapshot();
        let generation = scope.state().generation();
        scope.restore(&snap).unwrap();
        assert_eq!(scope.state().generation(), generation);
    }

    #[test]
    fn test_vacate_and_place() {
        let mut scope = scope();
        assert_eq!(scope.vacate(0, 0).unwrap(), A);
        assert_eq!(scope.state().count_empty(), 1);
        scope.place(C, 0, 0).unwrap();
        assert!(scope.state().is_assigned(C, 0));
        assert!(scope.state().verify_consistency().is_ok());
    }

    #[test]
    fn test_terminate_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let scope = scope().with_terminate_flag(flag.clone());
        assert!(!scope.is_terminate_early());
        flag.store(true, Ordering::SeqCst);
        assert!(scope.is_terminate_early());
    }

    #[test]
    fn test_swap_posts_keeps_post_tracking() {
        let mut scope = RebalanceScope::new(
            bridge_scenario(),
            PostTally::default(),
            ToleranceClassifier::default(),
        );
        scope.swap_posts(1, 0, 1).unwrap();
        scope.swap_posts(5, 0, 1).unwrap();

        assert_eq!(scope.state().occupant(1, 1).unwrap(), Some(A));
        assert_eq!(scope.state().occupant(1, 0).unwrap(), Some(D));
        assert_eq!(scope.oracle().held, PostTally::rebuilt(scope.state()));
    }
}
