//! Rollback to checkpoints and post-recovery variation.

use rand::Rng;
use serde::Serialize;
use tracing::{error, info, warn};

use rosterforge_config::RebalanceConfig;
use rosterforge_core::{Result, RosterError};

use super::{CheckpointPhase, CheckpointStore, DeadEndDetector, DeadEndIndicators};
use crate::metrics::QualityReport;
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

/// Most post swaps applied by one variation.
const MAX_POST_SWAPS: usize = 3;

/// Snapshot of the backtracking bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktrackStatistics {
    pub total_checkpoints: usize,
    pub total_rollbacks: u64,
    pub iterations_without_improvement: u32,
    pub last_score: f64,
    pub indicators: DeadEndIndicators,
}

/// Checkpoint store and dead-end detector working together.
#[derive(Debug, Clone)]
pub struct Backtracker {
    store: CheckpointStore,
    detector: DeadEndDetector,
    rollbacks: u64,
}

impl Backtracker {
    pub fn new(config: &RebalanceConfig) -> Self {
        Self {
            store: CheckpointStore::new(config.checkpoint.clone()),
            detector: DeadEndDetector::new(config.dead_end.clone()),
            rollbacks: 0,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn detector(&self) -> &DeadEndDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut DeadEndDetector {
        &mut self.detector
    }

    pub fn create_checkpoint<O: ScheduleOracle>(
        &mut self,
        scope: &RebalanceScope<O>,
        phase: CheckpointPhase,
        reason: impl Into<String>,
        tolerance_violations: usize,
    ) -> String {
        self.store
            .create(scope, phase, reason, tolerance_violations)
    }

    pub fn should_create_checkpoint(
        &self,
        iteration: u32,
        phase: CheckpointPhase,
        score: f64,
    ) -> bool {
        self.store.should_create_checkpoint(iteration, phase, score)
    }

    pub fn detect_dead_end(
        &mut self,
        quality: &QualityReport,
        tolerance_violations: usize,
        impossible_assignments: usize,
    ) -> bool {
        self.detector
            .detect_dead_end(quality, tolerance_violations, impossible_assignments)
    }

    /// Restores checkpoint `id` into the scope.
    ///
    /// On success the dead-end indicators are reset, the checkpoint's usage
    /// count grows by one and its id moves to the front of the recency
    /// list. A failed restore leaves the bookkeeping untouched.
    pub fn rollback<O: ScheduleOracle>(
        &mut self,
        scope: &mut RebalanceScope<O>,
        id: &str,
    ) -> Result<()> {
        let Some(checkpoint) = self.store.get(id) else {
            return Err(RosterError::RestoreFailed(format!("unknown checkpoint {id}")));
        };
        let snapshot = checkpoint.snapshot().clone();
        let score = checkpoint.score();

        scope.restore(&snapshot)?;
        self.detector.reset(score);
        self.rollbacks += 1;
        scope.stats_mut().record_rollback();
        let usage = self.store.record_use(id);
        info!(event = "rollback", id, score, usage);
        Ok(())
    }

    /// Changes the search path after a rollback to `id`.
    ///
    /// The more often the checkpoint was used, the stronger the variation:
    /// candidate order is shuffled from the first use, a few random post
    /// pairs are swapped from the second, and the worker processing order
    /// is perturbed from the third. Returns the number of post swaps made.
    pub fn apply_post_recovery_variation<O: ScheduleOracle>(
        &self,
        scope: &mut RebalanceScope<O>,
        id: &str,
    ) -> Result<usize> {
        let usage = self.store.get(id).map_or(0, |cp| cp.usage_count());
        scope.set_shuffle_candidates(true);

        let mut swaps = 0;
        if usage >= 2 {
            swaps = swap_random_posts(scope)?;
        }
        if usage >= 3 {
            let count = ((scope.worker_order().len() as f64 * 0.15) as usize).max(1);
            scope.perturb_worker_order(count);
        }
        info!(event = "recovery_variation", id, usage, swaps);
        Ok(swaps)
    }

    /// Checks for a dead end and, if found, rolls back and varies the path.
    ///
    /// Returns `Ok(true)` if a recovery was performed. A failed restore is
    /// logged and reported as `Ok(false)`; the run continues from the
    /// current state.
    pub fn auto_recovery<O: ScheduleOracle>(
        &mut self,
        scope: &mut RebalanceScope<O>,
        quality: &QualityReport,
        tolerance_violations: usize,
        impossible_assignments: usize,
    ) -> Result<bool> {
        if !self.detect_dead_end(quality, tolerance_violations, impossible_assignments) {
            return Ok(false);
        }
        let Some(id) = self.store.find_best_rollback_point().map(|cp| cp.id.clone()) else {
            warn!(event = "rollback", reason = "no checkpoint available");
            return Ok(false);
        };
        if let Err(err) = self.rollback(scope, &id) {
            error!(event = "rollback", id = %id, error = %err, "restore failed");
            return Ok(false);
        }
        self.apply_post_recovery_variation(scope, &id)?;
        Ok(true)
    }

    pub fn statistics(&self) -> BacktrackStatistics {
        BacktrackStatistics {
            total_checkpoints: self.store.len(),
            total_rollbacks: self.rollbacks,
            iterations_without_improvement: self.detector.iterations_without_improvement(),
            last_score: self.detector.last_score(),
            indicators: self.detector.indicators().clone(),
        }
    }
}

/// Swaps the posts of two workers on a few random days.
fn swap_random_posts<O: ScheduleOracle>(scope: &mut RebalanceScope<O>) -> Result<usize> {
    let days = scope.state().num_days();
    if days == 0 || scope.state().posts_per_day() < 2 {
        return Ok(0);
    }
    let wanted = ((days as f64 * 0.10) as usize).clamp(1, MAX_POST_SWAPS);

    let mut swaps = 0;
    for _ in 0..wanted * 3 {
        if swaps >= wanted {
            break;
        }
        let day = scope.rng().random_range(0..days);
        let mut posts = Vec::new();
        for post in 0..scope.state().posts_per_day() {
            if let Some(worker) = scope.state().occupant(day, post)? {
                if scope.can_modify(worker, day, "recovery_variation") {
                    posts.push(post);
                }
            }
        }
        if posts.len() < 2 {
            continue;
        }
        let first = scope.rng().random_range(0..posts.len());
        let mut second = scope.rng().random_range(0..posts.len() - 1);
        if second >= first {
            second += 1;
        }
        scope.swap_posts(day, posts[first], posts[second])?;
        swaps += 1;
    }
    Ok(swaps)
}
