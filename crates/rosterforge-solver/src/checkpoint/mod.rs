//! Checkpoints of the schedule state and recovery from dead ends.
//!
//! A [`CheckpointStore`] keeps a bounded list of scored snapshots. When the
//! [`DeadEndDetector`] decides the search is stuck, the [`Backtracker`]
//! restores the most promising checkpoint. Recently and frequently used
//! checkpoints are penalized so repeated recoveries explore different
//! starting points.

mod dead_end;
mod recovery;

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use rosterforge_config::CheckpointConfig;
use rosterforge_core::StateSnapshot;

use crate::metrics::{QualityMetrics, QualityReport};
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

pub use dead_end::{DeadEndDetector, DeadEndIndicators};
pub use recovery::{BacktrackStatistics, Backtracker};

/// Stage of the run a checkpoint was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPhase {
    /// The schedule as handed in, before any rebalancing.
    Mandatory,
    Improvement,
    Finalization,
}

impl CheckpointPhase {
    pub fn name(self) -> &'static str {
        match self {
            CheckpointPhase::Mandatory => "mandatory",
            CheckpointPhase::Improvement => "improvement",
            CheckpointPhase::Finalization => "finalization",
        }
    }
}

impl fmt::Display for CheckpointPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable, scored snapshot of the schedule.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: String,
    pub phase: CheckpointPhase,
    pub iteration: u32,
    pub reason: String,
    pub quality: QualityReport,
    /// Workers outside their objective bounds when the snapshot was taken.
    pub tolerance_violations: usize,
    snapshot: StateSnapshot,
    usage: u32,
}

impl Checkpoint {
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Number of rollbacks to this checkpoint.
    pub fn usage_count(&self) -> u32 {
        self.usage
    }

    pub fn score(&self) -> f64 {
        self.quality.overall
    }
}

/// Bounded list of checkpoints plus rollback bookkeeping.
///
/// On overflow the earliest checkpoint is kept together with the most
/// recent `capacity - 1`.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoints: Vec<Checkpoint>,
    config: CheckpointConfig,
    /// Ids of recent rollback targets, most recent first.
    recent: VecDeque<String>,
    counter: u64,
}

impl CheckpointStore {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            checkpoints: Vec::with_capacity(config.capacity),
            recent: VecDeque::with_capacity(config.recent_window),
            config,
            counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn get(&self, id: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|cp| cp.id == id)
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Ids of recent rollback targets, most recent first.
    pub fn recent_rollbacks(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Snapshots the scope's current state and returns the new id.
    pub fn create<O: ScheduleOracle>(
        &mut self,
        scope: &RebalanceScope<O>,
        phase: CheckpointPhase,
        reason: impl Into<String>,
        tolerance_violations: usize,
    ) -> String {
        self.counter += 1;
        let iteration = scope.iteration();
        let id = format!("cp_{}_{}_{}", phase.name(), iteration, self.counter);
        let quality = QualityMetrics::evaluate(scope.state(), scope.oracle());

        info!(
            event = "checkpoint_created",
            id = %id,
            score = quality.overall,
            empty = quality.empty_shifts,
            violations = tolerance_violations,
        );

        self.checkpoints.push(Checkpoint {
            id: id.clone(),
            phase,
            iteration,
            reason: reason.into(),
            quality,
            tolerance_violations,
            snapshot: scope.snapshot(),
            usage: 0,
        });
        while self.checkpoints.len() > self.config.capacity.max(2) {
            self.checkpoints.remove(1);
        }
        id
    }

    /// True at phase boundaries, periodically during improvement, and when
    /// `score` clearly beats the last checkpoint.
    pub fn should_create_checkpoint(
        &self,
        iteration: u32,
        phase: CheckpointPhase,
        score: f64,
    ) -> bool {
        match phase {
            CheckpointPhase::Mandatory | CheckpointPhase::Finalization => true,
            CheckpointPhase::Improvement => {
                let interval = self.config.periodic_interval.max(1);
                iteration % interval == 0
                    || self
                        .last()
                        .is_some_and(|cp| score > cp.score() * self.config.improvement_ratio)
            }
        }
    }

    /// Rollback suitability of the checkpoint at `index`.
    fn rollback_score(&self, index: usize, checkpoint: &Checkpoint) -> f64 {
        let quality = &checkpoint.quality;
        let mut score = quality.overall
            - (self.checkpoints.len() - index) as f64 * 0.1
            - checkpoint.tolerance_violations as f64 * 100.0
            - quality.empty_shifts as f64 * 10.0
            - quality.workload_imbalance * 50.0;
        if let Some(rank) = self.recent.iter().position(|id| *id == checkpoint.id) {
            score -= self.config.recent_window.saturating_sub(rank) as f64 * 200.0;
        }
        score - f64::from(checkpoint.usage) * 150.0
    }

    /// Highest-scoring rollback target, with diversity penalties applied.
    pub fn find_best_rollback_point(&self) -> Option<&Checkpoint> {
        let mut best: Option<(f64, &Checkpoint)> = None;
        for (index, checkpoint) in self.checkpoints.iter().enumerate() {
            let score = self.rollback_score(index, checkpoint);
            debug!(
                event = "rollback_candidate",
                id = %checkpoint.id,
                score,
                used = checkpoint.usage,
            );
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, checkpoint));
            }
        }
        best.map(|(_, cp)| cp)
    }

    /// Marks `id` as the latest rollback target.
    fn record_use(&mut self, id: &str) -> u32 {
        self.recent.retain(|recent| recent != id);
        self.recent.push_front(id.to_string());
        self.recent.truncate(self.config.recent_window.max(1));
        match self.checkpoints.iter_mut().find(|cp| cp.id == id) {
            Some(checkpoint) => {
                checkpoint.usage += 1;
                checkpoint.usage
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests;
