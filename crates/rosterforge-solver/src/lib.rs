//! RosterForge rebalancing engine
//!
//! This crate takes a filled shift schedule and moves assignments between
//! workers until everyone sits inside their tolerance band:
//! - Hard-rule oracle and tolerance classification
//! - Local strategies (direct, three-way, chain, forced, relaxed)
//! - Redistribution passes and the rebalancing loop
//! - Checkpoints, dead-end detection and rollback
//! - Strict ±N balance pass
//! - Termination conditions
//!
//! # Logging
//!
//! Everything is reported through `tracing` events carrying an `event`
//! field. Loop boundaries, checkpoints and rollbacks log at `info`, dead
//! ends and forced moves at `warn`, single moves at `debug`, and rejected
//! candidates at `trace`.

pub mod budget;
pub mod checkpoint;
pub mod metrics;
pub mod oracle;
pub mod rebalance;
pub mod redistribution;
pub mod scope;
pub mod stats;
pub mod strategy;
pub mod strict;
pub mod termination;
pub mod tolerance;

pub use budget::{ConstraintProfile, IterationBudget};
pub use checkpoint::{
    BacktrackStatistics, Backtracker, Checkpoint, CheckpointPhase, CheckpointStore,
    DeadEndDetector, DeadEndIndicators,
};
pub use metrics::{QualityMetrics, QualityReport};
pub use oracle::{is_forbidden, Relaxation, RuleOracle, ScheduleOracle};
pub use rebalance::{
    optimize, IterationRecord, OptimizationResult, OptimizationSummary, RebalancingLoop,
    StopReason,
};
pub use scope::RebalanceScope;
pub use stats::RebalanceStats;
pub use strategy::StrategyKind;
pub use strict::{BalanceStats, StrictBalanceOptimizer};
pub use termination::{
    ExternalTermination, IterationCountTermination, OrTermination, Termination, TimeTermination,
};
pub use tolerance::{
    BalanceReport, TolerancePhase, ToleranceClassifier, ViolationReport, WorkerClassification,
};
