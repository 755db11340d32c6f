//! Constraint oracle consulted before every schedule mutation.
//!
//! Strategies never decide on their own whether a worker may take a slot.
//! They ask a [`ScheduleOracle`], which scores the placement or forbids it,
//! and they report every committed mutation back so the oracle can keep
//! its derived tracking counters in step with the schedule.

mod rules;

use std::fmt::{self, Debug};

use rosterforge_core::{DayIndex, PostIndex, ScheduleState, WorkerId};

pub use rules::RuleOracle;

/// How strictly soft scheduling rules are enforced.
///
/// Hard rules (one shift per day, availability, incompatibility) hold at
/// every level; higher levels loosen rest gaps, weekday patterns and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relaxation {
    Strict,
    Relaxed,
    Emergency,
}

impl Relaxation {
    /// Numeric relaxation level, 0 for strict.
    pub fn level(self) -> u8 {
        match self {
            Relaxation::Strict => 0,
            Relaxation::Relaxed => 1,
            Relaxation::Emergency => 2,
        }
    }
}

impl fmt::Display for Relaxation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Scores and guards placements of workers into slots.
pub trait ScheduleOracle: Debug {
    /// Scores putting `worker` into `(day, post)`.
    ///
    /// Returns `f64::NEG_INFINITY` when the placement is forbidden. The
    /// current occupant of the slot, if any, is treated as still present.
    fn can_assign(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
        post: PostIndex,
        relaxation: Relaxation,
    ) -> f64;

    /// Whether an existing assignment may be moved away from `worker`.
    fn can_modify_assignment(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
        _reason: &str,
    ) -> bool {
        !state.is_locked(worker, day)
    }

    /// Called after every committed mutation touching `worker` on `day`.
    ///
    /// `state` already reflects the mutation.
    fn update_tracking_data(
        &mut self,
        _state: &ScheduleState,
        _worker: WorkerId,
        _day: DayIndex,
        _post: PostIndex,
        _removing: bool,
    ) {
    }

    /// Number of hard-rule violations present in `state`.
    fn constraint_violations(&self, _state: &ScheduleState) -> usize {
        0
    }

    /// Rebuilds all tracking data from scratch, e.g. after a restore.
    fn reset_tracking(&mut self, _state: &ScheduleState) {}
}

/// True if an oracle score means "forbidden".
pub fn is_forbidden(score: f64) -> bool {
    score == f64::NEG_INFINITY || score.is_nan()
}
