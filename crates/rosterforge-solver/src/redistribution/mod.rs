//! Whole-schedule passes run once per loop iteration.
//!
//! A pass looks at the current tolerance violations, pairs overloaded
//! workers with underloaded ones and drives the strategies in
//! [`crate::strategy`] until its move budget or its candidates run out.
//! Every pass returns the number of committed moves.

mod escalation;
mod fill;
mod general;
mod weekend;

use rosterforge_core::{DayIndex, ScheduleState, WorkerId};

pub use escalation::{forced_pass, relaxed_pass};
pub use fill::{greedy_fill, perturb, FillOutcome};
pub use general::general_redistribution;
pub use weekend::{weekend_redistribution, weekend_swaps};

/// Non-mandatory shift count of every worker, in roster order.
pub(crate) fn shift_counts(state: &ScheduleState) -> Vec<(WorkerId, u32)> {
    state
        .roster()
        .ids()
        .map(|w| (w, state.non_mandatory_count(w)))
        .collect()
}

/// Movable Saturday/Sunday days of `worker`, latest first.
pub(crate) fn movable_sat_sun(state: &ScheduleState, worker: WorkerId) -> Vec<DayIndex> {
    let mut days: Vec<DayIndex> = state
        .movable_days(worker)
        .into_iter()
        .filter(|&d| state.calendar().is_sat_sun(d))
        .collect();
    days.reverse();
    days
}
