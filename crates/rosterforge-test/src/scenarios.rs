//! Fixed schedules with known imbalances.
//!
//! All scenarios start on Monday 2025-03-03 and use the worker ids
//! [`A`], [`B`], [`C`] and [`D`] for the workers a test usually inspects.

use rosterforge_core::{ScheduleState, WorkerId, WorkerProfile};

use crate::builder::ScheduleBuilder;

pub const A: WorkerId = WorkerId(1);
pub const B: WorkerId = WorkerId(2);
pub const C: WorkerId = WorkerId(3);
pub const D: WorkerId = WorkerId(4);

const PAIR_DAYS: usize = 20;
const PAIR_POSTS: usize = 5;
const PAIR_WEEKEND: [usize; 8] = [4, 5, 6, 11, 12, 13, 18, 19];
const PAIR_WEEKDAYS: [usize; 12] = [0, 1, 2, 3, 7, 8, 9, 10, 14, 15, 16, 17];

/// Ten workers `W1..=W10`, each with a target of 10, over 20 days with 5
/// posts and no empty slot.
///
/// Every worker holds exactly 4 weekend-like shifts. On weekdays, post 0
/// goes to [`A`] for the first `a_weekdays` weekdays and to [`B`] for the
/// rest; the other posts are spread round-robin over `W3..=W10`, 6 each.
/// `A` therefore holds `4 + a_weekdays` shifts and `B` holds
/// `16 - a_weekdays`.
pub fn pair_scenario(a_weekdays: usize) -> ScheduleState {
    let a_weekdays = a_weekdays.min(PAIR_WEEKDAYS.len());
    let mut builder = ScheduleBuilder::new(PAIR_DAYS, PAIR_POSTS)
        .workers((1..=10).map(|id| WorkerProfile::new(WorkerId(id), 10)));

    for (k, &day) in PAIR_WEEKEND.iter().enumerate() {
        let first = if k % 2 == 0 { 1 } else { 6 };
        for post in 0..PAIR_POSTS {
            builder = builder.assign(WorkerId(first + post as u32), day, post);
        }
    }

    let mut rotation = 0u32;
    for (i, &day) in PAIR_WEEKDAYS.iter().enumerate() {
        let holder = if i < a_weekdays { A } else { B };
        builder = builder.assign(holder, day, 0);
        for post in 1..PAIR_POSTS {
            builder = builder.assign(WorkerId(3 + rotation % 8), day, post);
            rotation += 1;
        }
    }
    builder.build()
}

/// [`pair_scenario`] with `A` at 13 shifts (+30%) and `B` at 7 (-30%).
pub fn imbalanced_pair_scenario() -> ScheduleState {
    pair_scenario(9)
}

/// [`pair_scenario`] with every worker exactly on target.
pub fn balanced_scenario() -> ScheduleState {
    pair_scenario(6)
}

/// Six days, two posts, no empty slot.
///
/// `A` (target 2) works days 0-3 on post 0 and `B` (target 2) has nothing,
/// but `B` refuses to share a day with `A`, so no direct hand-over exists.
/// `C` (target 2, days 4-5) can bridge: take one of `A`'s days and give one
/// of its own to `B`. `D` (target 6) fills post 1 every day.
pub fn bridge_scenario() -> ScheduleState {
    let mut builder = ScheduleBuilder::new(6, 2).workers([
        WorkerProfile::new(A, 2),
        WorkerProfile::new(B, 2).with_incompatible([A]),
        WorkerProfile::new(C, 2),
        WorkerProfile::new(D, 6),
    ]);
    for day in 0..4 {
        builder = builder.assign(A, day, 0);
    }
    for day in 4..6 {
        builder = builder.assign(C, day, 0);
    }
    for day in 0..6 {
        builder = builder.assign(D, day, 1);
    }
    builder.build()
}

/// Eight days, two posts, no empty slot.
///
/// Like [`bridge_scenario`], but `C` is far over its target of 0, so no
/// three-way bridge qualifies. Only a chain `A -> C -> B` connects the
/// overloaded `A` to the underloaded `B`.
pub fn chain_scenario() -> ScheduleState {
    let mut builder = ScheduleBuilder::new(8, 2).workers([
        WorkerProfile::new(A, 2),
        WorkerProfile::new(B, 2).with_incompatible([A]),
        WorkerProfile::new(C, 0),
        WorkerProfile::new(D, 8),
    ]);
    for day in 0..4 {
        builder = builder.assign(A, day, 0);
    }
    for day in 4..8 {
        builder = builder.assign(C, day, 0);
    }
    for day in 0..8 {
        builder = builder.assign(D, day, 1);
    }
    builder.build()
}
