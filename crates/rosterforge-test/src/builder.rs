//! Fluent builder for small schedules.
//!
//! # Example
//!
//! ```
//! use rosterforge_core::{WorkerId, WorkerProfile};
//! use rosterforge_test::ScheduleBuilder;
//!
//! let state = ScheduleBuilder::new(7, 2)
//!     .worker(WorkerProfile::new(WorkerId(1), 3))
//!     .assign(WorkerId(1), 0, 0)
//!     .assign(WorkerId(1), 2, 1)
//!     .build();
//!
//! assert_eq!(state.num_days(), 7);
//! assert_eq!(state.assigned_count(WorkerId(1)), 2);
//! assert_eq!(state.count_empty(), 12);
//! ```

use chrono::{Duration, NaiveDate};

use rosterforge_core::{
    Calendar, DayIndex, PostIndex, Roster, ScheduleState, WorkerId, WorkerProfile,
};

/// Default first day of every fixture: Monday 2025-03-03.
pub const FIXTURE_START: (i32, u32, u32) = (2025, 3, 3);

/// Builds a [`ScheduleState`] from workers and explicit slot assignments.
///
/// Workers keep their insertion order, which is also the roster order.
/// Mandatory days declared on a profile are locked when the worker is
/// assigned on them.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder {
    start: NaiveDate,
    num_days: usize,
    posts_per_day: usize,
    holidays: Vec<NaiveDate>,
    workers: Vec<WorkerProfile>,
    assignments: Vec<(WorkerId, DayIndex, PostIndex)>,
    locks: Vec<(WorkerId, DayIndex)>,
}

impl ScheduleBuilder {
    /// Creates a builder for `num_days` days with `posts_per_day` posts.
    pub fn new(num_days: usize, posts_per_day: usize) -> Self {
        let (y, m, d) = FIXTURE_START;
        Self {
            start: NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture start"),
            num_days,
            posts_per_day,
            holidays: Vec::new(),
            workers: Vec::new(),
            assignments: Vec::new(),
            locks: Vec::new(),
        }
    }

    /// Moves the first day of the period.
    pub fn starting(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// Date of day index `day` in the period being built.
    pub fn date(&self, day: DayIndex) -> NaiveDate {
        self.start + Duration::days(day as i64)
    }

    pub fn worker(mut self, profile: WorkerProfile) -> Self {
        self.workers.push(profile);
        self
    }

    pub fn workers(mut self, profiles: impl IntoIterator<Item = WorkerProfile>) -> Self {
        self.workers.extend(profiles);
        self
    }

    pub fn assign(mut self, worker: WorkerId, day: DayIndex, post: PostIndex) -> Self {
        self.assignments.push((worker, day, post));
        self
    }

    /// Locks an assignment after the state is built.
    pub fn lock(mut self, worker: WorkerId, day: DayIndex) -> Self {
        self.locks.push((worker, day));
        self
    }

    /// Builds the state.
    ///
    /// # Panics
    ///
    /// Panics on inconsistent fixtures: duplicate workers, a slot assigned
    /// twice, or a lock on an unassigned day.
    pub fn build(self) -> ScheduleState {
        let end = self.date(self.num_days.saturating_sub(1));
        let calendar = Calendar::new(self.start, end)
            .expect("valid fixture calendar")
            .with_holidays(self.holidays);
        let roster = Roster::new(self.workers).expect("unique fixture workers");

        let mut rows = vec![vec![None; self.posts_per_day]; self.num_days];
        for (worker, day, post) in self.assignments {
            let slot = &mut rows[day][post];
            assert!(
                slot.is_none(),
                "fixture assigns slot (day {day}, post {post}) twice"
            );
            *slot = Some(worker);
        }

        let mut state =
            ScheduleState::from_rows(calendar, roster, rows).expect("consistent fixture schedule");
        for (worker, day) in self.locks {
            state.lock(worker, day).expect("fixture lock on assigned day");
        }
        state
    }
}
