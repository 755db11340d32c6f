//! Mutable schedule state shared by every rebalancing strategy.
//!
//! A [`ScheduleState`] bundles the slot arena, the per-worker assignment
//! sets derived from it, per-worker counters and the locked (mandatory)
//! pairs. All mutations go through methods that validate first and then
//! update grid, assignments and counters together, so a failed call leaves
//! the state untouched.
//!
//! Snapshots share storage with the live state through `Arc`s; the first
//! mutation after a snapshot copies only the touched collection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use smallvec::SmallVec;

use crate::calendar::{Calendar, DayIndex};
use crate::error::{Result, RosterError};
use crate::grid::{PostIndex, ScheduleGrid, SlotKey};
use crate::roster::{Roster, WorkerId};

/// Derived per-worker tallies, kept in step with the grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerCounters {
    /// All assigned shifts, mandatory included.
    pub total: u32,
    /// Shifts on weekend-like days (Fri/Sat/Sun, holidays, holiday eves).
    pub weekend: u32,
    /// Shifts per post index.
    pub posts: SmallVec<[u32; 8]>,
}

/// Frozen view of a [`ScheduleState`], cheap to take and to restore.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    grid: ScheduleGrid,
    assignments: Arc<BTreeMap<WorkerId, BTreeSet<DayIndex>>>,
    counters: Arc<BTreeMap<WorkerId, WorkerCounters>>,
    generation: u64,
}

impl StateSnapshot {
    /// Generation of the state at the time the snapshot was taken.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn grid(&self) -> &ScheduleGrid {
        &self.grid
    }

    pub fn assigned_count(&self, worker: WorkerId) -> usize {
        self.assignments.get(&worker).map_or(0, BTreeSet::len)
    }
}

/// The schedule being rebalanced.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    calendar: Arc<Calendar>,
    roster: Arc<Roster>,
    grid: ScheduleGrid,
    assignments: Arc<BTreeMap<WorkerId, BTreeSet<DayIndex>>>,
    counters: Arc<BTreeMap<WorkerId, WorkerCounters>>,
    locked: Arc<BTreeSet<(WorkerId, DayIndex)>>,
    generation: u64,
}

impl ScheduleState {
    /// Creates an empty schedule for the calendar.
    pub fn new(calendar: Calendar, roster: Roster, posts_per_day: usize) -> Self {
        let grid = ScheduleGrid::new(calendar.num_days(), posts_per_day);
        Self {
            calendar: Arc::new(calendar),
            roster: Arc::new(roster),
            grid,
            assignments: Arc::default(),
            counters: Arc::default(),
            locked: Arc::default(),
            generation: 0,
        }
    }

    /// Wraps an existing grid, deriving assignments and counters from it.
    ///
    /// Mandatory days declared on worker profiles are locked when the
    /// worker is already assigned on that day.
    ///
    /// # Errors
    ///
    /// Fails if the grid does not cover the calendar, references unknown
    /// workers, or places a worker twice on the same day.
    pub fn from_grid(calendar: Calendar, roster: Roster, grid: ScheduleGrid) -> Result<Self> {
        if grid.num_days() != calendar.num_days() {
            return Err(RosterError::InvalidState(format!(
                "grid covers {} days, calendar has {}",
                grid.num_days(),
                calendar.num_days()
            )));
        }

        let mut state = Self::new(calendar, roster, grid.posts_per_day());
        for (key, occupant) in grid.iter() {
            if let Some(worker) = occupant {
                state.assign(worker, key.day, key.post)?;
            }
        }

        let mut locked = BTreeSet::new();
        for profile in state.roster.iter() {
            for &date in &profile.mandatory_days {
                if let Ok(day) = state.calendar.day_index(date) {
                    if state.is_assigned(profile.id, day) {
                        locked.insert((profile.id, day));
                    }
                }
            }
        }
        state.locked = Arc::new(locked);
        state.generation = 0;
        Ok(state)
    }

    /// Builds a state from one row of optional worker ids per day.
    pub fn from_rows(
        calendar: Calendar,
        roster: Roster,
        rows: Vec<Vec<Option<WorkerId>>>,
    ) -> Result<Self> {
        Self::from_grid(calendar, roster, ScheduleGrid::from_rows(rows)?)
    }

    /// Locks an existing assignment so no strategy may move it.
    pub fn lock(&mut self, worker: WorkerId, day: DayIndex) -> Result<()> {
        if !self.is_assigned(worker, day) {
            return Err(RosterError::InvalidState(format!(
                "cannot lock {worker} on day {day}: not assigned"
            )));
        }
        Arc::make_mut(&mut self.locked).insert((worker, day));
        Ok(())
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn grid(&self) -> &ScheduleGrid {
        &self.grid
    }

    pub fn num_days(&self) -> usize {
        self.grid.num_days()
    }

    pub fn posts_per_day(&self) -> usize {
        self.grid.posts_per_day()
    }

    /// Monotonic counter bumped by every mutation and restore.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn occupant(&self, day: DayIndex, post: PostIndex) -> Result<Option<WorkerId>> {
        self.grid.get(day, post)
    }

    pub fn post_of(&self, worker: WorkerId, day: DayIndex) -> Option<PostIndex> {
        self.grid.post_of(worker, day)
    }

    pub fn workers_on(&self, day: DayIndex) -> impl Iterator<Item = WorkerId> + '_ {
        self.grid.day(day).iter().flatten().copied()
    }

    pub fn is_assigned(&self, worker: WorkerId, day: DayIndex) -> bool {
        self.assignments
            .get(&worker)
            .is_some_and(|days| days.contains(&day))
    }

    /// Assigned days of `worker` in ascending order.
    pub fn assigned_days(&self, worker: WorkerId) -> impl Iterator<Item = DayIndex> + '_ {
        self.assignments
            .get(&worker)
            .into_iter()
            .flat_map(|days| days.iter().copied())
    }

    /// Assigned days that are not locked, in ascending order.
    pub fn movable_days(&self, worker: WorkerId) -> Vec<DayIndex> {
        self.assigned_days(worker)
            .filter(|&d| !self.is_locked(worker, d))
            .collect()
    }

    pub fn is_locked(&self, worker: WorkerId, day: DayIndex) -> bool {
        self.locked.contains(&(worker, day))
    }

    pub fn locked_pairs(&self) -> impl Iterator<Item = (WorkerId, DayIndex)> + '_ {
        self.locked.iter().copied()
    }

    pub fn locked_count(&self, worker: WorkerId) -> u32 {
        self.locked
            .range((worker, 0)..=(worker, DayIndex::MAX))
            .count() as u32
    }

    pub fn counters(&self, worker: WorkerId) -> Option<&WorkerCounters> {
        self.counters.get(&worker)
    }

    /// All assigned shifts, mandatory included.
    pub fn assigned_count(&self, worker: WorkerId) -> u32 {
        self.counters.get(&worker).map_or(0, |c| c.total)
    }

    /// Assigned shifts excluding locked ones.
    pub fn non_mandatory_count(&self, worker: WorkerId) -> u32 {
        self.assigned_count(worker)
            .saturating_sub(self.locked_count(worker))
    }

    /// Non-mandatory shifts on weekend-like days.
    pub fn weekend_count(&self, worker: WorkerId) -> u32 {
        self.assigned_days(worker)
            .filter(|&d| self.calendar.is_weekend_like(d) && !self.is_locked(worker, d))
            .count() as u32
    }

    /// All shifts on Saturdays and Sundays.
    pub fn sat_sun_count(&self, worker: WorkerId) -> u32 {
        self.assigned_days(worker)
            .filter(|&d| self.calendar.is_sat_sun(d))
            .count() as u32
    }

    /// Non-mandatory shifts in the calendar month containing `day`.
    pub fn month_count(&self, worker: WorkerId, day: DayIndex) -> u32 {
        self.assigned_days(worker)
            .filter(|&d| self.calendar.same_month(d, day) && !self.is_locked(worker, d))
            .count() as u32
    }

    /// `non_mandatory - target`, recomputed on every call.
    pub fn deviation(&self, worker: WorkerId) -> Result<i64> {
        let profile = self.roster.get(worker)?;
        Ok(i64::from(self.non_mandatory_count(worker)) - i64::from(profile.target_shifts))
    }

    /// Deviation as a percentage of target; 0 for a zero target.
    pub fn deviation_pct(&self, worker: WorkerId) -> Result<f64> {
        let profile = self.roster.get(worker)?;
        if profile.target_shifts == 0 {
            return Ok(0.0);
        }
        Ok(self.deviation(worker)? as f64 / f64::from(profile.target_shifts) * 100.0)
    }

    pub fn empty_slots(&self) -> Vec<SlotKey> {
        self.grid.empty_slots()
    }

    pub fn count_empty(&self) -> usize {
        self.grid.count_empty()
    }

    /// Places `worker` into an empty slot.
    pub fn assign(&mut self, worker: WorkerId, day: DayIndex, post: PostIndex) -> Result<()> {
        self.roster.get(worker)?;
        if let Some(current) = self.grid.get(day, post)? {
            return Err(RosterError::ConstraintViolation(format!(
                "slot (day {day}, post {post}) already held by {current}"
            )));
        }
        if self.is_assigned(worker, day) {
            return Err(RosterError::ConstraintViolation(format!(
                "{worker} already works on day {day}"
            )));
        }
        self.grid.set(day, post, Some(worker))?;
        self.add_assignment(worker, day, post);
        self.generation += 1;
        Ok(())
    }

    /// Empties a slot and returns the worker that held it.
    pub fn unassign(&mut self, day: DayIndex, post: PostIndex) -> Result<WorkerId> {
        let worker = self.grid.get(day, post)?.ok_or_else(|| {
            RosterError::InvalidTransfer(format!("slot (day {day}, post {post}) is empty"))
        })?;
        if self.is_locked(worker, day) {
            return Err(RosterError::ConstraintViolation(format!(
                "{worker} is locked on day {day}"
            )));
        }
        self.grid.set(day, post, None)?;
        self.remove_assignment(worker, day, post);
        self.generation += 1;
        Ok(worker)
    }

    /// Hands an occupied slot to another worker; returns the previous holder.
    pub fn reassign(&mut self, day: DayIndex, post: PostIndex, to: WorkerId) -> Result<WorkerId> {
        self.roster.get(to)?;
        let from = self.grid.get(day, post)?.ok_or_else(|| {
            RosterError::InvalidTransfer(format!("slot (day {day}, post {post}) is empty"))
        })?;
        if from == to {
            return Err(RosterError::InvalidTransfer(format!(
                "{to} already holds (day {day}, post {post})"
            )));
        }
        if self.is_locked(from, day) {
            return Err(RosterError::ConstraintViolation(format!(
                "{from} is locked on day {day}"
            )));
        }
        if self.is_assigned(to, day) {
            return Err(RosterError::ConstraintViolation(format!(
                "{to} already works on day {day}"
            )));
        }
        self.grid.set(day, post, Some(to))?;
        self.remove_assignment(from, day, post);
        self.add_assignment(to, day, post);
        self.generation += 1;
        Ok(from)
    }

    /// Exchanges the occupants of two posts on the same day.
    pub fn swap_posts(&mut self, day: DayIndex, a: PostIndex, b: PostIndex) -> Result<()> {
        let wa = self.grid.get(day, a)?;
        let wb = self.grid.get(day, b)?;
        for worker in [wa, wb].into_iter().flatten() {
            if self.is_locked(worker, day) {
                return Err(RosterError::ConstraintViolation(format!(
                    "{worker} is locked on day {day}"
                )));
            }
        }
        if a == b {
            return Ok(());
        }
        self.grid.set(day, a, wb)?;
        self.grid.set(day, b, wa)?;
        if let Some(w) = wa {
            self.move_post_counter(w, a, b);
        }
        if let Some(w) = wb {
            self.move_post_counter(w, b, a);
        }
        self.generation += 1;
        Ok(())
    }

    /// Takes an O(1) snapshot sharing storage with the live state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            grid: self.grid.clone(),
            assignments: Arc::clone(&self.assignments),
            counters: Arc::clone(&self.counters),
            generation: self.generation,
        }
    }

    /// True if no mutation happened since `snapshot` was taken.
    pub fn is_unchanged_since(&self, snapshot: &StateSnapshot) -> bool {
        self.generation == snapshot.generation
    }

    /// Replaces grid, assignments and counters with the snapshot's.
    ///
    /// # Errors
    ///
    /// Returns `RestoreFailed` without touching the state if the snapshot
    /// has a different shape or drops a locked assignment.
    pub fn restore(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        if snapshot.grid.num_days() != self.grid.num_days()
            || snapshot.grid.posts_per_day() != self.grid.posts_per_day()
        {
            return Err(RosterError::RestoreFailed(format!(
                "snapshot shape {}x{} does not match {}x{}",
                snapshot.grid.num_days(),
                snapshot.grid.posts_per_day(),
                self.grid.num_days(),
                self.grid.posts_per_day()
            )));
        }
        if let Some((worker, day)) = self
            .locked
            .iter()
            .find(|(w, d)| !snapshot.assignments.get(w).is_some_and(|s| s.contains(d)))
        {
            return Err(RosterError::RestoreFailed(format!(
                "snapshot drops locked assignment of {worker} on day {day}"
            )));
        }
        self.grid = snapshot.grid.clone();
        self.assignments = Arc::clone(&snapshot.assignments);
        self.counters = Arc::clone(&snapshot.counters);
        self.generation += 1;
        Ok(())
    }

    /// Checks that grid, assignment sets, counters and locks agree.
    pub fn verify_consistency(&self) -> Result<()> {
        let mut derived: BTreeMap<WorkerId, BTreeSet<DayIndex>> = BTreeMap::new();
        let mut totals: BTreeMap<WorkerId, u32> = BTreeMap::new();
        for (key, occupant) in self.grid.iter() {
            if let Some(worker) = occupant {
                if !derived.entry(worker).or_default().insert(key.day) {
                    return Err(RosterError::InvalidState(format!(
                        "{worker} appears twice on day {}",
                        key.day
                    )));
                }
                *totals.entry(worker).or_default() += 1;
            }
        }

        for (worker, days) in self.assignments.iter() {
            let grid_days = derived.get(worker);
            if days.is_empty() && grid_days.is_none() {
                continue;
            }
            if grid_days != Some(days) {
                return Err(RosterError::InvalidState(format!(
                    "assignment set of {worker} disagrees with grid"
                )));
            }
        }
        for worker in derived.keys() {
            if !self.assignments.contains_key(worker) {
                return Err(RosterError::InvalidState(format!(
                    "{worker} is in the grid but has no assignment set"
                )));
            }
        }

        for (worker, counters) in self.counters.iter() {
            let expected = totals.get(worker).copied().unwrap_or(0);
            if counters.total != expected {
                return Err(RosterError::InvalidState(format!(
                    "{worker} counter says {} shifts, grid has {expected}",
                    counters.total
                )));
            }
        }

        for (worker, day) in self.locked.iter() {
            if !self.is_assigned(*worker, *day) {
                return Err(RosterError::InvalidState(format!(
                    "locked assignment of {worker} on day {day} is gone"
                )));
            }
        }
        Ok(())
    }

    /// Grid content keyed by date.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, Vec<Option<WorkerId>>> {
        self.calendar
            .days()
            .map(|d| (self.calendar.date(d), self.grid.day(d).to_vec()))
            .collect()
    }

    fn add_assignment(&mut self, worker: WorkerId, day: DayIndex, post: PostIndex) {
        let weekend = self.calendar.is_weekend_like(day);
        let posts = self.grid.posts_per_day();
        Arc::make_mut(&mut self.assignments)
            .entry(worker)
            .or_default()
            .insert(day);
        let counters = Arc::make_mut(&mut self.counters).entry(worker).or_default();
        counters.total += 1;
        if weekend {
            counters.weekend += 1;
        }
        if counters.posts.len() < posts {
            counters.posts.resize(posts, 0);
        }
        counters.posts[post] += 1;
    }

    fn remove_assignment(&mut self, worker: WorkerId, day: DayIndex, post: PostIndex) {
        let weekend = self.calendar.is_weekend_like(day);
        if let Some(days) = Arc::make_mut(&mut self.assignments).get_mut(&worker) {
            days.remove(&day);
        }
        if let Some(counters) = Arc::make_mut(&mut self.counters).get_mut(&worker) {
            counters.total = counters.total.saturating_sub(1);
            if weekend {
                counters.weekend = counters.weekend.saturating_sub(1);
            }
            if let Some(count) = counters.posts.get_mut(post) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn move_post_counter(&mut self, worker: WorkerId, from: PostIndex, to: PostIndex) {
        let posts = self.grid.posts_per_day();
        if let Some(counters) = Arc::make_mut(&mut self.counters).get_mut(&worker) {
            if counters.posts.len() < posts {
                counters.posts.resize(posts, 0);
            }
            counters.posts[from] = counters.posts[from].saturating_sub(1);
            counters.posts[to] += 1;
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
