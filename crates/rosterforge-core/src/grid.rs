//! Flat `(day, post)` arena of slot assignments.

use std::sync::Arc;

use crate::calendar::DayIndex;
use crate::error::{Result, RosterError};
use crate::roster::WorkerId;

/// Post index within a day's roster.
pub type PostIndex = usize;

/// Coordinates of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub day: DayIndex,
    pub post: PostIndex,
}

impl SlotKey {
    pub fn new(day: DayIndex, post: PostIndex) -> Self {
        Self { day, post }
    }
}

/// Schedule grid stored as one contiguous arena of `Option<WorkerId>`.
///
/// The arena sits behind an `Arc`: cloning a grid is O(1) and the first
/// write after a clone copies the storage (copy-on-write). Every day has
/// exactly `posts_per_day` slots.
///
/// # Example
///
/// ```
/// use rosterforge_core::{ScheduleGrid, WorkerId};
///
/// let mut grid = ScheduleGrid::new(3, 2);
/// grid.set(1, 0, Some(WorkerId(7))).unwrap();
///
/// let snapshot = grid.clone();
/// assert!(grid.shares_storage_with(&snapshot));
///
/// grid.set(1, 1, Some(WorkerId(8))).unwrap();
/// assert!(!grid.shares_storage_with(&snapshot));
/// assert_eq!(snapshot.get(1, 1).unwrap(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleGrid {
    slots: Arc<Vec<Option<WorkerId>>>,
    num_days: usize,
    posts_per_day: usize,
}

impl ScheduleGrid {
    /// Creates an empty grid.
    pub fn new(num_days: usize, posts_per_day: usize) -> Self {
        Self {
            slots: Arc::new(vec![None; num_days * posts_per_day]),
            num_days,
            posts_per_day,
        }
    }

    /// Builds a grid from one row per day.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if rows have differing lengths.
    pub fn from_rows(rows: Vec<Vec<Option<WorkerId>>>) -> Result<Self> {
        let posts_per_day = rows.first().map_or(0, Vec::len);
        let num_days = rows.len();
        let mut slots = Vec::with_capacity(num_days * posts_per_day);
        for (day, row) in rows.into_iter().enumerate() {
            if row.len() != posts_per_day {
                return Err(RosterError::InvalidState(format!(
                    "day {day} has {} posts, expected {posts_per_day}",
                    row.len()
                )));
            }
            slots.extend(row);
        }
        Ok(Self {
            slots: Arc::new(slots),
            num_days,
            posts_per_day,
        })
    }

    pub fn num_days(&self) -> usize {
        self.num_days
    }

    pub fn posts_per_day(&self) -> usize {
        self.posts_per_day
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    fn offset(&self, day: DayIndex, post: PostIndex) -> Result<usize> {
        if day >= self.num_days || post >= self.posts_per_day {
            return Err(RosterError::SlotOutOfRange { day, post });
        }
        Ok(day * self.posts_per_day + post)
    }

    pub fn get(&self, day: DayIndex, post: PostIndex) -> Result<Option<WorkerId>> {
        let offset = self.offset(day, post)?;
        Ok(self.slots[offset])
    }

    /// Writes a slot and returns its previous content.
    pub fn set(
        &mut self,
        day: DayIndex,
        post: PostIndex,
        worker: Option<WorkerId>,
    ) -> Result<Option<WorkerId>> {
        let offset = self.offset(day, post)?;
        let slots = Arc::make_mut(&mut self.slots);
        Ok(std::mem::replace(&mut slots[offset], worker))
    }

    /// Slots of a single day, in post order.
    pub fn day(&self, day: DayIndex) -> &[Option<WorkerId>] {
        if day >= self.num_days {
            return &[];
        }
        let start = day * self.posts_per_day;
        &self.slots[start..start + self.posts_per_day]
    }

    /// Post held by `worker` on `day`, if any.
    pub fn post_of(&self, worker: WorkerId, day: DayIndex) -> Option<PostIndex> {
        self.day(day).iter().position(|s| *s == Some(worker))
    }

    /// Iterates every `(slot, occupant)` pair in day-major order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, Option<WorkerId>)> + '_ {
        let posts = self.posts_per_day.max(1);
        self.slots
            .iter()
            .enumerate()
            .map(move |(i, w)| (SlotKey::new(i / posts, i % posts), *w))
    }

    pub fn empty_slots(&self) -> Vec<SlotKey> {
        self.iter()
            .filter(|(_, w)| w.is_none())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn count_empty(&self) -> usize {
        self.slots.iter().filter(|w| w.is_none()).count()
    }

    /// True if both grids still point at the same arena.
    pub fn shares_storage_with(&self, other: &ScheduleGrid) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }
}
