//! Worker profiles and the roster that owns them.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;

use crate::error::{Result, RosterError};

/// Identifier of a worker within a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Inclusive range of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DatePeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Read-only description of a worker during rebalancing.
///
/// `target_shifts` excludes mandatory shifts: deviation is measured on the
/// non-mandatory assignments only.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerProfile {
    pub id: WorkerId,
    pub name: String,
    pub target_shifts: u32,
    /// Contracted share of a full-time load, in percent (100 = full time).
    pub work_percentage: f64,
    pub incompatible_with: Vec<WorkerId>,
    pub mandatory_days: Vec<NaiveDate>,
    pub days_off: Vec<NaiveDate>,
    /// When non-empty, the worker is only available inside these periods.
    pub work_periods: Vec<DatePeriod>,
}

impl WorkerProfile {
    pub fn new(id: WorkerId, target_shifts: u32) -> Self {
        Self {
            id,
            name: id.to_string(),
            target_shifts,
            work_percentage: 100.0,
            incompatible_with: Vec::new(),
            mandatory_days: Vec::new(),
            days_off: Vec::new(),
            work_periods: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_work_percentage(mut self, pct: f64) -> Self {
        self.work_percentage = pct;
        self
    }

    pub fn with_incompatible(mut self, others: impl IntoIterator<Item = WorkerId>) -> Self {
        self.incompatible_with.extend(others);
        self
    }

    pub fn with_mandatory_days(mut self, days: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.mandatory_days.extend(days);
        self
    }

    pub fn with_days_off(mut self, days: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.days_off.extend(days);
        self
    }

    pub fn with_work_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.work_periods.push(DatePeriod::new(start, end));
        self
    }

    pub fn is_part_time(&self) -> bool {
        self.work_percentage < 100.0
    }

    /// False on days off and, when work periods are declared, outside them.
    pub fn is_available(&self, date: NaiveDate) -> bool {
        if self.days_off.contains(&date) {
            return false;
        }
        self.work_periods.is_empty() || self.work_periods.iter().any(|p| p.contains(date))
    }

    pub fn is_mandatory_on(&self, date: NaiveDate) -> bool {
        self.mandatory_days.contains(&date)
    }
}

/// The set of workers taking part in a run.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    workers: Vec<WorkerProfile>,
    index: HashMap<WorkerId, usize>,
}

impl Roster {
    /// Builds a roster, rejecting duplicate ids.
    pub fn new(workers: Vec<WorkerProfile>) -> Result<Self> {
        let mut index = HashMap::with_capacity(workers.len());
        for (i, w) in workers.iter().enumerate() {
            if index.insert(w.id, i).is_some() {
                return Err(RosterError::InvalidState(format!(
                    "duplicate worker id {}",
                    w.id
                )));
            }
        }
        Ok(Self { workers, index })
    }

    pub fn get(&self, id: WorkerId) -> Result<&WorkerProfile> {
        self.index
            .get(&id)
            .map(|&i| &self.workers[i])
            .ok_or(RosterError::WorkerNotFound(id))
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerProfile> {
        self.workers.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = WorkerId> + '_ {
        self.workers.iter().map(|w| w.id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Incompatibility is symmetric: either side declaring it is enough.
    pub fn are_incompatible(&self, a: WorkerId, b: WorkerId) -> bool {
        if a == b {
            return false;
        }
        let declares = |x: WorkerId, y: WorkerId| {
            self.get(x)
                .map(|w| w.incompatible_with.contains(&y))
                .unwrap_or(false)
        };
        declares(a, b) || declares(b, a)
    }
}
