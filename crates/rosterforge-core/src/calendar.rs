//! Scheduling period and day classification.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{Result, RosterError};

/// Zero-based offset of a date from the start of the scheduling period.
pub type DayIndex = usize;

/// The inclusive date range being scheduled, plus its holidays.
///
/// Dates inside the arena are addressed by [`DayIndex`]; the calendar maps
/// between the two and answers weekend/holiday questions.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use rosterforge_core::Calendar;
///
/// let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(); // Monday
/// let end = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
/// let calendar = Calendar::new(start, end).unwrap();
///
/// assert_eq!(calendar.num_days(), 7);
/// assert!(!calendar.is_weekend_like(0));
/// assert!(calendar.is_weekend_like(4)); // Friday
/// assert!(calendar.is_sat_sun(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calendar {
    start: NaiveDate,
    end: NaiveDate,
    holidays: BTreeSet<NaiveDate>,
}

impl Calendar {
    /// Creates a calendar covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(RosterError::InvalidState(format!(
                "calendar end {end} precedes start {start}"
            )));
        }
        Ok(Self {
            start,
            end,
            holidays: BTreeSet::new(),
        })
    }

    /// Adds holidays. Dates outside the period are kept; they still make
    /// the preceding in-range day count as weekend-like.
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn holidays(&self) -> &BTreeSet<NaiveDate> {
        &self.holidays
    }

    /// Number of days in the period (inclusive).
    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Iterates every day index of the period.
    pub fn days(&self) -> impl Iterator<Item = DayIndex> {
        0..self.num_days()
    }

    /// Returns the date at `day`. Indices past the end extrapolate.
    pub fn date(&self, day: DayIndex) -> NaiveDate {
        self.start + Duration::days(day as i64)
    }

    /// Maps a date back to its index.
    pub fn day_index(&self, date: NaiveDate) -> Result<DayIndex> {
        if date < self.start || date > self.end {
            return Err(RosterError::DateOutOfRange(date));
        }
        Ok((date - self.start).num_days() as usize)
    }

    pub fn is_holiday(&self, day: DayIndex) -> bool {
        self.holidays.contains(&self.date(day))
    }

    /// Fri/Sat/Sun, a holiday, or the eve of a holiday.
    ///
    /// This is the definition used when counting a worker's weekend load.
    pub fn is_weekend_like(&self, day: DayIndex) -> bool {
        let date = self.date(day);
        date.weekday().num_days_from_monday() >= 4
            || self.holidays.contains(&date)
            || self.holidays.contains(&(date + Duration::days(1)))
    }

    /// Saturday or Sunday only.
    pub fn is_sat_sun(&self, day: DayIndex) -> bool {
        matches!(self.date(day).weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Weekday of `day`, 0 for Monday.
    pub fn weekday(&self, day: DayIndex) -> usize {
        self.date(day).weekday().num_days_from_monday() as usize
    }

    /// Monday to Thursday.
    pub fn is_early_weekday(&self, day: DayIndex) -> bool {
        self.date(day).weekday().num_days_from_monday() <= 3
    }

    /// Days that count towards the weekend share of a target: Fri/Sat/Sun
    /// and holidays (holiday eves are not included here).
    pub fn weekend_share_days(&self) -> usize {
        self.days()
            .filter(|&d| {
                let date = self.date(d);
                date.weekday().num_days_from_monday() >= 4 || self.holidays.contains(&date)
            })
            .count()
    }

    /// Number of in-period days that fall in the same month as `day`.
    pub fn days_in_month_of(&self, day: DayIndex) -> usize {
        let date = self.date(day);
        self.days()
            .filter(|&d| {
                let other = self.date(d);
                other.year() == date.year() && other.month() == date.month()
            })
            .count()
    }

    /// True if two day indices fall in the same calendar month.
    pub fn same_month(&self, a: DayIndex, b: DayIndex) -> bool {
        let (da, db) = (self.date(a), self.date(b));
        da.year() == db.year() && da.month() == db.month()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(Calendar::new(d(2025, 1, 10), d(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_day_index_roundtrip() {
        let cal = Calendar::new(d(2025, 1, 1), d(2025, 1, 31)).unwrap();
        assert_eq!(cal.num_days(), 31);
        assert_eq!(cal.day_index(d(2025, 1, 15)).unwrap(), 14);
        assert_eq!(cal.date(14), d(2025, 1, 15));
        assert_eq!(
            cal.day_index(d(2025, 2, 1)),
            Err(RosterError::DateOutOfRange(d(2025, 2, 1)))
        );
    }

    #[test]
    fn test_holiday_eve_is_weekend_like() {
        // 2025-01-06 is a Monday holiday; Sunday 5th and Monday 6th count, Tuesday does not.
        let cal = Calendar::new(d(2025, 1, 1), d(2025, 1, 31))
            .unwrap()
            .with_holidays([d(2025, 1, 6)]);
        let monday = cal.day_index(d(2025, 1, 6)).unwrap();
        let tuesday = cal.day_index(d(2025, 1, 7)).unwrap();
        let wednesday = cal.day_index(d(2025, 1, 1)).unwrap();

        assert!(cal.is_weekend_like(monday));
        assert!(!cal.is_weekend_like(tuesday));
        assert!(!cal.is_weekend_like(wednesday));
        assert!(cal.is_holiday(monday));
        assert!(!cal.is_sat_sun(monday));

        // Thursday before a Friday holiday becomes weekend-like
        let cal = cal.with_holidays([d(2025, 1, 17)]);
        assert!(cal.is_weekend_like(cal.day_index(d(2025, 1, 16)).unwrap()));
    }

    #[test]
    fn test_weekend_share_days() {
        // Two full weeks starting Monday
        let cal = Calendar::new(d(2025, 3, 3), d(2025, 3, 16)).unwrap();
        assert_eq!(cal.weekend_share_days(), 6);

        let cal = cal.with_holidays([d(2025, 3, 5)]);
        assert_eq!(cal.weekend_share_days(), 7);
    }

    #[test]
    fn test_days_in_month_of() {
        let cal = Calendar::new(d(2025, 1, 25), d(2025, 2, 3)).unwrap();
        assert_eq!(cal.days_in_month_of(0), 7);
        assert_eq!(cal.days_in_month_of(9), 3);
        assert!(cal.same_month(0, 6));
        assert!(!cal.same_month(6, 7));
    }
}
