//! RosterForge Core - schedule model for shift rebalancing
//!
//! This crate provides the data the rebalancing engine works on:
//! - Calendar and day classification (weekends, holidays)
//! - Worker profiles and the roster
//! - A flat `(day, post)` arena of slot assignments
//! - `ScheduleState`, the transactional, snapshot-able schedule

pub mod calendar;
pub mod error;
pub mod grid;
pub mod roster;
pub mod state;

pub use calendar::{Calendar, DayIndex};
pub use error::{Result, RosterError};
pub use grid::{PostIndex, ScheduleGrid, SlotKey};
pub use roster::{DatePeriod, Roster, WorkerId, WorkerProfile};
pub use state::{ScheduleState, StateSnapshot, WorkerCounters};
