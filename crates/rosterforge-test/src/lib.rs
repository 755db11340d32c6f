//! Shared test fixtures for RosterForge crates.
//!
//! This crate provides schedule builders and ready-made scenarios for
//! testing. It depends on `rosterforge-core` only, so the solver can use it
//! as a dev-dependency without a cycle.
//!
//! - [`builder`] - fluent [`ScheduleBuilder`] for small hand-written schedules
//! - [`scenarios`] - fixed schedules with known imbalances
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! rosterforge-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use rosterforge_test::{imbalanced_pair_scenario, ScheduleBuilder, A, B};
//! ```

pub mod builder;
pub mod scenarios;

// Re-export commonly used fixtures at crate root for convenience
pub use builder::{ScheduleBuilder, FIXTURE_START};
pub use scenarios::{
    balanced_scenario, bridge_scenario, chain_scenario, imbalanced_pair_scenario, pair_scenario,
    A, B, C, D,
};
