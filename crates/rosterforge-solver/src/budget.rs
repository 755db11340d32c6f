//! Iteration budgets derived from problem size.
//!
//! Complexity is `workers * posts * days`, scaled up by the share of
//! workers whose constraints make moves harder to find. Budgets come from
//! four complexity tiers and are then scaled by team size.

use rosterforge_config::RebalanceConfig;
use rosterforge_core::{Roster, ScheduleState};

/// Counts of workers that make a roster harder to balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintProfile {
    pub incompatible_workers: usize,
    pub part_time_workers: usize,
    /// Workers with days off, work periods or mandatory days.
    pub complex_availability: usize,
}

impl ConstraintProfile {
    pub fn from_roster(roster: &Roster) -> Self {
        let mut profile = Self::default();
        for worker in roster.iter() {
            if !worker.incompatible_with.is_empty() {
                profile.incompatible_workers += 1;
            }
            if worker.is_part_time() {
                profile.part_time_workers += 1;
            }
            if !worker.days_off.is_empty()
                || !worker.work_periods.is_empty()
                || !worker.mandatory_days.is_empty()
            {
                profile.complex_availability += 1;
            }
        }
        profile
    }

    pub fn factor(&self) -> f64 {
        self.incompatible_workers as f64 * 0.2
            + self.part_time_workers as f64 * 0.15
            + self.complex_availability as f64 * 0.1
    }
}

/// Loop budgets for one run.
///
/// # Example
///
/// ```
/// use rosterforge_solver::budget::{ConstraintProfile, IterationBudget};
///
/// let budget = IterationBudget::adaptive(20, 5, 30, &ConstraintProfile::default());
/// assert_eq!(budget.complexity, 3000.0);
/// assert_eq!(budget.main_loops, 20);
/// assert_eq!(budget.balance_iterations, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationBudget {
    pub main_loops: u32,
    pub fill_attempts: u32,
    pub balance_iterations: u32,
    pub weekend_passes: u32,
    pub complexity: f64,
}

impl IterationBudget {
    pub fn adaptive(
        workers: usize,
        posts: usize,
        days: usize,
        constraints: &ConstraintProfile,
    ) -> Self {
        let complexity = (workers * posts * days) as f64 * (1.0 + constraints.factor());
        let (main_loops, fill_attempts, balance_iterations, weekend_passes) = if complexity < 1000.0
        {
            (10, 8, 5, 5)
        } else if complexity < 5000.0 {
            (20, 16, 10, 10)
        } else if complexity < 15000.0 {
            (75, 60, 40, 30)
        } else {
            (100, 80, 50, 40)
        };

        let multiplier = team_multiplier(workers);
        let scale = |value: u32, min: u32| ((f64::from(value) * multiplier) as u32).max(min);
        Self {
            main_loops: scale(main_loops, 2),
            fill_attempts: scale(fill_attempts, 1),
            balance_iterations: scale(balance_iterations, 2),
            weekend_passes: scale(weekend_passes, 1),
            complexity,
        }
    }

    /// Budget for an existing schedule.
    pub fn for_state(state: &ScheduleState) -> Self {
        Self::adaptive(
            state.roster().len(),
            state.posts_per_day(),
            state.num_days(),
            &ConstraintProfile::from_roster(state.roster()),
        )
    }

    /// Writes the loop and strict-balance iteration limits into `config`.
    pub fn apply(&self, config: &mut RebalanceConfig) {
        config.max_iterations = self.main_loops;
        config.strict_balance.max_iterations = self.balance_iterations;
    }
}

fn team_multiplier(workers: usize) -> f64 {
    if workers > 50 {
        1.4
    } else if workers > 30 {
        1.2
    } else if workers > 15 {
        1.0
    } else if workers > 8 {
        0.9
    } else {
        0.8
    }
}
