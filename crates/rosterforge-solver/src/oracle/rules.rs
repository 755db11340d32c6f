//! Rule-based reference oracle.

use std::collections::BTreeMap;

use rosterforge_core::{DayIndex, PostIndex, ScheduleState, WorkerId, WorkerProfile};

use super::{Relaxation, ScheduleOracle};

/// Oracle enforcing availability, incompatibility, rest gaps, the
/// Mon-Thu weekday pattern and an emergency shift cap.
///
/// # Example
///
/// ```
/// use rosterforge_solver::oracle::{Relaxation, RuleOracle};
///
/// let oracle = RuleOracle::new(3);
/// assert_eq!(oracle.effective_gap(Relaxation::Strict), 3);
/// assert_eq!(oracle.effective_gap(Relaxation::Relaxed), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RuleOracle {
    min_gap: usize,
    weekday_pattern: bool,
    emergency_pct: f64,
    last_assignment: BTreeMap<WorkerId, DayIndex>,
    weekday_counts: BTreeMap<WorkerId, [u32; 7]>,
}

impl Default for RuleOracle {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RuleOracle {
    /// Creates an oracle requiring `min_gap` days between two shifts.
    pub fn new(min_gap: usize) -> Self {
        Self {
            min_gap: min_gap.max(1),
            weekday_pattern: true,
            emergency_pct: 12.0,
            last_assignment: BTreeMap::new(),
            weekday_counts: BTreeMap::new(),
        }
    }

    /// Only hard rules: one shift per day, availability, incompatibility.
    pub fn permissive() -> Self {
        Self::new(1).with_weekday_pattern(false)
    }

    pub fn with_weekday_pattern(mut self, enabled: bool) -> Self {
        self.weekday_pattern = enabled;
        self
    }

    pub fn with_emergency_pct(mut self, pct: f64) -> Self {
        self.emergency_pct = pct;
        self
    }

    pub fn min_gap(&self) -> usize {
        self.min_gap
    }

    /// Gap enforced at the given relaxation level.
    pub fn effective_gap(&self, relaxation: Relaxation) -> usize {
        match relaxation {
            Relaxation::Strict => self.min_gap,
            _ => self.min_gap.saturating_sub(2).max(1),
        }
    }

    /// Most recent assigned day of `worker`, as last reported.
    pub fn last_assignment(&self, worker: WorkerId) -> Option<DayIndex> {
        self.last_assignment.get(&worker).copied()
    }

    /// Shifts of `worker` on the weekday `weekday` (0 = Monday).
    pub fn weekday_count(&self, worker: WorkerId, weekday: usize) -> u32 {
        self.weekday_counts
            .get(&worker)
            .and_then(|counts| counts.get(weekday))
            .copied()
            .unwrap_or(0)
    }

    /// Hard ceiling on non-mandatory shifts at relaxation 0.
    pub fn emergency_cap(&self, profile: &WorkerProfile) -> u32 {
        let target = f64::from(profile.target_shifts);
        let factor = (self.emergency_pct / 100.0 * profile.work_percentage / 100.0).max(0.05);
        let cap = (target * (1.0 + factor)).round() as u32;
        cap.max(profile.target_shifts + 1)
    }

    fn weekday_of(state: &ScheduleState, day: DayIndex) -> usize {
        state.calendar().weekday(day)
    }
}

impl ScheduleOracle for RuleOracle {
    fn can_assign(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
        post: PostIndex,
        relaxation: Relaxation,
    ) -> f64 {
        if day >= state.num_days() || post >= state.posts_per_day() {
            return f64::NEG_INFINITY;
        }
        let Ok(profile) = state.roster().get(worker) else {
            return f64::NEG_INFINITY;
        };
        let calendar = state.calendar();
        if !profile.is_available(calendar.date(day)) || state.is_assigned(worker, day) {
            return f64::NEG_INFINITY;
        }
        if state
            .workers_on(day)
            .any(|other| state.roster().are_incompatible(worker, other))
        {
            return f64::NEG_INFINITY;
        }

        let gap = self.effective_gap(relaxation);
        let early = calendar.is_early_weekday(day);
        for assigned in state.assigned_days(worker) {
            let distance = assigned.abs_diff(day);
            if distance < gap {
                return f64::NEG_INFINITY;
            }
            if relaxation == Relaxation::Strict
                && self.weekday_pattern
                && early
                && (distance == 7 || distance == 14)
                && calendar.is_early_weekday(assigned)
            {
                return f64::NEG_INFINITY;
            }
        }

        let non_mandatory = state.non_mandatory_count(worker);
        if relaxation == Relaxation::Strict && non_mandatory + 1 > self.emergency_cap(profile) {
            return f64::NEG_INFINITY;
        }

        let deficit = f64::from(profile.target_shifts) - f64::from(non_mandatory);
        let mut score = 100.0 + deficit * 10.0;
        if let Some(counters) = state.counters(worker) {
            let held = counters.posts.get(post).copied().unwrap_or(0);
            if (held as usize) * state.posts_per_day() < counters.total as usize {
                score += 5.0;
            }
        }
        score -= 2.0 * f64::from(self.weekday_count(worker, Self::weekday_of(state, day)));
        if let Some(last) = self.last_assignment(worker) {
            score += last.abs_diff(day).min(7) as f64;
        }
        score
    }

    fn update_tracking_data(
        &mut self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
        _post: PostIndex,
        removing: bool,
    ) {
        let weekday = Self::weekday_of(state, day);
        let counts = self.weekday_counts.entry(worker).or_default();
        if removing {
            counts[weekday] = counts[weekday].saturating_sub(1);
        } else {
            counts[weekday] += 1;
        }
        match state.assigned_days(worker).last() {
            Some(last) => {
                self.last_assignment.insert(worker, last);
            }
            None => {
                self.last_assignment.remove(&worker);
            }
        }
    }

    /// Counts rest-gap breaches and incompatible pairs sharing a day.
    fn constraint_violations(&self, state: &ScheduleState) -> usize {
        let mut violations = 0;
        for worker in state.roster().ids() {
            let days: Vec<DayIndex> = state.assigned_days(worker).collect();
            violations += days
                .windows(2)
                .filter(|pair| pair[1] - pair[0] < self.min_gap)
                .count();
        }
        for day in 0..state.num_days() {
            let present: Vec<WorkerId> = state.workers_on(day).collect();
            for (i, &a) in present.iter().enumerate() {
                violations += present[i + 1..]
                    .iter()
                    .filter(|&&b| state.roster().are_incompatible(a, b))
                    .count();
            }
        }
        violations
    }

    fn reset_tracking(&mut self, state: &ScheduleState) {
        self.last_assignment.clear();
        self.weekday_counts.clear();
        for worker in state.roster().ids() {
            let mut counts = [0u32; 7];
            let mut last = None;
            for day in state.assigned_days(worker) {
                counts[Self::weekday_of(state, day)] += 1;
                last = Some(day);
            }
            self.weekday_counts.insert(worker, counts);
            if let Some(day) = last {
                self.last_assignment.insert(worker, day);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::is_forbidden;
    use rosterforge_test::{bridge_scenario, ScheduleBuilder, A, B, C, D};

    #[test]
    fn test_incompatible_occupant_forbids() {
        let state = bridge_scenario();
        let oracle = RuleOracle::permissive();
        // A holds day 0, B is incompatible with A
        let score = oracle.can_assign(&state, B, 0, 0, Relaxation::Strict);
        assert!(is_forbidden(score));
        // C is compatible with both occupants of day 0
        let score = oracle.can_assign(&state, C, 0, 0, Relaxation::Strict);
        assert!(!is_forbidden(score));
    }

    #[test]
    fn test_one_shift_per_day() {
        let state = bridge_scenario();
        let oracle = RuleOracle::permissive();
        let score = oracle.can_assign(&state, D, 0, 0, Relaxation::Emergency);
        assert_eq!(score, f64::NEG_INFINITY);
    }

    #[test]
    fn test_gap_relaxes_with_level() {
        let state = ScheduleBuilder::new(7, 1)
            .worker(WorkerProfile::new(A, 3))
            .assign(A, 0, 0)
            .build();
        let oracle = RuleOracle::new(3).with_weekday_pattern(false);
        assert!(oracle.can_assign(&state, A, 2, 0, Relaxation::Strict) == f64::NEG_INFINITY);
        assert!(oracle.can_assign(&state, A, 2, 0, Relaxation::Relaxed) > 0.0);
        assert!(oracle.can_assign(&state, A, 3, 0, Relaxation::Strict) > 0.0);
    }

    #[test]
    fn test_weekday_pattern_only_when_strict() {
        let state = ScheduleBuilder::new(14, 1)
            .worker(WorkerProfile::new(A, 4))
            .assign(A, 0, 0)
            .build();
        let oracle = RuleOracle::new(1);
        // Day 7 is the next Monday
        assert_eq!(
            oracle.can_assign(&state, A, 7, 0, Relaxation::Strict),
            f64::NEG_INFINITY
        );
        assert!(oracle.can_assign(&state, A, 7, 0, Relaxation::Relaxed) > 0.0);
        // Day 4 is a Friday, outside the pattern rule
        assert!(oracle.can_assign(&state, A, 4, 0, Relaxation::Strict) > 0.0);
    }

    #[test]
    fn test_emergency_cap_at_strict() {
        let state = ScheduleBuilder::new(4, 1)
            .worker(WorkerProfile::new(A, 2))
            .assign(A, 0, 0)
            .assign(A, 1, 0)
            .assign(A, 2, 0)
            .build();
        let oracle = RuleOracle::permissive();
        assert_eq!(oracle.emergency_cap(state.roster().get(A).unwrap()), 3);
        assert_eq!(
            oracle.can_assign(&state, A, 3, 0, Relaxation::Strict),
            f64::NEG_INFINITY
        );
        assert!(oracle.can_assign(&state, A, 3, 0, Relaxation::Relaxed) > 0.0);
    }

    #[test]
    fn test_days_off_forbid() {
        let base = ScheduleBuilder::new(3, 1);
        let day_off = base.date(1);
        let state = base
            .worker(WorkerProfile::new(A, 1).with_days_off([day_off]))
            .build();
        let oracle = RuleOracle::permissive();
        assert_eq!(
            oracle.can_assign(&state, A, 1, 0, Relaxation::Emergency),
            f64::NEG_INFINITY
        );
        assert!(oracle.can_assign(&state, A, 2, 0, Relaxation::Strict) > 0.0);
    }

    #[test]
    fn test_tracking_follows_mutations() {
        let mut state = bridge_scenario();
        let mut oracle = RuleOracle::permissive();
        oracle.reset_tracking(&state);
        assert_eq!(oracle.last_assignment(A), Some(3));
        assert_eq!(oracle.weekday_count(A, 0), 1);

        state.reassign(3, 0, C).unwrap();
        oracle.update_tracking_data(&state, A, 3, 0, true);
        oracle.update_tracking_data(&state, C, 3, 0, false);
        assert_eq!(oracle.last_assignment(A), Some(2));
        assert_eq!(oracle.weekday_count(A, 3), 0);
        assert_eq!(oracle.weekday_count(C, 3), 1);
    }

    #[test]
    fn test_constraint_violations_counts_gaps() {
        let state = ScheduleBuilder::new(5, 1)
            .worker(WorkerProfile::new(A, 3))
            .assign(A, 0, 0)
            .assign(A, 1, 0)
            .assign(A, 4, 0)
            .build();
        assert_eq!(RuleOracle::new(2).constraint_violations(&state), 1);
        assert_eq!(RuleOracle::permissive().constraint_violations(&state), 0);
    }
}
