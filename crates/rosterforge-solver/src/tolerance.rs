//! Tolerance bands and transfer validation.
//!
//! Every worker's non-mandatory shift count is compared against their
//! target. Within the objective band (±8% by default) a worker is fine,
//! within the emergency band (±12%) they are tolerated, beyond it they are
//! critical. Violation detection uses the integer bounds from [`bounds`],
//! which scale the band by the worker's work percentage.
//!
//! [`bounds`]: ToleranceClassifier::bounds

use std::cmp::Ordering;
use std::fmt;

use rosterforge_config::ToleranceConfig;
use rosterforge_core::{DayIndex, Result, RosterError, ScheduleState, WorkerId};

/// Deviation bucket of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TolerancePhase {
    /// Within the objective band.
    Objective,
    /// Outside the objective band but within the emergency band.
    Emergency,
    /// Beyond the emergency band; must not persist.
    Critical,
}

/// One worker measured against a target.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerClassification {
    pub worker: WorkerId,
    pub target: u32,
    pub assigned: u32,
    pub min: u32,
    pub max: u32,
    pub deviation: i64,
    pub deviation_pct: f64,
    pub phase: TolerancePhase,
}

impl WorkerClassification {
    /// True when the assigned count falls outside `[min, max]`.
    pub fn is_violation(&self) -> bool {
        self.assigned < self.min || self.assigned > self.max
    }

    pub fn is_over(&self) -> bool {
        self.assigned > self.max
    }

    pub fn is_under(&self) -> bool {
        self.assigned < self.min
    }
}

/// Workers grouped by tolerance phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceReport {
    pub within_objective: Vec<WorkerId>,
    pub within_emergency: Vec<WorkerId>,
    pub critical: Vec<WorkerId>,
    /// Largest absolute deviation, in percent.
    pub max_deviation: f64,
    /// Mean absolute deviation, in percent.
    pub avg_deviation: f64,
}

impl BalanceReport {
    pub fn is_balanced(&self) -> bool {
        self.critical.is_empty()
    }
}

/// Workers outside their objective bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationReport {
    pub general: Vec<WorkerClassification>,
    pub weekend: Vec<WorkerClassification>,
}

impl ViolationReport {
    pub fn total(&self) -> usize {
        self.general.len() + self.weekend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Why a transfer was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferApproval {
    BothImprove,
    SourceImproves,
    DestinationImproves,
}

impl fmt::Display for TransferApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferApproval::BothImprove => write!(f, "both workers improve"),
            TransferApproval::SourceImproves => write!(f, "source improves"),
            TransferApproval::DestinationImproves => write!(f, "destination improves"),
        }
    }
}

/// A suggested move of shifts from one worker to another.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecommendation {
    pub from: WorkerId,
    pub to: WorkerId,
    pub amount: u32,
    /// Sum of both workers' absolute deviation percentages.
    pub priority: f64,
}

/// Classifies workers against tolerance bands.
///
/// # Example
///
/// ```
/// use rosterforge_solver::ToleranceClassifier;
///
/// let classifier = ToleranceClassifier::default();
/// assert_eq!(classifier.bounds(20, 8.0, 100.0), (18, 22));
/// assert_eq!(classifier.bounds(0, 8.0, 100.0), (0, 0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceClassifier {
    objective_pct: f64,
    emergency_pct: f64,
    part_time_floor: f64,
}

impl Default for ToleranceClassifier {
    fn default() -> Self {
        Self::from_config(&ToleranceConfig::default())
    }
}

impl ToleranceClassifier {
    pub fn from_config(config: &ToleranceConfig) -> Self {
        Self {
            objective_pct: config.objective_pct,
            emergency_pct: config.emergency_pct,
            part_time_floor: config.part_time_floor,
        }
    }

    pub fn objective_pct(&self) -> f64 {
        self.objective_pct
    }

    pub fn emergency_pct(&self) -> f64 {
        self.emergency_pct
    }

    /// Integer `(min, max)` shift counts for a target at `phase_pct`.
    pub fn bounds(&self, target: u32, phase_pct: f64, work_pct: f64) -> (u32, u32) {
        if target == 0 {
            return (0, 0);
        }
        let target = f64::from(target);
        let scale = (work_pct / 100.0).max(self.part_time_floor);
        let tolerance = target * phase_pct / 100.0 * scale;
        let min = (target - tolerance).floor().max(0.0) as u32;
        let max = (target + tolerance + 0.5).floor() as u32;
        (min, max)
    }

    fn phase_of(&self, deviation_pct: f64) -> TolerancePhase {
        let magnitude = deviation_pct.abs();
        if magnitude <= self.objective_pct {
            TolerancePhase::Objective
        } else if magnitude <= self.emergency_pct {
            TolerancePhase::Emergency
        } else {
            TolerancePhase::Critical
        }
    }

    fn measure(
        &self,
        worker: WorkerId,
        target: u32,
        assigned: u32,
        work_pct: f64,
    ) -> WorkerClassification {
        let (min, max) = self.bounds(target, self.objective_pct, work_pct);
        let deviation = i64::from(assigned) - i64::from(target);
        let deviation_pct = pct(deviation, target);
        WorkerClassification {
            worker,
            target,
            assigned,
            min,
            max,
            deviation,
            deviation_pct,
            phase: self.phase_of(deviation_pct),
        }
    }

    /// Classifies a worker's non-mandatory shift count.
    pub fn classify(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
    ) -> Result<WorkerClassification> {
        let profile = state.roster().get(worker)?;
        Ok(self.measure(
            worker,
            profile.target_shifts,
            state.non_mandatory_count(worker),
            profile.work_percentage,
        ))
    }

    /// Weekend share of a worker's target.
    pub fn weekend_target(&self, state: &ScheduleState, target: u32) -> u32 {
        let days = state.num_days();
        if days == 0 {
            return 0;
        }
        let share = state.calendar().weekend_share_days() as f64 / days as f64;
        (f64::from(target) * share + 0.5).floor() as u32
    }

    /// Classifies a worker's weekend-like shifts against the weekend target.
    pub fn classify_weekend(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
    ) -> Result<WorkerClassification> {
        let profile = state.roster().get(worker)?;
        let target = self.weekend_target(state, profile.target_shifts);
        Ok(self.measure(
            worker,
            target,
            state.weekend_count(worker),
            profile.work_percentage,
        ))
    }

    /// Groups all workers by tolerance phase.
    pub fn validate_schedule(&self, state: &ScheduleState) -> Result<BalanceReport> {
        let mut report = BalanceReport::default();
        let mut total = 0.0;
        let mut count = 0usize;
        for worker in state.roster().ids() {
            let c = self.classify(state, worker)?;
            let magnitude = c.deviation_pct.abs();
            report.max_deviation = report.max_deviation.max(magnitude);
            total += magnitude;
            count += 1;
            match c.phase {
                TolerancePhase::Objective => report.within_objective.push(worker),
                TolerancePhase::Emergency => report.within_emergency.push(worker),
                TolerancePhase::Critical => report.critical.push(worker),
            }
        }
        if count > 0 {
            report.avg_deviation = total / count as f64;
        }
        Ok(report)
    }

    /// Workers outside their general or weekend objective bounds.
    pub fn violations(&self, state: &ScheduleState) -> Result<ViolationReport> {
        let mut report = ViolationReport::default();
        for worker in state.roster().ids() {
            let general = self.classify(state, worker)?;
            if general.is_violation() {
                report.general.push(general);
            }
            let weekend = self.classify_weekend(state, worker)?;
            if weekend.is_violation() {
                report.weekend.push(weekend);
            }
        }
        Ok(report)
    }

    /// Simulates moving one shift from `from` to `to`.
    ///
    /// Accepted when both deviations shrink, or when one shrinks and the
    /// other stays within the emergency band.
    ///
    /// # Errors
    ///
    /// `WorkerNotFound` for unknown workers, `InvalidTransfer` when the move
    /// would worsen balance.
    pub fn check_transfer_validity(
        &self,
        state: &ScheduleState,
        from: WorkerId,
        to: WorkerId,
    ) -> Result<TransferApproval> {
        let source = state.roster().get(from)?;
        let destination = state.roster().get(to)?;
        let from_dev = state.deviation(from)?;
        let to_dev = state.deviation(to)?;

        let from_before = pct(from_dev, source.target_shifts);
        let from_after = pct(from_dev - 1, source.target_shifts);
        let to_before = pct(to_dev, destination.target_shifts);
        let to_after = pct(to_dev + 1, destination.target_shifts);

        let source_improves = (from_dev - 1).abs() < from_dev.abs();
        let destination_improves = (to_dev + 1).abs() < to_dev.abs();
        let source_ok = from_after.abs() <= self.emergency_pct;
        let destination_ok = to_after.abs() <= self.emergency_pct;

        if source_improves && destination_improves {
            Ok(TransferApproval::BothImprove)
        } else if source_improves && destination_ok {
            Ok(TransferApproval::SourceImproves)
        } else if destination_improves && source_ok {
            Ok(TransferApproval::DestinationImproves)
        } else {
            Err(RosterError::InvalidTransfer(format!(
                "Transfer would worsen balance \
                 (from: {from_before:.1}%→{from_after:.1}%, to: {to_before:.1}%→{to_after:.1}%)"
            )))
        }
    }

    /// True if moving one shift keeps both workers inside their objective
    /// bounds.
    pub fn transfer_within_objective(
        &self,
        state: &ScheduleState,
        from: WorkerId,
        to: WorkerId,
    ) -> Result<bool> {
        let source = self.classify(state, from)?;
        let destination = self.classify(state, to)?;
        Ok(source.assigned > source.min && destination.assigned < destination.max)
    }

    /// True if both workers stay inside the emergency band after `from`
    /// hands one shift to `to`.
    pub fn stays_within_emergency(
        &self,
        state: &ScheduleState,
        from: WorkerId,
        to: WorkerId,
    ) -> Result<bool> {
        let source = state.roster().get(from)?;
        let destination = state.roster().get(to)?;
        let from_after = pct(state.deviation(from)? - 1, source.target_shifts);
        let to_after = pct(state.deviation(to)? + 1, destination.target_shifts);
        Ok(from_after.abs() <= self.emergency_pct && to_after.abs() <= self.emergency_pct)
    }

    /// True if `worker` can take one more weekend-like shift on `day`
    /// without leaving the emergency band of the weekend target.
    pub fn within_weekend_limit(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
    ) -> Result<bool> {
        if !state.calendar().is_weekend_like(day) {
            return Ok(true);
        }
        let profile = state.roster().get(worker)?;
        let target = self.weekend_target(state, profile.target_shifts);
        let (_, max) = self.bounds(target, self.emergency_pct, profile.work_percentage);
        Ok(state.weekend_count(worker) + 1 <= max)
    }

    /// True if `worker` can take one more shift in the month of `day`.
    ///
    /// The monthly share of the target is proportional to the month's days
    /// inside the period; one shift of slack is allowed above its emergency
    /// bound.
    pub fn within_monthly_limit(
        &self,
        state: &ScheduleState,
        worker: WorkerId,
        day: DayIndex,
    ) -> Result<bool> {
        let profile = state.roster().get(worker)?;
        let days = state.num_days().max(1) as f64;
        let month_days = state.calendar().days_in_month_of(day) as f64;
        let month_target = (f64::from(profile.target_shifts) * month_days / days).round() as u32;
        let (_, max) = self.bounds(month_target, self.emergency_pct, profile.work_percentage);
        Ok(state.month_count(worker, day) + 1 <= max + 1)
    }

    /// Pairs every over-assigned worker with every under-assigned one.
    pub fn rebalancing_recommendations(
        &self,
        state: &ScheduleState,
    ) -> Result<Vec<TransferRecommendation>> {
        self.suggest_adjustments(state, false)
    }

    /// Transfer suggestions for general (`weekend == false`) or weekend
    /// counts, highest priority first.
    pub fn suggest_adjustments(
        &self,
        state: &ScheduleState,
        weekend: bool,
    ) -> Result<Vec<TransferRecommendation>> {
        let mut over = Vec::new();
        let mut under = Vec::new();
        for worker in state.roster().ids() {
            let c = if weekend {
                self.classify_weekend(state, worker)?
            } else {
                self.classify(state, worker)?
            };
            if c.is_over() {
                over.push(c);
            } else if c.is_under() {
                under.push(c);
            }
        }

        let mut recommendations = Vec::with_capacity(over.len() * under.len());
        for source in &over {
            for destination in &under {
                let excess = source.deviation.unsigned_abs();
                let deficit = destination.deviation.unsigned_abs();
                recommendations.push(TransferRecommendation {
                    from: source.worker,
                    to: destination.worker,
                    amount: excess.min(deficit) as u32,
                    priority: source.deviation_pct.abs() + destination.deviation_pct.abs(),
                });
            }
        }
        recommendations.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(Ordering::Equal)
        });
        Ok(recommendations)
    }
}

fn pct(deviation: i64, target: u32) -> f64 {
    if target == 0 {
        0.0
    } else {
        deviation as f64 / f64::from(target) * 100.0
    }
}
