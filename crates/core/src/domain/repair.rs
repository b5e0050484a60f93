// Repair Task Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::{DomainError, Result};
use super::{CarId, TaskId};

/// Repair task state
///
/// Progression is monotonic: Pending -> InProgress -> Halfway -> Completed.
/// Cancelled is terminal and can be entered from any non-completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Pending,
    InProgress,
    Halfway,
    Completed,
    Cancelled,
}

impl RepairStatus {
    /// Started and still counting down
    pub fn is_active(&self) -> bool {
        matches!(self, RepairStatus::InProgress | RepairStatus::Halfway)
    }
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairStatus::Pending => write!(f, "pending"),
            RepairStatus::InProgress => write!(f, "in_progress"),
            RepairStatus::Halfway => write!(f, "halfway"),
            RepairStatus::Completed => write!(f, "completed"),
            RepairStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for RepairStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RepairStatus::Pending),
            "in_progress" => Ok(RepairStatus::InProgress),
            "halfway" => Ok(RepairStatus::Halfway),
            "completed" => Ok(RepairStatus::Completed),
            "cancelled" => Ok(RepairStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "Unknown repair status: {}",
                other
            ))),
        }
    }
}

/// Snapshot of the intervention a task was scheduled from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionRef {
    pub name: String,
    pub price_cents: i64,
    pub duration_ms: i64,
}

impl InterventionRef {
    pub fn new(name: impl Into<String>, price_cents: i64, duration_ms: i64) -> Result<Self> {
        let intervention = Self {
            name: name.into(),
            price_cents,
            duration_ms,
        };
        intervention.validate()?;
        Ok(intervention)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Intervention name cannot be empty".to_string(),
            ));
        }
        if self.price_cents < 0 {
            return Err(DomainError::ValidationError(format!(
                "Intervention price cannot be negative: {}",
                self.price_cents
            )));
        }
        if self.duration_ms <= 0 {
            return Err(DomainError::ValidationError(format!(
                "Intervention duration must be positive: {}ms",
                self.duration_ms
            )));
        }
        Ok(())
    }
}

/// Checkpoint crossed by a single `advance` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Halfway,
    Completed,
}

/// One scheduled intervention against one car
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairTask {
    pub id: TaskId,
    pub car_id: CarId,
    pub intervention: InterventionRef,
    pub status: RepairStatus,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    pub halfway_notified: bool,
    pub completed_notified: bool,

    /// Optimistic concurrency counter, bumped by the repository on save
    pub version: i64,
}

impl RepairTask {
    /// Create a pending task
    ///
    /// # Arguments
    ///
    /// * `id` - Unique task ID (injected, not generated)
    /// * `car_id` - Car the intervention is performed on
    /// * `intervention` - Name, price and expected duration
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<TaskId>,
        car_id: impl Into<CarId>,
        intervention: InterventionRef,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            car_id: car_id.into(),
            intervention,
            status: RepairStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            halfway_notified: false,
            completed_notified: false,
            version: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RepairStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RepairStatus::Cancelled
    }

    /// Transition Pending -> InProgress with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != RepairStatus::Pending {
            return Err(DomainError::AlreadyStarted(self.id.clone()));
        }
        self.status = RepairStatus::InProgress;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Advance the task from elapsed time since `started_at`
    ///
    /// Returns the milestones crossed by this call, in order. Calling again
    /// with the same or an earlier `now` returns nothing and changes nothing.
    pub fn advance(&mut self, now_millis: i64) -> Vec<Milestone> {
        let mut reached = Vec::new();
        let Some(started_at) = self.started_at else {
            return reached;
        };
        if !self.status.is_active() {
            return reached;
        }

        // Saturating: a corrupt `started_at` or extreme `now` must not overflow
        let elapsed = now_millis.saturating_sub(started_at);
        let duration = self.intervention.duration_ms;

        if elapsed.saturating_mul(2) >= duration
            && self.status == RepairStatus::InProgress
            && !self.halfway_notified
        {
            self.status = RepairStatus::Halfway;
            self.halfway_notified = true;
            reached.push(Milestone::Halfway);
        }

        if elapsed >= duration && self.status != RepairStatus::Completed {
            self.status = RepairStatus::Completed;
            self.completed_notified = true;
            self.completed_at = Some(now_millis);
            reached.push(Milestone::Completed);
        }

        reached
    }

    /// Cancel the task
    ///
    /// Returns `false` if it was already cancelled.
    pub fn cancel(&mut self) -> Result<bool> {
        match self.status {
            RepairStatus::Completed => Err(DomainError::AlreadyCompleted(self.id.clone())),
            RepairStatus::Cancelled => Ok(false),
            _ => {
                self.status = RepairStatus::Cancelled;
                Ok(true)
            }
        }
    }

    /// Elapsed time since start, if started
    pub fn elapsed_ms(&self, now_millis: i64) -> Option<i64> {
        self.started_at
            .map(|s| now_millis.saturating_sub(s).max(0))
    }

    /// Progress through the expected duration, clamped to 0..=100
    pub fn progress_percent(&self, now_millis: i64) -> u8 {
        match self.status {
            RepairStatus::Completed => 100,
            RepairStatus::Pending => 0,
            _ => {
                let elapsed = self.elapsed_ms(now_millis).unwrap_or(0);
                let pct = elapsed.saturating_mul(100) / self.intervention.duration_ms.max(1);
                pct.clamp(0, 100) as u8
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_duration(duration_ms: i64) -> RepairTask {
        RepairTask::new(
            "task-1",
            "car-42",
            InterventionRef::new("Oil change", 4_500, duration_ms).unwrap(),
            0,
        )
    }

    #[test]
    fn test_intervention_validation() {
        assert!(InterventionRef::new("", 100, 1000).is_err());
        assert!(InterventionRef::new("Brakes", -1, 1000).is_err());
        assert!(InterventionRef::new("Brakes", 100, 0).is_err());
        assert!(InterventionRef::new("Brakes", 0, 1).is_ok());
    }

    #[test]
    fn test_start_sets_started_at() {
        let mut task = task_with_duration(100_000);
        assert!(task.started_at.is_none());

        task.start(5_000).unwrap();
        assert_eq!(task.status, RepairStatus::InProgress);
        assert_eq!(task.started_at, Some(5_000));

        assert_eq!(
            task.start(6_000),
            Err(DomainError::AlreadyStarted("task-1".to_string()))
        );
        assert_eq!(task.started_at, Some(5_000));
    }

    #[test]
    fn test_advance_pending_is_noop() {
        let mut task = task_with_duration(10);
        assert!(task.advance(1_000_000).is_empty());
        assert_eq!(task.status, RepairStatus::Pending);
    }

    #[test]
    fn test_advance_halfway_then_completed() {
        let mut task = task_with_duration(100_000);
        task.start(0).unwrap();

        assert!(task.advance(49_999).is_empty());
        assert_eq!(task.status, RepairStatus::InProgress);

        assert_eq!(task.advance(51_000), vec![Milestone::Halfway]);
        assert_eq!(task.status, RepairStatus::Halfway);
        assert!(task.halfway_notified);
        assert!(!task.completed_notified);

        // Earlier tick must not regress
        assert!(task.advance(49_000).is_empty());
        assert_eq!(task.status, RepairStatus::Halfway);

        assert_eq!(task.advance(100_000), vec![Milestone::Completed]);
        assert_eq!(task.status, RepairStatus::Completed);
        assert!(task.completed_notified);
        assert_eq!(task.completed_at, Some(100_000));
    }

    #[test]
    fn test_advance_is_idempotent() {
        let mut once = task_with_duration(10_000);
        once.start(0).unwrap();
        once.advance(6_000);

        let mut twice = once.clone();
        assert!(twice.advance(6_000).is_empty());
        assert_eq!(once, twice);

        twice.advance(20_000);
        let snapshot = twice.clone();
        assert!(twice.advance(20_000).is_empty());
        assert!(twice.advance(30_000).is_empty());
        assert_eq!(twice, snapshot);
    }

    #[test]
    fn test_advance_past_duration_crosses_both_milestones() {
        let mut task = task_with_duration(10_000);
        task.start(0).unwrap();

        assert_eq!(
            task.advance(25_000),
            vec![Milestone::Halfway, Milestone::Completed]
        );
        assert!(task.halfway_notified);
        assert!(task.completed_notified);
    }

    #[test]
    fn test_odd_duration_halfway_boundary() {
        let mut task = task_with_duration(11);
        task.start(0).unwrap();
        assert!(task.advance(5).is_empty());
        assert_eq!(task.advance(6), vec![Milestone::Halfway]);
    }

    #[test]
    fn test_advance_extreme_times_saturate() {
        let mut task = task_with_duration(10_000);
        task.start(1_000).unwrap();

        assert!(task.advance(i64::MIN).is_empty());
        assert_eq!(task.status, RepairStatus::InProgress);
        assert_eq!(task.progress_percent(i64::MIN), 0);

        assert_eq!(
            task.advance(i64::MAX),
            vec![Milestone::Halfway, Milestone::Completed]
        );
        assert_eq!(task.completed_at, Some(i64::MAX));

        // Corrupt start time far in the past
        let mut corrupt = task_with_duration(10_000);
        corrupt.start(i64::MIN).unwrap();
        assert_eq!(corrupt.progress_percent(0), 100);
        assert_eq!(
            corrupt.advance(0),
            vec![Milestone::Halfway, Milestone::Completed]
        );
    }

    #[test]
    fn test_cancel() {
        let mut task = task_with_duration(10_000);
        task.start(0).unwrap();
        assert_eq!(task.cancel(), Ok(true));
        assert!(task.is_cancelled());
        assert_eq!(task.cancel(), Ok(false));

        // Cancelled tasks do not advance
        assert!(task.advance(50_000).is_empty());
        assert_eq!(task.status, RepairStatus::Cancelled);

        let mut done = task_with_duration(10);
        done.start(0).unwrap();
        done.advance(10);
        assert_eq!(
            done.cancel(),
            Err(DomainError::AlreadyCompleted("task-1".to_string()))
        );
    }

    #[test]
    fn test_progress_percent() {
        let mut task = task_with_duration(200_000);
        assert_eq!(task.progress_percent(50_000), 0);

        task.start(0).unwrap();
        assert_eq!(task.progress_percent(50_000), 25);
        assert_eq!(task.progress_percent(500_000), 100);

        task.advance(200_000);
        assert_eq!(task.progress_percent(0), 100);
    }
}
