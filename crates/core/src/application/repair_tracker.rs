//! Repair Tracker - per-car repair tasks and their time-driven progression
//!
//! Status advances on an external tick (`tick(now)`), never by sleeping per
//! task. Each transition is persisted before the in-memory copy changes, and
//! notifications go out only after the write succeeded, so a failed write is
//! retried on the next tick without double-notifying.

use crate::domain::{DomainError, InterventionRef, Milestone, RepairTask};
use crate::error::{AppError, Result};
use crate::port::{CarRepository, GarageEvent, IdProvider, Notifier, RepairRepository, TimeProvider};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Holds every task ever scheduled, finished ones included; each tick scans
/// the whole list, which stays small at the scale of one garage's history.
pub struct RepairTracker {
    // Insertion order is billing order
    tasks: Mutex<Vec<RepairTask>>,
    repair_repo: Arc<dyn RepairRepository>,
    car_repo: Arc<dyn CarRepository>,
    notifier: Arc<dyn Notifier>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RepairTracker {
    /// Load every task from persistence
    pub async fn load(
        repair_repo: Arc<dyn RepairRepository>,
        car_repo: Arc<dyn CarRepository>,
        notifier: Arc<dyn Notifier>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let tasks = repair_repo.load_tasks().await?;
        let active = tasks.iter().filter(|t| t.status.is_active()).count();

        info!(
            task_count = tasks.len(),
            active_tasks = active,
            "Repair tracker loaded"
        );

        Ok(Self {
            tasks: Mutex::new(tasks),
            repair_repo,
            car_repo,
            notifier,
            id_provider,
            time_provider,
        })
    }

    /// Schedule an intervention for a car as a new pending task
    pub async fn schedule(&self, car_id: &str, intervention: InterventionRef) -> Result<RepairTask> {
        intervention.validate()?;
        if self.car_repo.find_car(car_id).await?.is_none() {
            return Err(DomainError::CarNotFound(car_id.to_string()).into());
        }

        let task = RepairTask::new(
            self.id_provider.generate_id(),
            car_id,
            intervention,
            self.time_provider.now_millis(),
        );

        let mut tasks = self.tasks.lock().await;
        self.repair_repo.insert_task(&task).await?;
        tasks.push(task.clone());

        info!(
            task_id = %task.id,
            car_id = %car_id,
            intervention = %task.intervention.name,
            duration_ms = task.intervention.duration_ms,
            "Repair scheduled"
        );
        Ok(task)
    }

    /// Start a pending task now
    ///
    /// # Errors
    /// - `TaskNotFound` for an unknown id
    /// - `AlreadyStarted` if the task is not pending
    pub async fn start(&self, task_id: &str) -> Result<RepairTask> {
        let mut tasks = self.tasks.lock().await;
        let idx = Self::index_of(&tasks, task_id)?;

        let mut updated = tasks[idx].clone();
        updated.start(self.time_provider.now_millis())?;
        let saved = self.persist(&mut tasks, idx, &updated).await?;

        info!(task_id = %task_id, car_id = %saved.car_id, "Repair started");
        Ok(saved)
    }

    /// Advance one task against `now`
    ///
    /// Idempotent: repeating the call (or passing an earlier `now`) leaves the
    /// task untouched and emits nothing.
    pub async fn advance(&self, task_id: &str, now_millis: i64) -> Result<RepairTask> {
        let mut tasks = self.tasks.lock().await;
        let idx = Self::index_of(&tasks, task_id)?;
        let (task, _) = self.advance_locked(&mut tasks, idx, now_millis).await?;
        Ok(task)
    }

    /// Advance every running task; returns how many changed
    ///
    /// A failure on one task is logged and does not stop the others.
    pub async fn tick(&self, now_millis: i64) -> usize {
        let mut tasks = self.tasks.lock().await;
        let mut changed = 0;

        // A version conflict reloads the list, so re-check the bound every step
        let mut idx = 0;
        while idx < tasks.len() {
            if tasks[idx].status.is_active() {
                let task_id = tasks[idx].id.clone();
                match self.advance_locked(&mut tasks, idx, now_millis).await {
                    Ok((_, true)) => changed += 1,
                    Ok((_, false)) => {}
                    Err(e) => {
                        warn!(
                            task_id = %task_id,
                            error = %e,
                            "Failed to advance repair, will retry next tick"
                        );
                    }
                }
            }
            idx += 1;
        }

        if changed > 0 {
            debug!(changed, "Repair tick applied transitions");
        }
        changed
    }

    /// Cancel a task so it no longer blocks its car's completion
    ///
    /// # Errors
    /// - `TaskNotFound` for an unknown id
    /// - `AlreadyCompleted` for a finished task
    pub async fn cancel(&self, task_id: &str) -> Result<RepairTask> {
        let mut tasks = self.tasks.lock().await;
        let idx = Self::index_of(&tasks, task_id)?;

        let mut updated = tasks[idx].clone();
        if !updated.cancel()? {
            return Ok(updated);
        }
        let saved = self.persist(&mut tasks, idx, &updated).await?;

        info!(task_id = %task_id, car_id = %saved.car_id, "Repair cancelled");
        Ok(saved)
    }

    /// True iff the car has at least one non-cancelled task and all of them are completed
    pub async fn all_tasks_completed_for_car(&self, car_id: &str) -> bool {
        let tasks = self.tasks.lock().await;
        let mut relevant = tasks
            .iter()
            .filter(|t| t.car_id == car_id && !t.is_cancelled())
            .peekable();

        relevant.peek().is_some() && relevant.all(|t| t.is_completed())
    }

    /// The car's tasks in insertion order
    pub async fn tasks_for_car(&self, car_id: &str) -> Vec<RepairTask> {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.car_id == car_id)
            .cloned()
            .collect()
    }

    pub async fn task(&self, task_id: &str) -> Option<RepairTask> {
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
    }

    /// Returns the task and whether it changed
    async fn advance_locked(
        &self,
        tasks: &mut Vec<RepairTask>,
        idx: usize,
        now_millis: i64,
    ) -> Result<(RepairTask, bool)> {
        let mut updated = tasks[idx].clone();
        let reached = updated.advance(now_millis);
        if reached.is_empty() {
            return Ok((updated, false));
        }

        let saved = self.persist(tasks, idx, &updated).await?;

        for milestone in reached {
            match milestone {
                Milestone::Halfway => {
                    info!(task_id = %saved.id, car_id = %saved.car_id, "Repair halfway");
                    self.notifier.notify(GarageEvent::RepairHalfway(saved.clone()));
                }
                Milestone::Completed => {
                    info!(task_id = %saved.id, car_id = %saved.car_id, "Repair completed");
                    self.notifier
                        .notify(GarageEvent::RepairCompleted(saved.clone()));
                }
            }
        }

        Ok((saved, true))
    }

    /// Write-through: persist, then swap the in-memory copy
    async fn persist(
        &self,
        tasks: &mut Vec<RepairTask>,
        idx: usize,
        updated: &RepairTask,
    ) -> Result<RepairTask> {
        match self.repair_repo.save_task(updated).await {
            Ok(saved) => {
                tasks[idx] = saved.clone();
                Ok(saved)
            }
            Err(AppError::Conflict(msg)) => {
                warn!(
                    task_id = %updated.id,
                    car_id = %updated.car_id,
                    reason = %msg,
                    "Repair task version conflict, reloading the car's tasks"
                );
                match self.repair_repo.load_tasks_for_car(&updated.car_id).await {
                    Ok(fresh) => Self::merge_reloaded(tasks, fresh),
                    Err(e) => warn!(error = %e, "Task reload after conflict failed"),
                }
                Err(AppError::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Replace stale copies in place, append tasks we had never seen
    fn merge_reloaded(tasks: &mut Vec<RepairTask>, fresh: Vec<RepairTask>) {
        for task in fresh {
            match tasks.iter().position(|t| t.id == task.id) {
                Some(idx) => tasks[idx] = task,
                None => tasks.push(task),
            }
        }
    }

    fn index_of(tasks: &[RepairTask], task_id: &str) -> Result<usize> {
        tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Car, RepairStatus};
    use crate::port::car_repository::mocks::InMemoryCarRepository;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::notifier::mocks::RecordingNotifier;
    use crate::port::repair_repository::mocks::InMemoryRepairRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;

    struct Fixture {
        tracker: RepairTracker,
        repo: Arc<InMemoryRepairRepository>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualTimeProvider>,
    }

    async fn setup() -> Fixture {
        let repo = Arc::new(InMemoryRepairRepository::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualTimeProvider::new(0));
        let cars = Arc::new(InMemoryCarRepository::with_cars(vec![
            Car::new("42", "client-1", "Alice", "AB-123-CD").unwrap(),
            Car::new("99", "client-2", "Bob", "EF-456-GH").unwrap(),
        ]));
        let tracker = RepairTracker::load(
            repo.clone(),
            cars,
            notifier.clone(),
            Arc::new(SequentialIdProvider::new("task")),
            clock.clone(),
        )
        .await
        .unwrap();
        Fixture {
            tracker,
            repo,
            notifier,
            clock,
        }
    }

    fn intervention(name: &str, price_cents: i64, secs: i64) -> InterventionRef {
        InterventionRef::new(name, price_cents, secs * 1000).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_requires_known_car() {
        let f = setup().await;
        let task = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 100))
            .await
            .unwrap();
        assert_eq!(task.id, "task-1");
        assert_eq!(task.status, RepairStatus::Pending);
        assert!(f.repo.get("task-1").is_some());

        let err = f
            .tracker
            .schedule("nope", intervention("Oil change", 4_500, 100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::CarNotFound(ref c)) if c == "nope"
        ));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let f = setup().await;
        let task = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 100))
            .await
            .unwrap();

        f.tracker.start(&task.id).await.unwrap();
        let err = f.tracker.start(&task.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AlreadyStarted(_))
        ));

        let err = f.tracker.start("missing").await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_halfway_notifies_once_and_never_regresses() {
        let f = setup().await;
        let task = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 100))
            .await
            .unwrap();
        f.tracker.start(&task.id).await.unwrap();

        let t = f.tracker.advance(&task.id, 51_000).await.unwrap();
        assert_eq!(t.status, RepairStatus::Halfway);
        assert!(t.halfway_notified);

        // Same now again, then an out-of-order earlier tick
        f.tracker.advance(&task.id, 51_000).await.unwrap();
        let t = f.tracker.advance(&task.id, 49_000).await.unwrap();
        assert_eq!(t.status, RepairStatus::Halfway);

        assert_eq!(f.notifier.count_of("repair_halfway"), 1);
        assert_eq!(f.notifier.count_of("repair_completed"), 0);
    }

    #[tokio::test]
    async fn test_tick_completes_all_tasks_of_car() {
        let f = setup().await;
        let a = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 10))
            .await
            .unwrap();
        let b = f
            .tracker
            .schedule("42", intervention("Brake pads", 12_000, 20))
            .await
            .unwrap();
        f.tracker.start(&a.id).await.unwrap();
        f.tracker.start(&b.id).await.unwrap();

        assert!(!f.tracker.all_tasks_completed_for_car("42").await);

        assert_eq!(f.tracker.tick(25_000).await, 2);
        assert!(f.tracker.all_tasks_completed_for_car("42").await);
        assert_eq!(f.notifier.count_of("repair_completed"), 2);

        // Nothing left to do
        assert_eq!(f.tracker.tick(26_000).await, 0);
        assert_eq!(f.notifier.count_of("repair_completed"), 2);

        let tasks = f.tracker.tasks_for_car("42").await;
        assert_eq!(tasks[0].id, a.id);
        assert_eq!(tasks[1].id, b.id);
    }

    #[tokio::test]
    async fn test_car_without_tasks_is_never_complete() {
        let f = setup().await;
        assert!(!f.tracker.all_tasks_completed_for_car("99").await);
        assert!(f.tracker.tasks_for_car("99").await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_task_does_not_block_completion() {
        let f = setup().await;
        let a = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 10))
            .await
            .unwrap();
        let b = f
            .tracker
            .schedule("42", intervention("Paint", 90_000, 3_600))
            .await
            .unwrap();
        f.tracker.start(&a.id).await.unwrap();
        f.tracker.tick(10_000).await;
        assert!(!f.tracker.all_tasks_completed_for_car("42").await);

        f.tracker.cancel(&b.id).await.unwrap();
        assert!(f.tracker.all_tasks_completed_for_car("42").await);

        // Only cancelled tasks left is not "completed"
        let c = f
            .tracker
            .schedule("99", intervention("Wash", 1_000, 10))
            .await
            .unwrap();
        f.tracker.cancel(&c.id).await.unwrap();
        assert!(!f.tracker.all_tasks_completed_for_car("99").await);

        let err = f.tracker.cancel(&a.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_retries_next_tick_without_double_notify() {
        let f = setup().await;
        let task = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 10))
            .await
            .unwrap();
        f.clock.set(0);
        f.tracker.start(&task.id).await.unwrap();

        f.repo.set_fail_saves(true);
        assert_eq!(f.tracker.tick(6_000).await, 0);
        assert_eq!(
            f.tracker.task(&task.id).await.unwrap().status,
            RepairStatus::InProgress
        );
        assert_eq!(f.notifier.count_of("repair_halfway"), 0);

        f.repo.set_fail_saves(false);
        assert_eq!(f.tracker.tick(6_000).await, 1);
        assert_eq!(f.notifier.count_of("repair_halfway"), 1);
        assert_eq!(f.repo.get(&task.id).unwrap().status, RepairStatus::Halfway);
    }

    #[tokio::test]
    async fn test_version_conflict_reloads_only_that_car() {
        let f = setup().await;
        let a = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 10))
            .await
            .unwrap();
        let b = f
            .tracker
            .schedule("99", intervention("Wash", 1_000, 10))
            .await
            .unwrap();
        f.tracker.start(&a.id).await.unwrap();
        f.tracker.start(&b.id).await.unwrap();

        // Another writer cancelled car 42's repair behind the tracker's back
        let mut external = f.repo.get(&a.id).unwrap();
        external.status = RepairStatus::Cancelled;
        external.version += 1;
        f.repo.put_raw(external);

        assert_eq!(f.tracker.tick(6_000).await, 1);
        assert_eq!(
            f.tracker.task(&a.id).await.unwrap().status,
            RepairStatus::Cancelled
        );
        assert_eq!(
            f.tracker.task(&b.id).await.unwrap().status,
            RepairStatus::Halfway
        );
        assert_eq!(f.notifier.count_of("repair_halfway"), 1);

        // The refreshed copy no longer conflicts or advances
        assert_eq!(f.tracker.tick(20_000).await, 1);
        assert_eq!(f.tracker.tasks_for_car("42").await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_restores_persisted_tasks() {
        let f = setup().await;
        let task = f
            .tracker
            .schedule("42", intervention("Oil change", 4_500, 10))
            .await
            .unwrap();
        f.tracker.start(&task.id).await.unwrap();

        let reloaded = RepairTracker::load(
            f.repo.clone(),
            Arc::new(InMemoryCarRepository::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(SequentialIdProvider::new("other")),
            f.clock.clone(),
        )
        .await
        .unwrap();

        let restored = reloaded.task(&task.id).await.unwrap();
        assert_eq!(restored.status, RepairStatus::InProgress);
        assert_eq!(restored.started_at, Some(0));
    }
}
