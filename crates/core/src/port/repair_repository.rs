// Repair Task Repository Port (Interface)

use crate::domain::RepairTask;
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for repair task persistence
#[async_trait]
pub trait RepairRepository: Send + Sync {
    /// Load every task in insertion order
    async fn load_tasks(&self) -> Result<Vec<RepairTask>>;

    /// Load one car's tasks in insertion order
    async fn load_tasks_for_car(&self, car_id: &str) -> Result<Vec<RepairTask>>;

    /// Insert a newly scheduled task
    async fn insert_task(&self, task: &RepairTask) -> Result<()>;

    /// Persist a task mutation (optimistic version check, returns bumped record)
    async fn save_task(&self, task: &RepairTask) -> Result<RepairTask>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory task store preserving insertion order
    #[derive(Default)]
    pub struct InMemoryRepairRepository {
        tasks: Mutex<Vec<RepairTask>>,
        fail_saves: AtomicBool,
    }

    impl InMemoryRepairRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        /// Overwrite a stored task as-is, bypassing the version check
        pub fn put_raw(&self, task: RepairTask) {
            let mut tasks = self.tasks.lock().unwrap();
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(stored) => *stored = task,
                None => tasks.push(task),
            }
        }

        pub fn get(&self, task_id: &str) -> Option<RepairTask> {
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
        }
    }

    #[async_trait]
    impl RepairRepository for InMemoryRepairRepository {
        async fn load_tasks(&self) -> Result<Vec<RepairTask>> {
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn load_tasks_for_car(&self, car_id: &str) -> Result<Vec<RepairTask>> {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.car_id == car_id)
                .cloned()
                .collect())
        }

        async fn insert_task(&self, task: &RepairTask) -> Result<()> {
            let mut tasks = self.tasks.lock().unwrap();
            if tasks.iter().any(|t| t.id == task.id) {
                return Err(AppError::Conflict(format!(
                    "Unique constraint violation: repair_tasks.id {}",
                    task.id
                )));
            }
            tasks.push(task.clone());
            Ok(())
        }

        async fn save_task(&self, task: &RepairTask) -> Result<RepairTask> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::Database("injected save failure".to_string()));
            }
            let mut tasks = self.tasks.lock().unwrap();
            let stored = tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or_else(|| AppError::NotFound(format!("Repair task {}", task.id)))?;
            if stored.version != task.version {
                return Err(AppError::Conflict(format!(
                    "Repair task {} version {} is stale (stored {})",
                    task.id, task.version, stored.version
                )));
            }
            let mut saved = task.clone();
            saved.version += 1;
            *stored = saved.clone();
            Ok(saved)
        }
    }
}
