// Completion Record Repository Port (payment-waiting queue)

use crate::domain::CompletionRecord;
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for the payment-waiting queue
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Enqueue a record; a second record for the same episode is rejected
    async fn save_completion_record(&self, record: &CompletionRecord) -> Result<()>;

    /// All records, oldest first (used to rebuild the dispatch guard on startup)
    async fn load_completion_records(&self) -> Result<Vec<CompletionRecord>>;

    /// Records for one car, oldest first
    async fn find_for_car(&self, car_id: &str) -> Result<Vec<CompletionRecord>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryCompletionRepository {
        records: Mutex<Vec<CompletionRecord>>,
        fail_saves: AtomicBool,
    }

    impl InMemoryCompletionRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        pub fn count(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionRepository for InMemoryCompletionRepository {
        async fn save_completion_record(&self, record: &CompletionRecord) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::Database("injected save failure".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let key = record.episode_key();
            if records.iter().any(|r| r.episode_key() == key) {
                return Err(AppError::Conflict(format!(
                    "Completion record already exists for car {} (slot {}, episode {})",
                    record.car_id, record.slot_number, record.episode
                )));
            }
            records.push(record.clone());
            Ok(())
        }

        async fn load_completion_records(&self) -> Result<Vec<CompletionRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn find_for_car(&self, car_id: &str) -> Result<Vec<CompletionRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.car_id == car_id)
                .cloned()
                .collect())
        }
    }
}
