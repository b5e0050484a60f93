// Slot Repository Port (Interface)

use crate::domain::Slot;
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for repair bay persistence
///
/// `save_slot` is a compare-and-set on `version`: the stored row must still
/// carry `slot.version`, otherwise `AppError::Conflict` is returned. The saved
/// record comes back with its version bumped.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Load all bays ordered by slot number
    async fn load_slots(&self) -> Result<Vec<Slot>>;

    /// Persist a bay mutation (optimistic version check)
    async fn save_slot(&self, slot: &Slot) -> Result<Slot>;

    /// Create bays 1..=count that do not exist yet; returns how many were created
    async fn seed_slots(&self, count: u32, now_millis: i64) -> Result<u32>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory slot store with the same version semantics as SQLite
    #[derive(Default)]
    pub struct InMemorySlotRepository {
        slots: Mutex<BTreeMap<u32, Slot>>,
        fail_saves: AtomicBool,
    }

    impl InMemorySlotRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent `save_slot` fail with a database error
        pub fn set_fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        /// Overwrite a stored row behind the registry's back (simulates another writer)
        pub fn put_raw(&self, slot: Slot) {
            self.slots.lock().unwrap().insert(slot.slot_number, slot);
        }

        pub fn get(&self, slot_number: u32) -> Option<Slot> {
            self.slots.lock().unwrap().get(&slot_number).cloned()
        }
    }

    #[async_trait]
    impl SlotRepository for InMemorySlotRepository {
        async fn load_slots(&self) -> Result<Vec<Slot>> {
            Ok(self.slots.lock().unwrap().values().cloned().collect())
        }

        async fn save_slot(&self, slot: &Slot) -> Result<Slot> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::Database("injected save failure".to_string()));
            }
            let mut slots = self.slots.lock().unwrap();
            let stored = slots
                .get(&slot.slot_number)
                .ok_or_else(|| AppError::NotFound(format!("Slot {}", slot.slot_number)))?;
            if stored.version != slot.version {
                return Err(AppError::Conflict(format!(
                    "Slot {} version {} is stale (stored {})",
                    slot.slot_number, slot.version, stored.version
                )));
            }
            let mut saved = slot.clone();
            saved.version += 1;
            slots.insert(saved.slot_number, saved.clone());
            Ok(saved)
        }

        async fn seed_slots(&self, count: u32, now_millis: i64) -> Result<u32> {
            let mut slots = self.slots.lock().unwrap();
            let mut created = 0;
            for n in 1..=count {
                if !slots.contains_key(&n) {
                    slots.insert(n, Slot::new(n, now_millis));
                    created += 1;
                }
            }
            Ok(created)
        }
    }
}
