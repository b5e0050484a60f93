//! Slot Registry - occupancy of the fixed set of repair bays
//!
//! Guarantees at most one car per bay and one bay per car. Every mutation is
//! write-through: the registry lock is held across the repository write and
//! the in-memory copy is only replaced once the write succeeded.

use crate::domain::{DomainError, EpisodeKey, Slot, SlotNumber, SlotStatus};
use crate::error::{AppError, Result};
use crate::port::{CarRepository, SlotRepository, TimeProvider};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct SlotRegistry {
    slots: Mutex<Vec<Slot>>,
    slot_repo: Arc<dyn SlotRepository>,
    car_repo: Arc<dyn CarRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SlotRegistry {
    /// Load bays from persistence
    pub async fn load(
        slot_repo: Arc<dyn SlotRepository>,
        car_repo: Arc<dyn CarRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let mut slots = slot_repo.load_slots().await?;
        slots.sort_by_key(|s| s.slot_number);

        info!(slot_count = slots.len(), "Slot registry loaded");

        Ok(Self {
            slots: Mutex::new(slots),
            slot_repo,
            car_repo,
            time_provider,
        })
    }

    /// Put a car into an available bay
    ///
    /// # Errors
    /// - `SlotNotFound` for an unknown bay
    /// - `SlotUnavailable` (with the current occupant) if the bay is not available
    /// - `CarAlreadyAssigned` if the car already sits in another bay
    /// - `CarNotFound` if persistence does not know the car
    pub async fn assign(&self, slot_number: SlotNumber, car_id: &str) -> Result<Slot> {
        let mut slots = self.slots.lock().await;
        let idx = Self::index_of(&slots, slot_number)?;

        if !slots[idx].is_available() {
            return Err(DomainError::SlotUnavailable {
                slot: slot_number,
                status: slots[idx].status.to_string(),
                occupant: slots[idx].car_id.clone(),
            }
            .into());
        }

        if let Some(other) = slots.iter().find(|s| s.occupant() == Some(car_id)) {
            return Err(DomainError::CarAlreadyAssigned {
                car: car_id.to_string(),
                slot: other.slot_number,
            }
            .into());
        }

        if self.car_repo.find_car(car_id).await?.is_none() {
            return Err(DomainError::CarNotFound(car_id.to_string()).into());
        }

        let mut updated = slots[idx].clone();
        updated.occupy(car_id, self.time_provider.now_millis())?;
        let saved = self.persist(&mut slots, idx, &updated).await?;

        info!(
            slot = slot_number,
            car_id = %car_id,
            episode = saved.episode,
            "Slot assigned"
        );
        Ok(saved)
    }

    /// Free a bay
    ///
    /// # Errors
    /// - `SlotNotFound` for an unknown bay
    /// - `SlotAlreadyFree` if the bay is already available
    pub async fn release(&self, slot_number: SlotNumber) -> Result<Slot> {
        let mut slots = self.slots.lock().await;
        let idx = Self::index_of(&slots, slot_number)?;
        self.release_locked(&mut slots, idx).await
    }

    /// Free a bay only if it still holds the given occupancy episode
    ///
    /// Fails with `Conflict` when the bay was released and reassigned since
    /// the episode was observed, so a stale completion never evicts a newer car.
    pub async fn release_episode(&self, key: &EpisodeKey) -> Result<Slot> {
        let mut slots = self.slots.lock().await;
        let idx = Self::index_of(&slots, key.slot_number)?;

        let current = &slots[idx];
        if !current.is_available()
            && (current.occupant() != Some(key.car_id.as_str()) || current.episode != key.episode)
        {
            return Err(AppError::Conflict(format!(
                "Slot {} now holds car {:?} (episode {}), not car {} (episode {})",
                key.slot_number, current.car_id, current.episode, key.car_id, key.episode
            )));
        }

        self.release_locked(&mut slots, idx).await
    }

    /// Bay currently holding the car, if any
    pub async fn find_slot_for_car(&self, car_id: &str) -> Option<Slot> {
        self.slots
            .lock()
            .await
            .iter()
            .find(|s| s.occupant() == Some(car_id))
            .cloned()
    }

    /// Snapshot of every bay, ordered by slot number
    pub async fn slots(&self) -> Vec<Slot> {
        self.slots.lock().await.clone()
    }

    pub async fn available_slots(&self) -> Vec<Slot> {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|s| s.is_available())
            .cloned()
            .collect()
    }

    pub async fn occupied_slots(&self) -> Vec<Slot> {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|s| s.status == SlotStatus::Occupied)
            .cloned()
            .collect()
    }

    async fn release_locked(&self, slots: &mut Vec<Slot>, idx: usize) -> Result<Slot> {
        let mut updated = slots[idx].clone();
        let previous = updated.car_id.clone();
        updated.vacate(self.time_provider.now_millis())?;
        let saved = self.persist(slots, idx, &updated).await?;

        info!(
            slot = saved.slot_number,
            previous_car = ?previous,
            "Slot released"
        );
        Ok(saved)
    }

    /// Write-through: persist, then swap the in-memory copy
    async fn persist(&self, slots: &mut Vec<Slot>, idx: usize, updated: &Slot) -> Result<Slot> {
        match self.slot_repo.save_slot(updated).await {
            Ok(saved) => {
                slots[idx] = saved.clone();
                Ok(saved)
            }
            Err(AppError::Conflict(msg)) => {
                warn!(slot = updated.slot_number, reason = %msg, "Slot version conflict, reloading");
                match self.slot_repo.load_slots().await {
                    Ok(mut fresh) => {
                        fresh.sort_by_key(|s| s.slot_number);
                        *slots = fresh;
                    }
                    Err(e) => warn!(error = %e, "Slot reload after conflict failed"),
                }
                Err(AppError::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    fn index_of(slots: &[Slot], slot_number: SlotNumber) -> Result<usize> {
        slots
            .iter()
            .position(|s| s.slot_number == slot_number)
            .ok_or_else(|| DomainError::SlotNotFound(slot_number).into())
    }
}
