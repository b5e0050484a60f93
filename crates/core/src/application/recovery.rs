// Startup recovery of persisted bay and repair state
use crate::domain::{RepairStatus, Slot, SlotStatus};
use crate::error::Result;
use crate::port::{RepairRepository, SlotRepository, TimeProvider};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// What a recovery pass repaired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub slots_repaired: usize,
    pub tasks_reset: usize,
    pub tasks_backfilled: usize,
}

/// Startup recovery service
///
/// Runs once before the registry and tracker load, normalizing state a crash
/// (or a hand-edited database) can leave behind.
pub struct StartupRecovery {
    slot_repo: Arc<dyn SlotRepository>,
    repair_repo: Arc<dyn RepairRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl StartupRecovery {
    pub fn new(
        slot_repo: Arc<dyn SlotRepository>,
        repair_repo: Arc<dyn RepairRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            slot_repo,
            repair_repo,
            time_provider,
        }
    }

    /// Repair inconsistent slots and tasks
    ///
    /// Rules:
    /// 1. Only an occupied slot may name a car, otherwise the slot becomes available
    /// 2. A car listed in several slots keeps the lowest-numbered one
    /// 3. An active task without `started_at` goes back to pending
    /// 4. A completed task without `started_at` gets its completion time (or now)
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let slots_repaired = self.recover_slots().await?;
        let (tasks_reset, tasks_backfilled) = self.recover_tasks().await?;
        let report = RecoveryReport {
            slots_repaired,
            tasks_reset,
            tasks_backfilled,
        };

        if report == RecoveryReport::default() {
            info!("Startup recovery: state consistent");
        } else {
            info!(
                slots_repaired = report.slots_repaired,
                tasks_reset = report.tasks_reset,
                tasks_backfilled = report.tasks_backfilled,
                "Startup recovery complete"
            );
        }
        Ok(report)
    }

    async fn recover_slots(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let mut slots = self.slot_repo.load_slots().await?;
        slots.sort_by_key(|s| s.slot_number);

        let mut seen_cars = HashSet::new();
        let mut repaired = 0;

        for slot in slots {
            let reason = match (&slot.status, &slot.car_id) {
                (SlotStatus::Occupied, None) => Some("occupied without a car"),
                (SlotStatus::Available, Some(_)) => Some("available but names a car"),
                (SlotStatus::WaitingPayment, Some(_)) => Some("waiting payment but names a car"),
                (SlotStatus::Occupied, Some(car)) if !seen_cars.insert(car.clone()) => {
                    Some("car already holds a lower-numbered slot")
                }
                _ => None,
            };

            if let Some(reason) = reason {
                warn!(
                    slot = slot.slot_number,
                    car_id = ?slot.car_id,
                    status = %slot.status,
                    reason,
                    "Freeing inconsistent slot"
                );
                self.slot_repo.save_slot(&Self::freed(slot, now)).await?;
                repaired += 1;
            }
        }

        Ok(repaired)
    }

    /// Returns (tasks reset to pending, completed tasks given a start time)
    async fn recover_tasks(&self) -> Result<(usize, usize)> {
        let now = self.time_provider.now_millis();
        let mut reset = 0;
        let mut backfilled = 0;

        for mut task in self.repair_repo.load_tasks().await? {
            if task.status.is_active() && task.started_at.is_none() {
                warn!(
                    task_id = %task.id,
                    car_id = %task.car_id,
                    status = %task.status,
                    "Active repair without start time, resetting to pending"
                );
                task.status = RepairStatus::Pending;
                task.halfway_notified = false;
                task.completed_notified = false;
                self.repair_repo.save_task(&task).await?;
                reset += 1;
            } else if task.is_completed() && task.started_at.is_none() {
                let started_at = task.completed_at.unwrap_or(now);
                warn!(
                    task_id = %task.id,
                    car_id = %task.car_id,
                    started_at,
                    "Completed repair without start time, backfilling"
                );
                task.started_at = Some(started_at);
                self.repair_repo.save_task(&task).await?;
                backfilled += 1;
            }
        }

        Ok((reset, backfilled))
    }

    fn freed(mut slot: Slot, now_millis: i64) -> Slot {
        slot.status = SlotStatus::Available;
        slot.car_id = None;
        slot.updated_at = now_millis;
        slot
    }
}
