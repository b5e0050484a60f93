//! Completion Dispatcher - moves finished cars to the payment-waiting queue
//!
//! For every occupied bay whose car has all repairs done, creates exactly one
//! `CompletionRecord` per occupancy episode and frees the bay. The record is
//! the side effect that must never be lost: it is written first, and a failed
//! release is only logged (the next tick retries it).

use crate::application::{RepairTracker, SlotRegistry};
use crate::domain::{CompletionRecord, DomainError, EpisodeKey, RepairTask, TaskId};
use crate::error::Result;
use crate::port::{CarRepository, CompletionRepository, GarageEvent, IdProvider, Notifier};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Outcome of one dispatcher tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub occupied_slots: usize,
    pub records_created: usize,
    pub slots_released: usize,
    pub failures: usize,
}

/// What has already been queued for payment
///
/// Grows by one episode and its task ids per record and is never pruned, so
/// it is bounded by the `completion_records` table it is rebuilt from.
#[derive(Default)]
struct DispatchLedger {
    episodes: HashSet<EpisodeKey>,
    billed_tasks: HashSet<TaskId>,
}

impl DispatchLedger {
    fn record(&mut self, record: &CompletionRecord) {
        self.episodes.insert(record.episode_key());
        self.billed_tasks
            .extend(record.items.iter().map(|i| i.task_id.clone()));
    }
}

pub struct CompletionDispatcher {
    registry: Arc<SlotRegistry>,
    tracker: Arc<RepairTracker>,
    car_repo: Arc<dyn CarRepository>,
    completion_repo: Arc<dyn CompletionRepository>,
    notifier: Arc<dyn Notifier>,
    id_provider: Arc<dyn IdProvider>,
    ledger: Mutex<DispatchLedger>,
}

impl CompletionDispatcher {
    /// Create a dispatcher with an empty ledger
    pub fn new(
        registry: Arc<SlotRegistry>,
        tracker: Arc<RepairTracker>,
        car_repo: Arc<dyn CarRepository>,
        completion_repo: Arc<dyn CompletionRepository>,
        notifier: Arc<dyn Notifier>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            registry,
            tracker,
            car_repo,
            completion_repo,
            notifier,
            id_provider,
            ledger: Mutex::new(DispatchLedger::default()),
        }
    }

    /// Create a dispatcher whose ledger is rebuilt from persisted records,
    /// so a restart never queues the same episode twice
    pub async fn load(
        registry: Arc<SlotRegistry>,
        tracker: Arc<RepairTracker>,
        car_repo: Arc<dyn CarRepository>,
        completion_repo: Arc<dyn CompletionRepository>,
        notifier: Arc<dyn Notifier>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Result<Self> {
        let records = completion_repo.load_completion_records().await?;
        let dispatcher = Self::new(
            registry,
            tracker,
            car_repo,
            completion_repo,
            notifier,
            id_provider,
        );
        {
            let mut ledger = dispatcher.ledger.lock().await;
            for record in &records {
                ledger.record(record);
            }
        }

        info!(records = records.len(), "Completion dispatcher loaded");
        Ok(dispatcher)
    }

    /// Dispatch every occupied bay whose car is done
    ///
    /// Never fails: per-car problems are logged and counted in the report.
    pub async fn on_tick(&self, now_millis: i64) -> TickReport {
        let mut ledger = self.ledger.lock().await;
        let mut report = TickReport::default();

        for slot in self.registry.occupied_slots().await {
            let Some(car_id) = slot.car_id.clone() else {
                continue;
            };
            report.occupied_slots += 1;

            if !self.tracker.all_tasks_completed_for_car(&car_id).await {
                continue;
            }

            let key = EpisodeKey {
                car_id,
                slot_number: slot.slot_number,
                episode: slot.episode,
            };

            if !ledger.episodes.contains(&key) {
                let tasks: Vec<RepairTask> = self
                    .tracker
                    .tasks_for_car(&key.car_id)
                    .await
                    .into_iter()
                    .filter(|t| !ledger.billed_tasks.contains(&t.id))
                    .collect();

                if !tasks.iter().any(|t| t.is_completed()) {
                    // Only repairs from an earlier visit; nothing new to bill
                    debug!(
                        car_id = %key.car_id,
                        slot = key.slot_number,
                        "All repairs already billed, waiting for new work"
                    );
                    continue;
                }

                match self.create_record(&key, &tasks, now_millis).await {
                    Ok(record) => {
                        ledger.record(&record);
                        report.records_created += 1;
                        info!(
                            car_id = %record.car_id,
                            slot = record.slot_number,
                            episode = record.episode,
                            items = record.items.len(),
                            total_cents = record.total_cents,
                            "Car queued for payment"
                        );
                        self.notifier.notify(GarageEvent::CarReadyForPayment(record));
                    }
                    Err(e) => {
                        // Keep the car in its bay; retried next tick
                        error!(
                            car_id = %key.car_id,
                            slot = key.slot_number,
                            error = %e,
                            "Failed to create completion record"
                        );
                        report.failures += 1;
                        continue;
                    }
                }
            }

            match self.registry.release_episode(&key).await {
                Ok(_) => report.slots_released += 1,
                Err(e) => {
                    warn!(
                        car_id = %key.car_id,
                        slot = key.slot_number,
                        error = %e,
                        "Slot release after completion failed"
                    );
                    report.failures += 1;
                }
            }
        }

        if report.records_created > 0 || report.failures > 0 {
            debug!(?report, "Completion tick");
        }
        report
    }

    async fn create_record(
        &self,
        key: &EpisodeKey,
        tasks: &[RepairTask],
        now_millis: i64,
    ) -> Result<CompletionRecord> {
        let car = self
            .car_repo
            .find_car(&key.car_id)
            .await?
            .ok_or_else(|| DomainError::CarNotFound(key.car_id.clone()))?;

        let record = CompletionRecord::from_tasks(
            self.id_provider.generate_id(),
            car.client_reference(),
            tasks,
            key,
            now_millis,
        )?;
        self.completion_repo.save_completion_record(&record).await?;
        Ok(record)
    }
}
