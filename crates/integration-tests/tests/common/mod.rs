//! Shared wiring: the full garage over a real SQLite pool with a manual clock

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use garage_core::application::{
    CompletionDispatcher, RepairTracker, SlotRegistry, StartupRecovery, TickLoop,
};
use garage_core::domain::{Car, InterventionRef, RepairTask};
use garage_core::port::id_provider::UuidProvider;
use garage_core::port::notifier::mocks::RecordingNotifier;
use garage_core::port::time_provider::mocks::ManualTimeProvider;
use garage_core::port::{CarRepository, SlotRepository};
use garage_infra_sqlite::{
    create_pool, run_migrations, SqliteCarRepository, SqliteCompletionRepository,
    SqliteRepairRepository, SqliteSlotRepository,
};
use sqlx::SqlitePool;

pub struct Garage {
    pub pool: SqlitePool,
    pub clock: Arc<ManualTimeProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<SlotRegistry>,
    pub tracker: Arc<RepairTracker>,
    pub dispatcher: Arc<CompletionDispatcher>,
    pub tick_loop: TickLoop,
    pub completions: Arc<SqliteCompletionRepository>,
}

impl Garage {
    /// Fresh in-memory garage with `slots` bays and cars 42, 7 and 99
    pub async fn in_memory(slots: u32) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let cars = SqliteCarRepository::new(pool.clone());
        for (id, client) in [("42", "Alice"), ("7", "Bob"), ("99", "Carol")] {
            cars.insert_car(&Car::new(id, format!("client-{id}"), client, "AB-123-CD").unwrap())
                .await
                .unwrap();
        }

        Self::open(pool, slots, 0).await
    }

    /// Wire every component over an existing pool, the way the daemon does on startup
    pub async fn open(pool: SqlitePool, slots: u32, now_millis: i64) -> Self {
        let clock = Arc::new(ManualTimeProvider::new(now_millis));
        let notifier = Arc::new(RecordingNotifier::new());
        let ids = Arc::new(UuidProvider);

        let slot_repo = Arc::new(SqliteSlotRepository::new(pool.clone()));
        let repair_repo = Arc::new(SqliteRepairRepository::new(pool.clone()));
        let car_repo = Arc::new(SqliteCarRepository::new(pool.clone()));
        let completions = Arc::new(SqliteCompletionRepository::new(pool.clone()));

        slot_repo.seed_slots(slots, now_millis).await.unwrap();
        StartupRecovery::new(slot_repo.clone(), repair_repo.clone(), clock.clone())
            .recover()
            .await
            .unwrap();

        let registry = Arc::new(
            SlotRegistry::load(slot_repo, car_repo.clone(), clock.clone())
                .await
                .unwrap(),
        );
        let tracker = Arc::new(
            RepairTracker::load(
                repair_repo,
                car_repo.clone(),
                notifier.clone(),
                ids.clone(),
                clock.clone(),
            )
            .await
            .unwrap(),
        );
        let dispatcher = Arc::new(
            CompletionDispatcher::load(
                registry.clone(),
                tracker.clone(),
                car_repo,
                completions.clone(),
                notifier.clone(),
                ids,
            )
            .await
            .unwrap(),
        );
        let tick_loop = TickLoop::new(
            tracker.clone(),
            dispatcher.clone(),
            clock.clone(),
            Duration::from_millis(10),
        );

        Self {
            pool,
            clock,
            notifier,
            registry,
            tracker,
            dispatcher,
            tick_loop,
            completions,
        }
    }

    /// Schedule and start a repair now
    pub async fn start_repair(&self, car_id: &str, name: &str, price_cents: i64, secs: i64) -> RepairTask {
        let task = self
            .tracker
            .schedule(car_id, InterventionRef::new(name, price_cents, secs * 1000).unwrap())
            .await
            .unwrap();
        self.tracker.start(&task.id).await.unwrap()
    }
}

/// Unique throwaway database file
pub fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("garage_test_{}.db", uuid::Uuid::new_v4()))
}
