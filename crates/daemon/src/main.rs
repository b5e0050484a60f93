//! Garage Scheduler - Main Entry Point
//! Repair-bay scheduling loop over SQLite

mod settings;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use garage_core::application::{
    shutdown_channel, CompletionDispatcher, RepairTracker, SlotRegistry, StartupRecovery, TickLoop,
};
use garage_core::port::id_provider::UuidProvider;
use garage_core::port::time_provider::SystemTimeProvider;
use garage_core::port::{
    notification_channel, GarageEvent, NotificationReceiver, SlotRepository, TimeProvider,
};
use garage_infra_sqlite::{
    create_pool, run_migrations, SqliteCarRepository, SqliteCompletionRepository,
    SqliteRepairRepository, SqliteSlotRepository,
};
use settings::{DaemonConfig, LogFormat};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (needed for the log format)
    let config = DaemonConfig::load().context("Failed to load configuration")?;

    // 2. Initialize logging
    init_tracing(config.log_format)?;
    info!("Garage Scheduler v{} starting...", VERSION);
    info!(
        db_path = %config.db_path,
        slot_count = config.slot_count,
        tick_interval_ms = config.tick_interval_ms,
        "Configuration loaded"
    );

    // 3. Initialize database
    if config.db_path != ":memory:" {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }
    let pool = create_pool(&config.database_url())
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let slot_repo = Arc::new(SqliteSlotRepository::new(pool.clone()));
    let repair_repo = Arc::new(SqliteRepairRepository::new(pool.clone()));
    let car_repo = Arc::new(SqliteCarRepository::new(pool.clone()));
    let completion_repo = Arc::new(SqliteCompletionRepository::new(pool.clone()));

    slot_repo
        .seed_slots(config.slot_count, time_provider.now_millis())
        .await
        .map_err(|e| anyhow::anyhow!("Slot seeding failed: {}", e))?;

    // 5. Run startup recovery
    info!("Running startup recovery...");
    let recovery =
        StartupRecovery::new(slot_repo.clone(), repair_repo.clone(), time_provider.clone());
    if let Err(e) = recovery.recover().await {
        error!(error = ?e, "Startup recovery failed");
    }

    // 6. Load components
    let (notifier, notifications) = notification_channel();
    let notifier = Arc::new(notifier);

    let registry = Arc::new(
        SlotRegistry::load(slot_repo, car_repo.clone(), time_provider.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Slot registry load failed: {}", e))?,
    );
    let tracker = Arc::new(
        RepairTracker::load(
            repair_repo,
            car_repo.clone(),
            notifier.clone(),
            id_provider.clone(),
            time_provider.clone(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Repair tracker load failed: {}", e))?,
    );
    let dispatcher = Arc::new(
        CompletionDispatcher::load(
            registry,
            tracker.clone(),
            car_repo,
            completion_repo,
            notifier,
            id_provider,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Completion dispatcher load failed: {}", e))?,
    );

    // 7. Start notification drain
    let drain_handle = tokio::spawn(drain_notifications(notifications));

    // 8. Start tick loop
    info!("Starting tick loop...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let tick_loop = TickLoop::new(tracker, dispatcher, time_provider, config.tick_interval());
    let loop_handle = tokio::spawn(async move {
        tick_loop.run(shutdown_rx).await;
    });

    info!("System ready. Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown: the drain ends once the loop (and its notifier) is gone
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, loop_handle).await.is_err() {
        error!("Tick loop did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, drain_handle).await;
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("garage=info"))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

/// Delivery side of the notification channel: logs every event
async fn drain_notifications(mut notifications: NotificationReceiver) {
    while let Some(event) = notifications.recv().await {
        match &event {
            GarageEvent::RepairHalfway(task) | GarageEvent::RepairCompleted(task) => {
                info!(
                    event = event.event_type(),
                    car_id = %event.car_id(),
                    task_id = %task.id,
                    intervention = %task.intervention.name,
                    "Notification"
                );
            }
            GarageEvent::CarReadyForPayment(record) => {
                info!(
                    event = event.event_type(),
                    car_id = %event.car_id(),
                    client = %record.client.client_name,
                    total_cents = record.total_cents,
                    "Notification"
                );
            }
        }
    }
    info!("Notification channel closed");
}
