// Tick Loop - drives time-based progression of the garage

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::{CompletionDispatcher, RepairTracker, TickReport};
use crate::port::TimeProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periodically advances repairs, then dispatches finished cars
pub struct TickLoop {
    tracker: Arc<RepairTracker>,
    dispatcher: Arc<CompletionDispatcher>,
    time_provider: Arc<dyn TimeProvider>,
    interval: Duration,
}

impl TickLoop {
    pub fn new(
        tracker: Arc<RepairTracker>,
        dispatcher: Arc<CompletionDispatcher>,
        time_provider: Arc<dyn TimeProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            tracker,
            dispatcher,
            time_provider,
            interval,
        }
    }

    /// Run one tick: tracker first, so the dispatcher sees this tick's completions
    pub async fn tick_once(&self) -> TickReport {
        let now = self.time_provider.now_millis();
        Self::tick_at(&self.tracker, &self.dispatcher, now).await
    }

    /// Run the loop until shutdown is signalled
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Tick loop started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {},
                _ = shutdown.wait() => {
                    info!("Tick loop interrupted while idle");
                    break;
                }
            }

            // A panic inside one tick must not kill the daemon
            let tracker = Arc::clone(&self.tracker);
            let dispatcher = Arc::clone(&self.dispatcher);
            let now = self.time_provider.now_millis();
            let handle =
                tokio::task::spawn(async move { Self::tick_at(&tracker, &dispatcher, now).await });

            match handle.await {
                Ok(report) => {
                    if report.records_created > 0 || report.failures > 0 {
                        info!(
                            occupied = report.occupied_slots,
                            records_created = report.records_created,
                            slots_released = report.slots_released,
                            failures = report.failures,
                            "Tick processed"
                        );
                    }
                }
                Err(join_err) if join_err.is_panic() => {
                    error!("Tick panicked: {:?}", join_err);
                }
                Err(join_err) => {
                    error!("Tick cancelled: {:?}", join_err);
                }
            }
        }

        info!("Tick loop stopped");
    }

    async fn tick_at(
        tracker: &RepairTracker,
        dispatcher: &CompletionDispatcher,
        now_millis: i64,
    ) -> TickReport {
        let advanced = tracker.tick(now_millis).await;
        let report = dispatcher.on_tick(now_millis).await;
        debug!(now_millis, advanced, "Tick");
        report
    }
}
