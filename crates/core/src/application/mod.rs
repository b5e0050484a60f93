// Application Layer - Use Cases and Business Logic

pub mod completion_dispatcher;
pub mod recovery;
pub mod repair_tracker;
pub mod slot_registry;
pub mod tick_loop;

// Re-exports
pub use completion_dispatcher::{CompletionDispatcher, TickReport};
pub use recovery::{RecoveryReport, StartupRecovery};
pub use repair_tracker::RepairTracker;
pub use slot_registry::SlotRegistry;
pub use tick_loop::{shutdown_channel, ShutdownSender, ShutdownToken, TickLoop};
