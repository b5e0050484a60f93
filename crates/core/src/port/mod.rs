// Port Layer - Interfaces for external dependencies

pub mod car_repository;
pub mod completion_repository;
pub mod id_provider; // For deterministic testing
pub mod notifier;
pub mod repair_repository;
pub mod slot_repository;
pub mod time_provider;

// Re-exports
pub use car_repository::CarRepository;
pub use completion_repository::CompletionRepository;
pub use id_provider::IdProvider;
pub use notifier::{notification_channel, ChannelNotifier, GarageEvent, NotificationReceiver, Notifier};
pub use repair_repository::RepairRepository;
pub use slot_repository::SlotRepository;
pub use time_provider::TimeProvider;
