// Garage Infrastructure - SQLite Adapter
// Implements: SlotRepository, RepairRepository, CarRepository, CompletionRepository

mod car_repository;
mod completion_repository;
mod connection;
mod error;
mod migration;
mod repair_repository;
mod slot_repository;

pub use car_repository::SqliteCarRepository;
pub use completion_repository::SqliteCompletionRepository;
pub use connection::create_pool;
pub use migration::run_migrations;
pub use repair_repository::SqliteRepairRepository;
pub use slot_repository::SqliteSlotRepository;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
