// Domain Layer - Pure business logic and entities

pub mod car;
pub mod completion;
pub mod error;
pub mod repair;
pub mod slot;

/// Opaque car identifier (one identity scheme per deployment)
pub type CarId = String;

/// Repair task ID (UUID v4)
pub type TaskId = String;

/// Physical bay number, 1-based
pub type SlotNumber = u32;

// Re-exports
pub use car::{Car, ClientReference};
pub use completion::{CompletionItem, CompletionRecord, EpisodeKey};
pub use error::DomainError;
pub use repair::{InterventionRef, Milestone, RepairStatus, RepairTask};
pub use slot::{Slot, SlotStatus};
