// Domain Error Types

use thiserror::Error;

use super::{CarId, SlotNumber, TaskId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Slot {slot} is unavailable (status: {status}, occupant: {occupant:?})")]
    SlotUnavailable {
        slot: SlotNumber,
        status: String,
        occupant: Option<CarId>,
    },

    #[error("Car {car} already occupies slot {slot}")]
    CarAlreadyAssigned { car: CarId, slot: SlotNumber },

    #[error("Slot {0} is already free")]
    SlotAlreadyFree(SlotNumber),

    #[error("Slot not found: {0}")]
    SlotNotFound(SlotNumber),

    #[error("Repair task already started: {0}")]
    AlreadyStarted(TaskId),

    #[error("Repair task already completed: {0}")]
    AlreadyCompleted(TaskId),

    #[error("Repair task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Car not found: {0}")]
    CarNotFound(CarId),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
