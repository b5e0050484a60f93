// Repair Slot Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::{DomainError, Result};
use super::{CarId, SlotNumber};

/// Slot occupancy state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Occupied,
    WaitingPayment,
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Occupied => write!(f, "occupied"),
            SlotStatus::WaitingPayment => write!(f, "waiting_payment"),
        }
    }
}

impl FromStr for SlotStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "occupied" => Ok(SlotStatus::Occupied),
            "waiting_payment" => Ok(SlotStatus::WaitingPayment),
            other => Err(DomainError::ValidationError(format!(
                "Unknown slot status: {}",
                other
            ))),
        }
    }
}

/// One physical repair bay
///
/// `car_id` is `Some` exactly when `status` is `Occupied`. Every successful
/// occupation starts a new `episode`, which is what completion records are
/// keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_number: SlotNumber,
    pub status: SlotStatus,
    pub car_id: Option<CarId>,
    pub episode: i64,

    /// Optimistic concurrency counter, bumped by the repository on save
    pub version: i64,
    pub updated_at: i64, // epoch ms
}

impl Slot {
    /// Create an empty bay
    pub fn new(slot_number: SlotNumber, now_millis: i64) -> Self {
        Self {
            slot_number,
            status: SlotStatus::Available,
            car_id: None,
            episode: 0,
            version: 0,
            updated_at: now_millis,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    pub fn occupant(&self) -> Option<&str> {
        self.car_id.as_deref()
    }

    /// Put a car in the bay, starting a new occupancy episode
    pub fn occupy(&mut self, car_id: impl Into<CarId>, now_millis: i64) -> Result<()> {
        if self.status != SlotStatus::Available {
            return Err(DomainError::SlotUnavailable {
                slot: self.slot_number,
                status: self.status.to_string(),
                occupant: self.car_id.clone(),
            });
        }
        self.status = SlotStatus::Occupied;
        self.car_id = Some(car_id.into());
        self.episode += 1;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Free the bay
    pub fn vacate(&mut self, now_millis: i64) -> Result<()> {
        if self.status == SlotStatus::Available {
            return Err(DomainError::SlotAlreadyFree(self.slot_number));
        }
        self.status = SlotStatus::Available;
        self.car_id = None;
        self.updated_at = now_millis;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupy_and_vacate() {
        let mut slot = Slot::new(1, 1000);
        assert!(slot.is_available());
        assert_eq!(slot.episode, 0);

        slot.occupy("car-42", 2000).unwrap();
        assert_eq!(slot.status, SlotStatus::Occupied);
        assert_eq!(slot.occupant(), Some("car-42"));
        assert_eq!(slot.episode, 1);
        assert_eq!(slot.updated_at, 2000);

        slot.vacate(3000).unwrap();
        assert!(slot.is_available());
        assert!(slot.car_id.is_none());
        // Episode survives release so the next occupation gets a fresh one
        assert_eq!(slot.episode, 1);
    }

    #[test]
    fn test_occupy_reports_current_occupant() {
        let mut slot = Slot::new(1, 0);
        slot.occupy("car-42", 10).unwrap();

        let err = slot.occupy("car-7", 20).unwrap_err();
        assert_eq!(
            err,
            DomainError::SlotUnavailable {
                slot: 1,
                status: "occupied".to_string(),
                occupant: Some("car-42".to_string()),
            }
        );
        assert_eq!(slot.occupant(), Some("car-42"));
    }

    #[test]
    fn test_vacate_free_slot_fails() {
        let mut slot = Slot::new(2, 0);
        assert_eq!(slot.vacate(10), Err(DomainError::SlotAlreadyFree(2)));
    }

    #[test]
    fn test_waiting_payment_is_not_assignable_but_releasable() {
        let mut slot = Slot::new(1, 0);
        slot.status = SlotStatus::WaitingPayment;

        assert!(matches!(
            slot.occupy("car-1", 10),
            Err(DomainError::SlotUnavailable { occupant: None, .. })
        ));
        assert!(slot.vacate(20).is_ok());
        assert!(slot.is_available());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            SlotStatus::Available,
            SlotStatus::Occupied,
            SlotStatus::WaitingPayment,
        ] {
            assert_eq!(status.to_string().parse::<SlotStatus>().unwrap(), status);
        }
        assert!("parked".parse::<SlotStatus>().is_err());
    }
}
