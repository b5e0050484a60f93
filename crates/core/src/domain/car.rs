// Car Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::CarId;

/// Who pays for a car's repairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReference {
    pub client_id: String,
    pub client_name: String,
}

/// Car known to the garage (read-only for the scheduling core)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub client_id: String,
    pub client_name: String,
    pub license_plate: String,
}

impl Car {
    pub fn new(
        id: impl Into<CarId>,
        client_id: impl Into<String>,
        client_name: impl Into<String>,
        license_plate: impl Into<String>,
    ) -> Result<Self> {
        let car = Self {
            id: id.into(),
            client_id: client_id.into(),
            client_name: client_name.into(),
            license_plate: license_plate.into(),
        };
        if car.id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Car id cannot be empty".to_string(),
            ));
        }
        if car.client_id.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "Car {} has no client",
                car.id
            )));
        }
        Ok(car)
    }

    pub fn client_reference(&self) -> ClientReference {
        ClientReference {
            client_id: self.client_id.clone(),
            client_name: self.client_name.clone(),
        }
    }
}
