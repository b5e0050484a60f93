// Car Repository Port (Interface)

use crate::domain::Car;
use crate::error::Result;
use async_trait::async_trait;

/// Read access to cars (CRUD lives outside the scheduling core)
#[async_trait]
pub trait CarRepository: Send + Sync {
    async fn find_car(&self, car_id: &str) -> Result<Option<Car>>;

    async fn insert_car(&self, car: &Car) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryCarRepository {
        cars: Mutex<HashMap<String, Car>>,
    }

    impl InMemoryCarRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Build a repository pre-filled with cars
        pub fn with_cars(cars: impl IntoIterator<Item = Car>) -> Self {
            let repo = Self::new();
            {
                let mut map = repo.cars.lock().unwrap();
                for car in cars {
                    map.insert(car.id.clone(), car);
                }
            }
            repo
        }
    }

    #[async_trait]
    impl CarRepository for InMemoryCarRepository {
        async fn find_car(&self, car_id: &str) -> Result<Option<Car>> {
            Ok(self.cars.lock().unwrap().get(car_id).cloned())
        }

        async fn insert_car(&self, car: &Car) -> Result<()> {
            self.cars
                .lock()
                .unwrap()
                .insert(car.id.clone(), car.clone());
            Ok(())
        }
    }
}
