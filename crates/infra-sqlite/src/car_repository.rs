// SQLite CarRepository Implementation

use async_trait::async_trait;
use garage_core::domain::Car;
use garage_core::error::Result;
use garage_core::port::CarRepository;
use sqlx::SqlitePool;

use crate::error::map_sqlx_error;

pub struct SqliteCarRepository {
    pool: SqlitePool,
}

impl SqliteCarRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CarRepository for SqliteCarRepository {
    async fn find_car(&self, car_id: &str) -> Result<Option<Car>> {
        let row = sqlx::query_as::<_, CarRow>(
            "SELECT id, client_id, client_name, license_plate FROM cars WHERE id = ?",
        )
        .bind(car_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CarRow::into_car))
    }

    async fn insert_car(&self, car: &Car) -> Result<()> {
        sqlx::query(
            "INSERT INTO cars (id, client_id, client_name, license_plate) VALUES (?, ?, ?, ?)",
        )
        .bind(&car.id)
        .bind(&car.client_id)
        .bind(&car.client_name)
        .bind(&car.license_plate)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CarRow {
    id: String,
    client_id: String,
    client_name: String,
    license_plate: String,
}

impl CarRow {
    fn into_car(self) -> Car {
        Car {
            id: self.id,
            client_id: self.client_id,
            client_name: self.client_name,
            license_plate: self.license_plate,
        }
    }
}
