// SQLite SlotRepository Implementation

use async_trait::async_trait;
use garage_core::domain::{Slot, SlotNumber, SlotStatus};
use garage_core::error::{AppError, Result};
use garage_core::port::SlotRepository;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{map_sqlx_error, out_of_range};

pub struct SqliteSlotRepository {
    pool: SqlitePool,
}

impl SqliteSlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotRepository for SqliteSlotRepository {
    async fn load_slots(&self) -> Result<Vec<Slot>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT slot_number, status, car_id, episode, version, updated_at
            FROM repair_slots
            ORDER BY slot_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SlotRow::into_slot).collect()
    }

    async fn save_slot(&self, slot: &Slot) -> Result<Slot> {
        // Optimistic concurrency: only update the version we read
        let result = sqlx::query(
            r#"
            UPDATE repair_slots
            SET status = ?, car_id = ?, episode = ?, updated_at = ?, version = version + 1
            WHERE slot_number = ? AND version = ?
            "#,
        )
        .bind(slot.status.to_string())
        .bind(&slot.car_id)
        .bind(slot.episode)
        .bind(slot.updated_at)
        .bind(i64::from(slot.slot_number))
        .bind(slot.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let stored: Option<i64> =
                sqlx::query_scalar("SELECT version FROM repair_slots WHERE slot_number = ?")
                    .bind(i64::from(slot.slot_number))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

            return Err(match stored {
                Some(version) => AppError::Conflict(format!(
                    "Slot {} version {} is stale (stored {})",
                    slot.slot_number, slot.version, version
                )),
                None => AppError::NotFound(format!("Slot {}", slot.slot_number)),
            });
        }

        let mut saved = slot.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn seed_slots(&self, count: u32, now_millis: i64) -> Result<u32> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut created = 0;

        for slot_number in 1..=count {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO repair_slots (slot_number, status, episode, version, updated_at)
                VALUES (?, ?, 0, 0, ?)
                "#,
            )
            .bind(i64::from(slot_number))
            .bind(SlotStatus::Available.to_string())
            .bind(now_millis)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            created += result.rows_affected() as u32;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        if created > 0 {
            info!(created, total = count, "Seeded repair slots");
        }
        Ok(created)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SlotRow {
    slot_number: i64,
    status: String,
    car_id: Option<String>,
    episode: i64,
    version: i64,
    updated_at: i64,
}

impl SlotRow {
    fn into_slot(self) -> Result<Slot> {
        let slot_number = SlotNumber::try_from(self.slot_number)
            .map_err(|_| out_of_range("repair_slots.slot_number", self.slot_number))?;

        Ok(Slot {
            slot_number,
            status: self.status.parse::<SlotStatus>()?,
            car_id: self.car_id,
            episode: self.episode,
            version: self.version,
            updated_at: self.updated_at,
        })
    }
}
