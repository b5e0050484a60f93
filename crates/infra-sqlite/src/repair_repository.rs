// SQLite RepairRepository Implementation

use async_trait::async_trait;
use garage_core::domain::{InterventionRef, RepairStatus, RepairTask};
use garage_core::error::{AppError, Result};
use garage_core::port::RepairRepository;
use sqlx::SqlitePool;

use crate::error::map_sqlx_error;

const SELECT_TASKS: &str = r#"
    SELECT id, car_id, name, price_cents, duration_ms, status,
           created_at, started_at, completed_at,
           halfway_notified, completed_notified, version
    FROM repair_tasks
"#;

pub struct SqliteRepairRepository {
    pool: SqlitePool,
}

impl SqliteRepairRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepairRepository for SqliteRepairRepository {
    async fn load_tasks(&self) -> Result<Vec<RepairTask>> {
        // rowid follows insertion, which is billing order
        let rows = sqlx::query_as::<_, RepairTaskRow>(&format!("{} ORDER BY rowid ASC", SELECT_TASKS))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(RepairTaskRow::into_task).collect()
    }

    async fn load_tasks_for_car(&self, car_id: &str) -> Result<Vec<RepairTask>> {
        let rows = sqlx::query_as::<_, RepairTaskRow>(&format!(
            "{} WHERE car_id = ? ORDER BY rowid ASC",
            SELECT_TASKS
        ))
        .bind(car_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(RepairTaskRow::into_task).collect()
    }

    async fn insert_task(&self, task: &RepairTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repair_tasks (
                id, car_id, name, price_cents, duration_ms, status,
                created_at, started_at, completed_at,
                halfway_notified, completed_notified, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.car_id)
        .bind(&task.intervention.name)
        .bind(task.intervention.price_cents)
        .bind(task.intervention.duration_ms)
        .bind(task.status.to_string())
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.completed_at)
        .bind(task.halfway_notified)
        .bind(task.completed_notified)
        .bind(task.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn save_task(&self, task: &RepairTask) -> Result<RepairTask> {
        // Intervention snapshot is immutable once scheduled
        let result = sqlx::query(
            r#"
            UPDATE repair_tasks
            SET status = ?, started_at = ?, completed_at = ?,
                halfway_notified = ?, completed_notified = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(task.status.to_string())
        .bind(task.started_at)
        .bind(task.completed_at)
        .bind(task.halfway_notified)
        .bind(task.completed_notified)
        .bind(&task.id)
        .bind(task.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let stored: Option<i64> =
                sqlx::query_scalar("SELECT version FROM repair_tasks WHERE id = ?")
                    .bind(&task.id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

            return Err(match stored {
                Some(version) => AppError::Conflict(format!(
                    "Repair task {} version {} is stale (stored {})",
                    task.id, task.version, version
                )),
                None => AppError::NotFound(format!("Repair task {}", task.id)),
            });
        }

        let mut saved = task.clone();
        saved.version += 1;
        Ok(saved)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct RepairTaskRow {
    id: String,
    car_id: String,
    name: String,
    price_cents: i64,
    duration_ms: i64,
    status: String,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    halfway_notified: bool,
    completed_notified: bool,
    version: i64,
}

impl RepairTaskRow {
    fn into_task(self) -> Result<RepairTask> {
        Ok(RepairTask {
            id: self.id,
            car_id: self.car_id,
            intervention: InterventionRef {
                name: self.name,
                price_cents: self.price_cents,
                duration_ms: self.duration_ms,
            },
            status: self.status.parse::<RepairStatus>()?,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            halfway_notified: self.halfway_notified,
            completed_notified: self.completed_notified,
            version: self.version,
        })
    }
}
