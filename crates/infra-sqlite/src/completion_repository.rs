// SQLite CompletionRepository Implementation (payment-waiting queue)

use async_trait::async_trait;
use garage_core::domain::{ClientReference, CompletionItem, CompletionRecord, SlotNumber};
use garage_core::error::Result;
use garage_core::port::CompletionRepository;
use sqlx::SqlitePool;

use crate::error::{map_sqlx_error, out_of_range};

const SELECT_RECORDS: &str = r#"
    SELECT id, car_id, client_id, client_name, items, total_cents,
           slot_number, episode, created_at
    FROM completion_records
"#;

pub struct SqliteCompletionRepository {
    pool: SqlitePool,
}

impl SqliteCompletionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompletionRepository for SqliteCompletionRepository {
    async fn save_completion_record(&self, record: &CompletionRecord) -> Result<()> {
        let items = serde_json::to_string(&record.items)?;

        // UNIQUE (car_id, slot_number, episode) turns a duplicate into Conflict
        sqlx::query(
            r#"
            INSERT INTO completion_records (
                id, car_id, client_id, client_name, items, total_cents,
                slot_number, episode, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.car_id)
        .bind(&record.client.client_id)
        .bind(&record.client.client_name)
        .bind(items)
        .bind(record.total_cents)
        .bind(i64::from(record.slot_number))
        .bind(record.episode)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn load_completion_records(&self) -> Result<Vec<CompletionRecord>> {
        let rows = sqlx::query_as::<_, CompletionRow>(&format!(
            "{} ORDER BY created_at ASC, rowid ASC",
            SELECT_RECORDS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CompletionRow::into_record).collect()
    }

    async fn find_for_car(&self, car_id: &str) -> Result<Vec<CompletionRecord>> {
        let rows = sqlx::query_as::<_, CompletionRow>(&format!(
            "{} WHERE car_id = ? ORDER BY created_at ASC, rowid ASC",
            SELECT_RECORDS
        ))
        .bind(car_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CompletionRow::into_record).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompletionRow {
    id: String,
    car_id: String,
    client_id: String,
    client_name: String,
    items: String, // JSON array of CompletionItem
    total_cents: i64,
    slot_number: i64,
    episode: i64,
    created_at: i64,
}

impl CompletionRow {
    fn into_record(self) -> Result<CompletionRecord> {
        let items: Vec<CompletionItem> = serde_json::from_str(&self.items)?;
        let slot_number = SlotNumber::try_from(self.slot_number)
            .map_err(|_| out_of_range("completion_records.slot_number", self.slot_number))?;

        Ok(CompletionRecord {
            id: self.id,
            car_id: self.car_id,
            client: ClientReference {
                client_id: self.client_id,
                client_name: self.client_name,
            },
            items,
            total_cents: self.total_cents,
            slot_number,
            episode: self.episode,
            created_at: self.created_at,
        })
    }
}
