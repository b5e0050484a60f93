// Completion Record Domain Model (payment-waiting queue entry)

use serde::{Deserialize, Serialize};

use super::car::ClientReference;
use super::error::{DomainError, Result};
use super::repair::RepairTask;
use super::{CarId, SlotNumber, TaskId};

/// One billed line of a completion record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub task_id: TaskId,
    pub name: String,
    pub price_cents: i64,
}

/// Identifies one occupancy episode of one car in one bay
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpisodeKey {
    pub car_id: CarId,
    pub slot_number: SlotNumber,
    pub episode: i64,
}

/// Aggregate billing record created once all of a car's repairs are done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub car_id: CarId,
    pub client: ClientReference,
    pub items: Vec<CompletionItem>,
    pub total_cents: i64,

    // Occupancy episode this record closes
    pub slot_number: SlotNumber,
    pub episode: i64,

    pub created_at: i64, // epoch ms
}

impl CompletionRecord {
    /// Build a record from a car's task list
    ///
    /// Completed tasks are billed in the order given; cancelled tasks are
    /// skipped. Fails if any remaining task is unfinished or nothing is
    /// billable.
    pub fn from_tasks(
        id: impl Into<String>,
        client: ClientReference,
        tasks: &[RepairTask],
        episode: &EpisodeKey,
        created_at: i64,
    ) -> Result<Self> {
        let mut items = Vec::with_capacity(tasks.len());
        for task in tasks {
            if task.car_id != episode.car_id {
                return Err(DomainError::ValidationError(format!(
                    "Task {} belongs to car {}, not {}",
                    task.id, task.car_id, episode.car_id
                )));
            }
            if task.is_cancelled() {
                continue;
            }
            if !task.is_completed() {
                return Err(DomainError::ValidationError(format!(
                    "Task {} is not completed ({})",
                    task.id, task.status
                )));
            }
            items.push(CompletionItem {
                task_id: task.id.clone(),
                name: task.intervention.name.clone(),
                price_cents: task.intervention.price_cents,
            });
        }

        if items.is_empty() {
            return Err(DomainError::ValidationError(format!(
                "No completed repairs to bill for car {}",
                episode.car_id
            )));
        }

        let total_cents = items.iter().map(|i| i.price_cents).sum();

        Ok(Self {
            id: id.into(),
            car_id: episode.car_id.clone(),
            client,
            items,
            total_cents,
            slot_number: episode.slot_number,
            episode: episode.episode,
            created_at,
        })
    }

    pub fn episode_key(&self) -> EpisodeKey {
        EpisodeKey {
            car_id: self.car_id.clone(),
            slot_number: self.slot_number,
            episode: self.episode,
        }
    }
}
