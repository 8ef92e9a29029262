//! Background task registry
//!
//! Long-running side effects (website creation, firewall changes) run as
//! detached tokio tasks. Each one is recorded here so callers can poll its
//! outcome instead of guessing from entity state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub name: String,
    pub status: TaskStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared, cloneable registry of in-flight and finished tasks
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let record = TaskRecord {
            id,
            name: name.to_string(),
            status: TaskStatus::Running,
            message: String::new(),
            started_at: Utc::now(),
            finished_at: None,
        };
        self.tasks.write().await.insert(id, record);
        id
    }

    pub async fn finish(&self, id: Uuid, result: Result<String, String>) {
        let mut tasks = self.tasks.write().await;
        if let Some(record) = tasks.get_mut(&id) {
            match result {
                Ok(message) => {
                    record.status = TaskStatus::Done;
                    record.message = message;
                }
                Err(message) => {
                    record.status = TaskStatus::Failed;
                    record.message = message;
                }
            }
            record.finished_at = Some(Utc::now());
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<TaskRecord> {
        self.tasks.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.tasks.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_task_outcomes() {
        let registry = TaskRegistry::new();
        let id = registry.start("open firewall ports").await;
        assert_eq!(registry.get(id).await.unwrap().status, TaskStatus::Running);

        registry.finish(id, Err("ufw not found".to_string())).await;
        let record = registry.get(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.message, "ufw not found");
        assert!(record.finished_at.is_some());
    }
}
