//! In-process `Database` implementation.
//!
//! Nothing survives a restart. Used by the CLI and by tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{Database, KnowledgeEntry, LearningLog, Task, TaskStatus};
use crate::error::DatabaseError;

#[derive(Default)]
struct Store {
    tasks: Vec<Task>,
    logs: Vec<LearningLog>,
    knowledge: Vec<KnowledgeEntry>,
    state: HashMap<String, serde_json::Value>,
    counters: HashMap<String, i64>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    store: RwLock<Store>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task, in creation order.
    pub async fn tasks(&self) -> Vec<Task> {
        self.store.read().await.tasks.clone()
    }

    pub async fn learning_logs(&self) -> Vec<LearningLog> {
        self.store.read().await.logs.clone()
    }

    pub async fn knowledge(&self) -> Vec<KnowledgeEntry> {
        self.store.read().await.knowledge.clone()
    }

    /// Move a task to a new status.
    pub async fn update_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<(), DatabaseError> {
        let mut store = self.store.write().await;
        let task = store
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "task".to_string(),
                id: id.to_string(),
            })?;
        task.status = status;
        Ok(())
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn get_pending_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let store = self.store.read().await;
        Ok(store
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: &Task) -> Result<Uuid, DatabaseError> {
        let mut store = self.store.write().await;
        if store.tasks.iter().any(|t| t.id == task.id) {
            return Err(DatabaseError::Query(format!("task {} already exists", task.id)));
        }
        store.tasks.push(task.clone());
        Ok(task.id)
    }

    async fn save_learning_log(&self, log: &LearningLog) -> Result<(), DatabaseError> {
        self.store.write().await.logs.push(log.clone());
        Ok(())
    }

    async fn save_knowledge(&self, entry: &KnowledgeEntry) -> Result<Uuid, DatabaseError> {
        self.store.write().await.knowledge.push(entry.clone());
        Ok(entry.id)
    }

    async fn get_recent_topics(&self, limit: usize) -> Result<Vec<String>, DatabaseError> {
        let store = self.store.read().await;
        let mut seen = HashSet::new();
        Ok(store
            .knowledge
            .iter()
            .rev()
            .map(|entry| entry.topic.clone())
            .filter(|topic| !topic.is_empty() && seen.insert(topic.clone()))
            .take(limit)
            .collect())
    }

    async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
        Ok(self.store.read().await.state.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError> {
        self.store
            .write()
            .await
            .state
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, DatabaseError> {
        let mut store = self.store.write().await;
        let counter = store.counters.entry(name.to_string()).or_insert(0);
        *counter += delta;
        Ok(*counter)
    }

    async fn get_counter(&self, name: &str) -> Result<i64, DatabaseError> {
        Ok(self
            .store
            .read()
            .await
            .counters
            .get(name)
            .copied()
            .unwrap_or(0))
    }
}
