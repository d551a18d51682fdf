//! Persistence for the agent's tasks, logs, knowledge and state.

mod memory;
mod records;

pub use memory::InMemoryDatabase;
pub use records::{KnowledgeEntry, LearningLog, Task, TaskKind, TaskPriority, TaskStatus};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Database abstraction layer.
#[async_trait]
pub trait Database: Send + Sync {
    // --- Tasks ---

    /// Tasks still in `Pending` status, oldest first.
    async fn get_pending_tasks(&self) -> Result<Vec<Task>, DatabaseError>;

    async fn create_task(&self, task: &Task) -> Result<Uuid, DatabaseError>;

    // --- Learning ---

    async fn save_learning_log(&self, log: &LearningLog) -> Result<(), DatabaseError>;

    async fn save_knowledge(&self, entry: &KnowledgeEntry) -> Result<Uuid, DatabaseError>;

    /// Distinct topics of the most recent knowledge entries, newest first.
    async fn get_recent_topics(&self, limit: usize) -> Result<Vec<String>, DatabaseError>;

    // --- State ---

    async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError>;

    async fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError>;

    // --- Counters ---

    /// Add `delta` to a named counter and return the new value.
    async fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, DatabaseError>;

    async fn get_counter(&self, name: &str) -> Result<i64, DatabaseError>;
}
