//! Records the agent persists through the `Database` collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

/// Where a task came from, which decides who handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A high-impact decision waiting for a human.
    Approval,
    /// A question the model asked during think.
    Learning,
    /// A curiosity question from the evolve phase.
    Exploration,
    /// Something to do.
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(kind: TaskKind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::Normal,
            kind,
            status: TaskStatus::Pending,
            requires_approval: false,
            created_at: Utc::now(),
        }
    }

    /// A high-impact decision held for human approval.
    pub fn approval(decision: impl Into<String>) -> Self {
        let decision = decision.into();
        let mut task = Self::new(TaskKind::Approval, decision.clone())
            .with_priority(TaskPriority::High)
            .with_description(format!("Decision awaiting approval: {}", decision));
        task.requires_approval = true;
        task
    }

    /// A question to research later.
    pub fn learning(question: impl Into<String>) -> Self {
        Self::new(TaskKind::Learning, question).with_priority(TaskPriority::Low)
    }

    /// A curiosity-driven exploration question.
    pub fn exploration(question: impl Into<String>) -> Self {
        Self::new(TaskKind::Exploration, question).with_priority(TaskPriority::Low)
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Summary of one agent cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningLog {
    pub id: Uuid,
    pub cycle: u64,
    pub thoughts: String,
    pub actions: Vec<String>,
    pub learnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl LearningLog {
    pub fn new(cycle: u64, thoughts: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle,
            thoughts: thoughts.into(),
            actions: Vec::new(),
            learnings: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A standalone piece of knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub topic: String,
    pub content: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Build an entry whose topic is the first few words of the content.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            topic: derive_topic(&content),
            content,
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

fn derive_topic(content: &str) -> String {
    const MAX_TOPIC_CHARS: usize = 40;

    let first_line = content.lines().next().unwrap_or_default().trim();
    let sentence = first_line
        .split(['.', '。', '!', '?', '！', '？'])
        .next()
        .unwrap_or(first_line)
        .trim();
    sentence.chars().take(MAX_TOPIC_CHARS).collect()
}
