//! The always-on agent loop.
//!
//! Each cycle runs perceive → think → decide → act → reflect → memorize →
//! evolve. The reflect and memorize writes are issued last, after evolve, so a
//! cycle that fails part way leaves the learning log and counters untouched.
//! One cycle runs immediately on start, the rest on a fixed interval.
//! Cycles never overlap: a trigger that arrives while a cycle is in flight is
//! dropped, not queued.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agent::actions::ActionRunner;
use crate::agent::decision::{ImpactPolicy, route_decisions};
use crate::config::AgentConfig;
use crate::db::{Database, KnowledgeEntry, LearningLog, Task};
use crate::error::AgentError;
use crate::llm::{Model, ThinkingResult};

const STATE_LAST_THOUGHT_AT: &str = "last_thought_at";
const STATE_AGENT_STATS: &str = "agent_stats";
const COUNTER_KNOWLEDGE: &str = "knowledge_count";
const COUNTER_CYCLES: &str = "cycles_completed";

/// Collaborators the loop is wired to.
pub struct AgentDeps {
    pub db: Arc<dyn Database>,
    pub model: Arc<dyn Model>,
    pub actions: Arc<dyn ActionRunner>,
    pub impact: Arc<dyn ImpactPolicy>,
}

/// What the agent sees at the start of a cycle.
#[derive(Debug, Clone)]
pub struct Perception {
    pub pending_tasks: Vec<Task>,
    pub recent_topics: Vec<String>,
    pub status: Option<Value>,
}

impl Perception {
    /// Render the perception as the think prompt for cycle `cycle`.
    pub fn to_prompt(&self, cycle: u64) -> String {
        let mut prompt = format!("Cycle #{}\n\n", cycle);

        prompt.push_str(&format!("## Pending tasks ({})\n", self.pending_tasks.len()));
        if self.pending_tasks.is_empty() {
            prompt.push_str("- none\n");
        }
        for task in &self.pending_tasks {
            prompt.push_str(&format!(
                "- [{:?}/{:?}] {}\n",
                task.kind, task.priority, task.title
            ));
        }

        prompt.push_str("\n## Recent topics\n");
        if self.recent_topics.is_empty() {
            prompt.push_str("- none\n");
        }
        for topic in &self.recent_topics {
            prompt.push_str(&format!("- {}\n", topic));
        }

        if let Some(status) = &self.status {
            prompt.push_str(&format!("\n## Status\n{}\n", status));
        }

        prompt
    }
}

/// Everything one completed cycle produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub thoughts: String,
    pub action_outcomes: Vec<String>,
    pub approval_task_ids: Vec<Uuid>,
    pub question_task_ids: Vec<Uuid>,
    pub knowledge_ids: Vec<Uuid>,
    pub exploration_task_ids: Vec<Uuid>,
    pub evolved: bool,
}

/// Result of asking the loop to run a cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already in flight.
    Skipped,
    /// The cycle ended early with this error.
    Failed(String),
}

/// Read-only snapshot of the loop.
#[derive(Debug, Clone, Serialize)]
pub struct LoopStatus {
    pub running: bool,
    pub cycle_in_flight: bool,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycle_count: u64,
    pub recent_errors: Vec<String>,
}

#[derive(Debug, Default)]
struct LoopState {
    running: bool,
    last_cycle_at: Option<DateTime<Utc>>,
    cycle_count: u64,
    recent_errors: VecDeque<String>,
}

/// Clears the in-flight flag however the cycle ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The cyclic agent.
pub struct AgentLoop {
    config: AgentConfig,
    deps: AgentDeps,
    in_flight: AtomicBool,
    state: RwLock<LoopState>,
}

impl AgentLoop {
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Self {
        Self {
            config,
            deps,
            in_flight: AtomicBool::new(false),
            state: RwLock::new(LoopState::default()),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn status(&self) -> LoopStatus {
        let state = self.state.read().await;
        LoopStatus {
            running: state.running,
            cycle_in_flight: self.in_flight.load(Ordering::Acquire),
            last_cycle_at: state.last_cycle_at,
            cycle_count: state.cycle_count,
            recent_errors: state.recent_errors.iter().cloned().collect(),
        }
    }

    /// Run exactly one cycle, unless one is already in flight.
    pub async fn trigger_cycle(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Cycle already in flight, dropping trigger");
            return CycleOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let cycle = self.state.read().await.cycle_count + 1;
        tracing::info!(cycle, "Starting agent cycle");

        match self.run_cycle(cycle).await {
            Ok(report) => {
                let mut state = self.state.write().await;
                state.cycle_count = cycle;
                state.last_cycle_at = Some(Utc::now());
                tracing::info!(
                    cycle,
                    actions = report.action_outcomes.len(),
                    approvals = report.approval_task_ids.len(),
                    "Agent cycle completed"
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(cycle, "Agent cycle failed: {}", message);
                let mut state = self.state.write().await;
                state.recent_errors.push_back(message.clone());
                while state.recent_errors.len() > self.config.max_recent_errors {
                    state.recent_errors.pop_front();
                }
                CycleOutcome::Failed(message)
            }
        }
    }

    async fn run_cycle(&self, cycle: u64) -> Result<CycleReport, AgentError> {
        let perception = self.perceive().await?;

        let thinking = self
            .deps
            .model
            .think(&perception.to_prompt(cycle))
            .await
            .map_err(AgentError::Think)?;

        let mut report = CycleReport {
            cycle,
            thoughts: thinking.thoughts.clone(),
            ..CycleReport::default()
        };

        let actions = self.decide(&thinking, &mut report).await?;

        for action in &actions {
            let outcome = self.deps.actions.run(action).await;
            tracing::debug!(cycle, "Action outcome: {}", outcome);
            report.action_outcomes.push(outcome);
        }

        if self.should_evolve(cycle) {
            self.evolve(&perception, &thinking, &mut report).await?;
        }

        self.reflect(cycle, &thinking, &mut report).await?;
        self.memorize(cycle, &perception, &report).await?;

        Ok(report)
    }

    async fn perceive(&self) -> Result<Perception, AgentError> {
        let db = &self.deps.db;
        let (pending_tasks, recent_topics, status) = tokio::try_join!(
            db.get_pending_tasks(),
            db.get_recent_topics(self.config.recent_topics_limit),
            db.get_state(STATE_AGENT_STATS),
        )
        .map_err(AgentError::Perceive)?;

        Ok(Perception {
            pending_tasks,
            recent_topics,
            status,
        })
    }

    /// Queue high-impact decisions and questions; return the routine actions.
    async fn decide(
        &self,
        thinking: &ThinkingResult,
        report: &mut CycleReport,
    ) -> Result<Vec<String>, AgentError> {
        let routed = route_decisions(self.deps.impact.as_ref(), &thinking.decisions);

        for decision in &routed.approvals {
            tracing::info!("Queuing decision for approval: {}", decision);
            let id = self
                .deps
                .db
                .create_task(&Task::approval(decision.as_str()))
                .await
                .map_err(AgentError::Decide)?;
            report.approval_task_ids.push(id);
        }

        for question in thinking.questions.iter().filter(|q| !q.trim().is_empty()) {
            let id = self
                .deps
                .db
                .create_task(&Task::learning(question.trim()))
                .await
                .map_err(AgentError::Decide)?;
            report.question_task_ids.push(id);
        }

        Ok(routed.actions)
    }

    async fn reflect(
        &self,
        cycle: u64,
        thinking: &ThinkingResult,
        report: &mut CycleReport,
    ) -> Result<(), AgentError> {
        let mut log = LearningLog::new(cycle, thinking.thoughts.clone());
        log.actions = report.action_outcomes.clone();
        log.learnings = thinking.learnings.clone();
        self.deps
            .db
            .save_learning_log(&log)
            .await
            .map_err(AgentError::Reflect)?;

        for learning in thinking.learnings.iter().filter(|l| !l.trim().is_empty()) {
            let id = self
                .deps
                .db
                .save_knowledge(&KnowledgeEntry::new(learning.trim(), "reflection"))
                .await
                .map_err(AgentError::Reflect)?;
            report.knowledge_ids.push(id);
        }

        Ok(())
    }

    async fn memorize(
        &self,
        cycle: u64,
        perception: &Perception,
        report: &CycleReport,
    ) -> Result<(), AgentError> {
        let db = &self.deps.db;
        let now = Utc::now();

        let knowledge_count = db
            .increment_counter(COUNTER_KNOWLEDGE, report.knowledge_ids.len() as i64)
            .await
            .map_err(AgentError::Memorize)?;
        db.increment_counter(COUNTER_CYCLES, 1)
            .await
            .map_err(AgentError::Memorize)?;

        db.set_state(STATE_LAST_THOUGHT_AT, &json!(now.to_rfc3339()))
            .await
            .map_err(AgentError::Memorize)?;

        let stats = json!({
            "cycle_count": cycle,
            "knowledge_count": knowledge_count,
            "pending_tasks": perception.pending_tasks.len()
                + report.approval_task_ids.len()
                + report.question_task_ids.len(),
            "updated_at": now.to_rfc3339(),
        });
        db.set_state(STATE_AGENT_STATS, &stats)
            .await
            .map_err(AgentError::Memorize)
    }

    fn should_evolve(&self, cycle: u64) -> bool {
        self.config.curiosity_enabled && cycle % self.config.evolve_every.max(1) == 0
    }

    async fn evolve(
        &self,
        perception: &Perception,
        thinking: &ThinkingResult,
        report: &mut CycleReport,
    ) -> Result<(), AgentError> {
        let topic = perception
            .recent_topics
            .first()
            .cloned()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                let thoughts = thinking.thoughts.trim();
                (!thoughts.is_empty()).then(|| thoughts.chars().take(80).collect())
            })
            .unwrap_or_else(|| "something new worth learning".to_string());

        tracing::info!(topic = %topic, "Evolving: generating exploration questions");

        let questions = self
            .deps
            .model
            .generate_questions(&topic, self.config.evolve_question_count)
            .await
            .map_err(|e| AgentError::Evolve(e.to_string()))?;

        for question in questions.iter().filter(|q| !q.trim().is_empty()) {
            let id = self
                .deps
                .db
                .create_task(&Task::exploration(question.trim()))
                .await
                .map_err(|e| AgentError::Evolve(e.to_string()))?;
            report.exploration_task_ids.push(id);
        }
        report.evolved = true;

        Ok(())
    }

    /// Start the periodic loop. The first cycle runs immediately.
    pub fn start(self: &Arc<Self>) -> LoopHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let agent = Arc::clone(self);
        let interval = self.config.interval();

        let handle = tokio::spawn(async move {
            agent.state.write().await.running = true;
            tracing::info!("Starting agent loop with interval {:?}", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        agent.trigger_cycle().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            agent.state.write().await.running = false;
            tracing::info!("Agent loop stopped");
        });

        LoopHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle to a running loop.
pub struct LoopHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LoopHandle {
    /// Stop scheduling cycles and wait for any in-flight cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Agent loop task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::agent::decision::KeywordImpactPolicy;
    use crate::db::{InMemoryDatabase, TaskKind};
    use crate::error::{DatabaseError, LlmError};

    #[derive(Default)]
    struct MockModel {
        replies: Mutex<VecDeque<ThinkingResult>>,
        hold: Option<(Arc<Notify>, Arc<Notify>)>,
        question_calls: AtomicUsize,
        questions_fail: bool,
    }

    impl MockModel {
        fn replying(replies: Vec<ThinkingResult>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Model for MockModel {
        async fn think(&self, _context: &str) -> Result<ThinkingResult, LlmError> {
            if let Some((entered, release)) = &self.hold {
                entered.notify_one();
                release.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            Ok(reply.unwrap_or_else(|| ThinkingResult::degraded("nothing to do")))
        }

        async fn generate_questions(
            &self,
            topic: &str,
            count: usize,
        ) -> Result<Vec<String>, LlmError> {
            self.question_calls.fetch_add(1, Ordering::SeqCst);
            if self.questions_fail {
                return Err(LlmError::RequestFailed {
                    provider: "mock".to_string(),
                    reason: "rate limited".to_string(),
                });
            }
            Ok((1..=count).map(|i| format!("{} question {}", topic, i)).collect())
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionRunner for RecordingRunner {
        async fn run(&self, action: &str) -> String {
            self.seen.lock().unwrap().push(action.to_string());
            format!("completed: {}", action)
        }
    }

    struct BrokenDatabase;

    fn refused<T>() -> Result<T, DatabaseError> {
        Err(DatabaseError::Query("connection refused".to_string()))
    }

    #[async_trait]
    impl Database for BrokenDatabase {
        async fn get_pending_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
            refused()
        }
        async fn create_task(&self, _task: &Task) -> Result<Uuid, DatabaseError> {
            refused()
        }
        async fn save_learning_log(&self, _log: &LearningLog) -> Result<(), DatabaseError> {
            refused()
        }
        async fn save_knowledge(&self, _entry: &KnowledgeEntry) -> Result<Uuid, DatabaseError> {
            refused()
        }
        async fn get_recent_topics(&self, _limit: usize) -> Result<Vec<String>, DatabaseError> {
            refused()
        }
        async fn get_state(&self, _key: &str) -> Result<Option<Value>, DatabaseError> {
            refused()
        }
        async fn set_state(&self, _key: &str, _value: &Value) -> Result<(), DatabaseError> {
            refused()
        }
        async fn increment_counter(&self, _name: &str, _delta: i64) -> Result<i64, DatabaseError> {
            refused()
        }
        async fn get_counter(&self, _name: &str) -> Result<i64, DatabaseError> {
            refused()
        }
    }

    fn agent(
        config: AgentConfig,
        db: Arc<dyn Database>,
        model: Arc<MockModel>,
        runner: Arc<RecordingRunner>,
    ) -> Arc<AgentLoop> {
        Arc::new(AgentLoop::new(
            config,
            AgentDeps {
                db,
                model,
                actions: runner,
                impact: Arc::new(KeywordImpactPolicy::default()),
            },
        ))
    }

    fn thinking(decisions: &[&str], questions: &[&str], learnings: &[&str]) -> ThinkingResult {
        ThinkingResult {
            thoughts: "all quiet".to_string(),
            decisions: decisions.iter().map(|s| s.to_string()).collect(),
            questions: questions.iter().map(|s| s.to_string()).collect(),
            learnings: learnings.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_decisions_are_routed_by_impact() {
        let db = Arc::new(InMemoryDatabase::new());
        let runner = Arc::new(RecordingRunner::default());
        let model = Arc::new(MockModel::replying(vec![thinking(
            &["删除旧文件", "delete the old file", "summarize today's news"],
            &["what is a B-tree?"],
            &["Tokio intervals fire immediately."],
        )]));
        let agent = agent(AgentConfig::default(), db.clone(), model, runner.clone());

        let CycleOutcome::Completed(report) = agent.trigger_cycle().await else {
            panic!("cycle should complete");
        };

        assert_eq!(report.cycle, 1);
        assert_eq!(report.approval_task_ids.len(), 2);
        assert_eq!(report.question_task_ids.len(), 1);
        assert_eq!(report.knowledge_ids.len(), 1);
        assert_eq!(
            report.action_outcomes,
            vec!["completed: summarize today's news".to_string()]
        );
        assert_eq!(
            *runner.seen.lock().unwrap(),
            vec!["summarize today's news".to_string()]
        );

        let tasks = db.tasks().await;
        let approvals: Vec<_> = tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Approval)
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(approvals, vec!["删除旧文件", "delete the old file"]);
        assert!(tasks.iter().all(|t| t.kind != TaskKind::Approval || t.requires_approval));

        let logs = db.learning_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].cycle, 1);
        assert_eq!(logs[0].actions, report.action_outcomes);
    }

    #[tokio::test]
    async fn test_memorize_updates_state_and_counters() {
        let db = Arc::new(InMemoryDatabase::new());
        let model = Arc::new(MockModel::replying(vec![
            thinking(&[], &[], &["one", "two"]),
            thinking(&[], &[], &["three"]),
        ]));
        let agent = agent(
            AgentConfig::default(),
            db.clone(),
            model,
            Arc::new(RecordingRunner::default()),
        );

        agent.trigger_cycle().await;
        agent.trigger_cycle().await;

        assert_eq!(db.get_counter(COUNTER_KNOWLEDGE).await.unwrap(), 3);
        assert_eq!(db.get_counter(COUNTER_CYCLES).await.unwrap(), 2);

        let stats = db.get_state(STATE_AGENT_STATS).await.unwrap().unwrap();
        assert_eq!(stats["cycle_count"], json!(2));
        assert_eq!(stats["knowledge_count"], json!(3));

        let last = db.get_state(STATE_LAST_THOUGHT_AT).await.unwrap().unwrap();
        assert!(DateTime::parse_from_rfc3339(last.as_str().unwrap()).is_ok());

        let status = agent.status().await;
        assert_eq!(status.cycle_count, 2);
        assert!(status.last_cycle_at.is_some());
        assert!(status.recent_errors.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_while_in_flight_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let model = Arc::new(MockModel {
            hold: Some((entered.clone(), release.clone())),
            ..MockModel::default()
        });
        let agent = agent(
            AgentConfig::default(),
            Arc::new(InMemoryDatabase::new()),
            model,
            Arc::new(RecordingRunner::default()),
        );

        let first = tokio::spawn({
            let agent = agent.clone();
            async move { agent.trigger_cycle().await }
        });
        entered.notified().await;

        assert!(agent.status().await.cycle_in_flight);
        assert!(matches!(agent.trigger_cycle().await, CycleOutcome::Skipped));

        release.notify_one();
        assert!(matches!(first.await.unwrap(), CycleOutcome::Completed(_)));

        let status = agent.status().await;
        assert_eq!(status.cycle_count, 1);
        assert!(!status.cycle_in_flight);
    }

    #[tokio::test]
    async fn test_error_history_is_bounded() {
        let agent = agent(
            AgentConfig::default(),
            Arc::new(BrokenDatabase),
            Arc::new(MockModel::default()),
            Arc::new(RecordingRunner::default()),
        );

        for _ in 0..12 {
            let outcome = agent.trigger_cycle().await;
            assert!(matches!(outcome, CycleOutcome::Failed(ref e) if e.starts_with("perceive failed")));
        }

        let status = agent.status().await;
        assert_eq!(status.recent_errors.len(), 10);
        assert_eq!(status.cycle_count, 0);
        assert!(status.last_cycle_at.is_none());
        assert!(!status.cycle_in_flight);
    }

    #[tokio::test]
    async fn test_evolve_runs_every_nth_cycle() {
        let db = Arc::new(InMemoryDatabase::new());
        let model = Arc::new(MockModel::default());
        let agent = agent(
            AgentConfig::default().with_curiosity(2),
            db.clone(),
            model.clone(),
            Arc::new(RecordingRunner::default()),
        );

        let mut evolved = Vec::new();
        for _ in 0..4 {
            if let CycleOutcome::Completed(report) = agent.trigger_cycle().await {
                evolved.push(report.evolved);
            }
        }

        assert_eq!(evolved, vec![false, true, false, true]);
        assert_eq!(model.question_calls.load(Ordering::SeqCst), 2);
        let explorations = db
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.kind == TaskKind::Exploration)
            .count();
        assert_eq!(explorations, 6);
    }

    #[tokio::test]
    async fn test_failed_evolve_persists_nothing() {
        let db = Arc::new(InMemoryDatabase::new());
        let model = Arc::new(MockModel {
            questions_fail: true,
            ..MockModel::replying(vec![
                thinking(&[], &[], &["kept nowhere"]),
                thinking(&[], &[], &["kept nowhere"]),
            ])
        });
        let agent = agent(
            AgentConfig::default().with_curiosity(1),
            db.clone(),
            model.clone(),
            Arc::new(RecordingRunner::default()),
        );

        for _ in 0..2 {
            let outcome = agent.trigger_cycle().await;
            assert!(matches!(outcome, CycleOutcome::Failed(ref e) if e.starts_with("evolve failed")));
        }

        assert_eq!(model.question_calls.load(Ordering::SeqCst), 2);
        let status = agent.status().await;
        assert_eq!(status.cycle_count, 0);
        assert_eq!(status.recent_errors.len(), 2);

        assert_eq!(db.get_counter(COUNTER_CYCLES).await.unwrap(), 0);
        assert_eq!(db.get_counter(COUNTER_KNOWLEDGE).await.unwrap(), 0);
        assert_eq!(db.get_state(STATE_AGENT_STATS).await.unwrap(), None);
        assert_eq!(db.get_state(STATE_LAST_THOUGHT_AT).await.unwrap(), None);
        assert!(db.learning_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_evolve_disabled_without_curiosity() {
        let model = Arc::new(MockModel::default());
        let agent = agent(
            AgentConfig::default(),
            Arc::new(InMemoryDatabase::new()),
            model.clone(),
            Arc::new(RecordingRunner::default()),
        );

        for _ in 0..5 {
            agent.trigger_cycle().await;
        }
        assert_eq!(model.question_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_immediately_then_on_interval() {
        let agent = agent(
            AgentConfig::default().with_interval_minutes(1),
            Arc::new(InMemoryDatabase::new()),
            Arc::new(MockModel::default()),
            Arc::new(RecordingRunner::default()),
        );

        let handle = agent.start();
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(agent.status().await.running);

        handle.shutdown().await;

        let status = agent.status().await;
        assert_eq!(status.cycle_count, 3);
        assert!(!status.running);
    }

    #[test]
    fn test_prompt_includes_cycle_and_topics() {
        let perception = Perception {
            pending_tasks: vec![Task::learning("what is a trie?")],
            recent_topics: vec!["rust".to_string()],
            status: None,
        };
        let prompt = perception.to_prompt(7);
        assert!(prompt.starts_with("Cycle #7"));
        assert!(prompt.contains("what is a trie?"));
        assert!(prompt.contains("- rust"));
    }
}
