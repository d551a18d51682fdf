//! Command-line surface for the `vigil` binary.
//!
//! Commands for running the loop, running a single cycle, and inspecting how
//! the classifier and parser see a piece of text.
//!
//! While `run` is active, operator replies (`approve <id>`, `reject <id>`,
//! `kill all`) typed on stdin are forwarded to the approval gate.

use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::agent::{AgentDeps, AgentLoop, ExecutorActionRunner, KeywordImpactPolicy};
use crate::approval::{ApprovalGate, LogDelivery, ResolveResult, parse_operator_reply};
use crate::config::Config;
use crate::db::InMemoryDatabase;
use crate::executor::SecureExecutor;
use crate::llm::{Reasoning, create_llm_provider, parse_tool_calls, split_thinking_and_answer};
use crate::safety::{PolicyTable, classify};

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Always-on agent with a human approval gate")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the agent loop and run until Ctrl-C
    Run,

    /// Run exactly one cycle and print its report
    Cycle,

    /// Show how a command would be classified
    Classify {
        /// The command or action text to classify
        command: String,
    },

    /// Extract tool calls and the thinking/answer split from model output
    Parse {
        /// File holding the model output (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}

/// Run a CLI command.
pub async fn run_command(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Run => run_loop(config).await,
        Command::Cycle => run_single_cycle(config).await,
        Command::Classify { command } => print_json(&classify_report(&command)),
        Command::Parse { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            print_json(&parse_report(&text))
        }
    }
}

/// Wire the loop to the in-memory store, the configured model and a gate
/// that logs confirmation requests.
fn build_agent(config: &Config) -> (Arc<AgentLoop>, ApprovalGate) {
    let gate = ApprovalGate::new(config.approval.clone(), Arc::new(LogDelivery));
    let executor = Arc::new(SecureExecutor::new(gate.clone(), config.executor.clone()));
    let model = Reasoning::new(create_llm_provider(&config.llm))
        .with_temperature(config.llm.temperature);

    let deps = AgentDeps {
        db: Arc::new(InMemoryDatabase::new()),
        model: Arc::new(model),
        actions: Arc::new(ExecutorActionRunner::new(executor)),
        impact: Arc::new(KeywordImpactPolicy::default()),
    };

    (Arc::new(AgentLoop::new(config.agent.clone(), deps)), gate)
}

async fn run_loop(config: Config) -> anyhow::Result<()> {
    let (agent, gate) = build_agent(&config);
    let sweeper = gate.spawn_sweeper();
    let replies = tokio::spawn(forward_operator_replies(stdin_lines(), gate.clone()));
    let handle = agent.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    let cancelled = gate.kill_all().await;
    if cancelled > 0 {
        tracing::warn!("Cancelled {} pending approval(s)", cancelled);
    }
    handle.shutdown().await;
    sweeper.abort();
    replies.abort();

    let status = agent.status().await;
    tracing::info!(
        cycles = status.cycle_count,
        errors = status.recent_errors.len(),
        "Agent stopped"
    );
    Ok(())
}

/// Lines typed on stdin, read on a dedicated thread so a pending read never
/// holds up runtime shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Feed operator replies into the gate until the line source closes.
pub async fn forward_operator_replies(mut lines: mpsc::Receiver<String>, gate: ApprovalGate) {
    while let Some(line) = lines.recv().await {
        handle_operator_line(&gate, &line).await;
    }
    tracing::debug!("Operator input closed");
}

/// Apply a single operator reply. Blank and unrecognized lines resolve nothing.
pub async fn handle_operator_line(gate: &ApprovalGate, line: &str) -> Option<ResolveResult> {
    if line.trim().is_empty() {
        return None;
    }
    let Some(reply) = parse_operator_reply(line) else {
        tracing::warn!(
            input = %line.trim(),
            "Unrecognized reply, expected 'approve <id>', 'reject <id>' or 'kill all'"
        );
        return None;
    };

    let operation_id = reply.operation_id.as_deref().unwrap_or_default();
    let result = gate.on_approval_response(operation_id, reply.action).await;
    tracing::info!(operation_id, "{}", result.message());
    Some(result)
}

async fn run_single_cycle(config: Config) -> anyhow::Result<()> {
    let (agent, _gate) = build_agent(&config);
    let outcome = agent.trigger_cycle().await;
    print_json(&serde_json::to_value(&outcome)?)
}

/// Classifier verdict plus the policy for its category.
pub fn classify_report(command: &str) -> Value {
    let classification = classify(command, None);
    let policies = PolicyTable::default();
    let policy = policies.get(classification.category);
    json!({
        "command": command,
        "classification": classification,
        "policy": policy,
    })
}

/// Tool calls and thinking/answer split for a piece of model output.
pub fn parse_report(text: &str) -> Value {
    json!({
        "tool_calls": parse_tool_calls(text),
        "split": split_thinking_and_answer(text),
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
