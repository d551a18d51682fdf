//! The act phase: carrying out routine decisions.
//!
//! A routine decision is either plain text or carries tool calls in one of
//! the encodings `llm::parse_tool_calls` understands. Tool calls run through
//! the secure executor, so a routine-looking decision that hides a sensitive
//! command still waits for approval.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executor::{ExecuteOptions, ExecutionOutcome, SecureExecutor};
use crate::llm::{ToolCall, parse_tool_calls};

/// Runs a single routine action and reports how it went.
///
/// The outcome is one of `completed: <action>`, `failed: <action>: <error>`
/// or `skipped: <action>: <reason>`.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, action: &str) -> String;
}

/// Routes actions through the `SecureExecutor`.
pub struct ExecutorActionRunner {
    executor: Arc<SecureExecutor>,
}

impl ExecutorActionRunner {
    pub fn new(executor: Arc<SecureExecutor>) -> Self {
        Self { executor }
    }

    async fn run_tool(&self, call: &ToolCall) -> ExecutionOutcome<String> {
        let options = ExecuteOptions::new().with_context("tool", call.tool.clone());

        match call.tool.as_str() {
            "shell" | "execute_shell" | "run_command" => {
                let Some(command) = str_arg(&call.args, &["command", "cmd"]) else {
                    return missing_arg("command");
                };
                self.executor
                    .execute_shell(command, options)
                    .await
                    .map(|out| format!("exit code {}", out.exit_code))
            }
            "write_file" => {
                let (Some(path), Some(content)) = (
                    str_arg(&call.args, &["path", "file"]),
                    str_arg(&call.args, &["content", "text"]),
                ) else {
                    return missing_arg("path/content");
                };
                self.executor
                    .write_file(Path::new(path), content, options)
                    .await
                    .map(|bytes| format!("wrote {} bytes", bytes))
            }
            "delete_file" => {
                let Some(path) = str_arg(&call.args, &["path", "file"]) else {
                    return missing_arg("path");
                };
                self.executor
                    .delete_file(Path::new(path), options)
                    .await
                    .map(|()| "deleted".to_string())
            }
            "http" | "call_api" | "http_request" => {
                let Some(url) = str_arg(&call.args, &["url"]) else {
                    return missing_arg("url");
                };
                let method = str_arg(&call.args, &["method"]).unwrap_or("GET");
                let body = call.args.get("body").cloned();
                self.executor
                    .call_api(method, url, body, options)
                    .await
                    .map(|resp| format!("HTTP {}", resp.status))
            }
            other => ExecutionOutcome::Failed {
                error: format!("unknown tool '{}'", other),
            },
        }
    }
}

#[async_trait]
impl ActionRunner for ExecutorActionRunner {
    async fn run(&self, action: &str) -> String {
        let calls = parse_tool_calls(action);

        if calls.is_empty() {
            // A plain intention: nothing to execute beyond passing the gate.
            let outcome = self
                .executor
                .execute(
                    action,
                    || async { Ok::<_, std::convert::Infallible>(()) },
                    ExecuteOptions::new(),
                )
                .await;
            return describe(action, outcome.map(|()| String::new()));
        }

        let mut details = Vec::with_capacity(calls.len());
        for call in &calls {
            tracing::debug!(tool = %call.tool, "Running tool call");
            match self.run_tool(call).await {
                ExecutionOutcome::Completed(detail) => {
                    details.push(format!("{}: {}", call.tool, detail))
                }
                other => return describe(action, other.map(|_| String::new())),
            }
        }
        describe(action, ExecutionOutcome::Completed(details.join(", ")))
    }
}

fn describe(action: &str, outcome: ExecutionOutcome<String>) -> String {
    match outcome {
        ExecutionOutcome::Completed(detail) if detail.is_empty() => format!("completed: {}", action),
        ExecutionOutcome::Completed(detail) => format!("completed: {} ({})", action, detail),
        ExecutionOutcome::Failed { error } => format!("failed: {}: {}", action, error),
        ExecutionOutcome::Skipped { reason } => format!("skipped: {}: {}", action, reason),
    }
}

fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| args.get(*k).and_then(Value::as_str))
}

fn missing_arg<T>(name: &str) -> ExecutionOutcome<T> {
    ExecutionOutcome::Failed {
        error: format!("missing argument '{}'", name),
    }
}
