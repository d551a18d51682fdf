//! Secure execution of units of work.
//!
//! `SecureExecutor::execute` is the single path every gated operation takes:
//!
//! 1. confirmation disabled in config -> run
//! 2. kill switch active -> skip
//! 3. label whitelisted -> run
//! 4. label not sensitive and not force-confirmed -> run
//! 5. caller asked to skip confirmation -> run
//! 6. category policy does not require confirmation -> run
//! 7. otherwise ask the approval gate, and run only if approved
//!
//! Failures of the work itself are reported, never propagated.

mod wrappers;

use std::fmt;
use std::future::Future;

use serde::Serialize;

use crate::approval::{ApprovalGate, ApprovalOutcome, ApprovalRequest};
use crate::config::ExecutorConfig;
use crate::safety::{OperationCategory, OperationContext, classify};

pub use wrappers::{ApiResponse, ShellOutput, is_important_path};

/// Result of a gated unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ExecutionOutcome<T> {
    /// The work ran and succeeded.
    Completed(T),
    /// The work ran and failed.
    Failed { error: String },
    /// The work was not run.
    Skipped { reason: String },
}

impl<T> ExecutionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The produced value, if the work completed.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the completed value, keeping failures and skips.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExecutionOutcome<U> {
        match self {
            Self::Completed(value) => ExecutionOutcome::Completed(f(value)),
            Self::Failed { error } => ExecutionOutcome::Failed { error },
            Self::Skipped { reason } => ExecutionOutcome::Skipped { reason },
        }
    }
}

/// Per-call options for `SecureExecutor::execute`.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Labels that run without confirmation, on top of the configured whitelist.
    pub whitelist: Vec<String>,
    /// Ask for confirmation even if the classifier finds nothing.
    pub force_confirm: bool,
    /// Run without asking, whatever the classifier says.
    pub skip_confirm: bool,
    /// Text shown to the operator; derived from the label when absent.
    pub description: Option<String>,
    /// Category used when confirmation is forced on an unclassified label.
    pub category_hint: Option<OperationCategory>,
    pub context: OperationContext,
    /// Delivery channel for the confirmation request.
    pub channel: Option<String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_whitelist(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.whitelist = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn force_confirm(mut self, category: OperationCategory) -> Self {
        self.force_confirm = true;
        self.category_hint = Some(category);
        self
    }

    pub fn skip_confirm(mut self) -> Self {
        self.skip_confirm = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// Runs work behind the classifier and the approval gate.
pub struct SecureExecutor {
    gate: ApprovalGate,
    config: ExecutorConfig,
    http: reqwest::Client,
}

impl SecureExecutor {
    pub fn new(gate: ApprovalGate, config: ExecutorConfig) -> Self {
        Self {
            gate,
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `work` if the operation described by `label` is allowed.
    pub async fn execute<T, E, F, Fut>(
        &self,
        label: &str,
        work: F,
        options: ExecuteOptions,
    ) -> ExecutionOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if !self.config.confirmation_enabled {
            return run(label, work).await;
        }

        if self.gate.kill_switch_active().await {
            tracing::warn!(label, "Kill switch active, skipping operation");
            return ExecutionOutcome::Skipped {
                reason: ApprovalOutcome::KillSwitchActive.reason().to_string(),
            };
        }

        let whitelisted = self
            .config
            .whitelist
            .iter()
            .chain(options.whitelist.iter())
            .any(|w| w == label);
        if whitelisted {
            tracing::debug!(label, "Whitelisted operation");
            return run(label, work).await;
        }

        let verdict = classify(label, Some(&options.context));
        if !verdict.is_sensitive && !options.force_confirm {
            return run(label, work).await;
        }

        if options.skip_confirm {
            tracing::debug!(label, category = %verdict.category, "Confirmation skipped by caller");
            return run(label, work).await;
        }

        let category = if verdict.is_sensitive {
            verdict.category
        } else {
            options.category_hint.unwrap_or(verdict.category)
        };
        let policy = self.gate.policy(category);
        if !policy.require_confirm {
            return run(label, work).await;
        }

        let description = options.description.unwrap_or_else(|| {
            if verdict.is_sensitive {
                format!("{} ({})", policy.description, verdict.reason)
            } else {
                policy.description.to_string()
            }
        });
        let mut request = ApprovalRequest::new(category, label)
            .with_description(description)
            .with_context(options.context);
        if let Some(channel) = options.channel {
            request = request.with_channel(channel);
        }

        let outcome = self.gate.request_approval(request).await;
        if outcome.is_approved() {
            run(label, work).await
        } else {
            tracing::info!(label, category = %category, outcome = ?outcome, "Operation not approved");
            ExecutionOutcome::Skipped {
                reason: outcome.reason().to_string(),
            }
        }
    }
}

async fn run<T, E, F, Fut>(label: &str, work: F) -> ExecutionOutcome<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match work().await {
        Ok(value) => {
            tracing::debug!(label, "Operation completed");
            ExecutionOutcome::Completed(value)
        }
        Err(e) => {
            tracing::warn!(label, error = %e, "Operation failed");
            ExecutionOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
