//! Approval request, outcome and status types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::safety::{OperationCategory, OperationContext, RiskLevel};

/// Lifecycle of a pending operation. Every state except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Operator response to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    KillAll,
}

/// How a call to `request_approval` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// An operator approved the operation.
    Approved,
    /// The category's policy does not require confirmation.
    AutoApproved,
    /// An operator rejected the operation.
    Rejected,
    /// Nobody answered before the policy timeout.
    Expired,
    /// The kill switch cancelled the operation while it was pending.
    Cancelled,
    /// The confirmation request could not be delivered.
    DeliveryFailed,
    /// The kill switch was active when the request arrived.
    KillSwitchActive,
}

impl ApprovalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved | Self::AutoApproved)
    }

    /// Human-readable reason, used when an action is skipped.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Approved => "approved by operator",
            Self::AutoApproved => "confirmation not required",
            Self::Rejected => "rejected by operator",
            Self::Expired => "approval request timed out",
            Self::Cancelled => "cancelled by kill switch",
            Self::DeliveryFailed => "confirmation request could not be delivered",
            Self::KillSwitchActive => "kill switch is active",
        }
    }
}

impl fmt::Display for ApprovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Result of `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResolveResult {
    /// The operation was pending and has now reached this status.
    Resolved { status: OperationStatus },
    /// The kill switch was engaged; this many operations were cancelled.
    KilledAll { cancelled: usize },
    /// No pending operation with that id (unknown, or already resolved/expired).
    NotFound,
}

impl ResolveResult {
    pub fn message(&self) -> String {
        match self {
            Self::Resolved { status } => format!("operation {}", status),
            Self::KilledAll { cancelled } => {
                format!("kill switch engaged, {} pending operation(s) cancelled", cancelled)
            }
            Self::NotFound => "operation not found or already resolved".to_string(),
        }
    }
}

/// A request for human confirmation of a sensitive action.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub category: OperationCategory,
    pub command: String,
    pub description: String,
    pub context: OperationContext,
    /// Delivery channel; the gate's default channel when `None`.
    pub channel: Option<String>,
}

impl ApprovalRequest {
    pub fn new(category: OperationCategory, command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            category,
            description: command.clone(),
            command,
            context: OperationContext::new(),
            channel: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_context(mut self, context: OperationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// What the delivery channel is asked to show the operator.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub operation_id: String,
    pub category: OperationCategory,
    pub risk_level: RiskLevel,
    pub command_preview: String,
    pub description: String,
    #[serde(rename = "timeout_seconds", serialize_with = "serialize_secs")]
    pub timeout: Duration,
    pub channel: String,
}

/// Read-only snapshot of a pending operation.
#[derive(Debug, Clone, Serialize)]
pub struct PendingOperationView {
    pub id: String,
    pub category: OperationCategory,
    pub description: String,
    pub command: String,
    pub context: OperationContext,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// A reply typed by an operator, parsed into an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorReply {
    /// Target operation; `None` for kill-all.
    pub operation_id: Option<String>,
    pub action: ApprovalAction,
}

/// Parse replies such as `approve <id>`, `reject <id>` or `kill all`.
pub fn parse_operator_reply(text: &str) -> Option<OperatorReply> {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();
    let normalized = lowered.trim_start_matches('/');

    if matches!(
        normalized,
        "kill all" | "killall" | "kill_all" | "stop all" | "全部停止" | "紧急停止"
    ) {
        return Some(OperatorReply {
            operation_id: None,
            action: ApprovalAction::KillAll,
        });
    }

    let mut words = trimmed.trim_start_matches('/').split_whitespace();
    let verb = words.next()?.to_lowercase();
    let action = match verb.as_str() {
        "approve" | "yes" | "y" | "批准" | "同意" => ApprovalAction::Approve,
        "reject" | "deny" | "no" | "n" | "拒绝" => ApprovalAction::Reject,
        _ => return None,
    };
    let id = words.next()?;
    if words.next().is_some() {
        return None;
    }

    Some(OperatorReply {
        operation_id: Some(id.to_string()),
        action,
    })
}

/// Shorten a command for display, marking the cut with an ellipsis.
pub(crate) fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push('…');
    preview
}
