//! Human-in-the-loop approval gate.
//!
//! Each operation that needs confirmation is registered with a oneshot
//! responder. The caller waits on the receiver until an operator resolves
//! the operation, the policy timeout elapses, or the kill switch cancels it.
//! Whoever removes an entry from the registry decides its outcome, so an
//! operation reaches exactly one terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::approval::delivery::ApprovalDelivery;
use crate::approval::types::truncate_preview;
use crate::approval::{
    ApprovalAction, ApprovalOutcome, ApprovalRequest, ConfirmationRequest, OperationStatus,
    PendingOperationView, ResolveResult,
};
use crate::config::ApprovalConfig;
use crate::safety::{OperationCategory, OperationContext, OperationPolicy, PolicyTable};

struct PendingOperation {
    id: String,
    category: OperationCategory,
    description: String,
    command: String,
    context: OperationContext,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    deadline: Instant,
    responder: oneshot::Sender<ApprovalOutcome>,
}

impl PendingOperation {
    fn view(&self) -> PendingOperationView {
        PendingOperationView {
            id: self.id.clone(),
            category: self.category,
            description: self.description.clone(),
            command: self.command.clone(),
            context: self.context.clone(),
            status: OperationStatus::Pending,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Deliver the terminal outcome. The waiter may already be gone.
    fn finish(self, outcome: ApprovalOutcome) {
        let _ = self.responder.send(outcome);
    }
}

#[derive(Default)]
struct GateState {
    pending: HashMap<String, PendingOperation>,
    kill_switch: bool,
    /// Bumped on every activation so a stale auto-clear timer is a no-op.
    kill_generation: u64,
}

struct GateInner {
    policies: PolicyTable,
    config: ApprovalConfig,
    delivery: Arc<dyn ApprovalDelivery>,
    state: Mutex<GateState>,
}

/// Serializes human confirmation of sensitive operations.
///
/// Cheap to clone; clones share the same registry and kill switch.
#[derive(Clone)]
pub struct ApprovalGate {
    inner: Arc<GateInner>,
}

impl ApprovalGate {
    /// Create a gate with the default policy table.
    pub fn new(config: ApprovalConfig, delivery: Arc<dyn ApprovalDelivery>) -> Self {
        Self::with_policies(PolicyTable::default(), config, delivery)
    }

    /// Create a gate with an explicit policy table.
    pub fn with_policies(
        policies: PolicyTable,
        config: ApprovalConfig,
        delivery: Arc<dyn ApprovalDelivery>,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                policies,
                config,
                delivery,
                state: Mutex::new(GateState::default()),
            }),
        }
    }

    /// Policy the gate applies to a category.
    pub fn policy(&self, category: OperationCategory) -> &OperationPolicy {
        self.inner.policies.get(category)
    }

    /// Ask an operator to confirm an operation and wait for the answer.
    ///
    /// Never fails: every failure mode (kill switch, delivery error,
    /// timeout) is reported as a non-approving outcome.
    pub async fn request_approval(&self, request: ApprovalRequest) -> ApprovalOutcome {
        let policy = self.inner.policies.get(request.category).clone();

        let (operation_id, rx, confirmation) = {
            let mut state = self.inner.state.lock().await;

            if state.kill_switch {
                tracing::warn!(
                    category = %request.category,
                    "Kill switch active, refusing approval request"
                );
                return ApprovalOutcome::KillSwitchActive;
            }

            if !policy.require_confirm {
                tracing::debug!(category = %request.category, "Confirmation not required");
                return ApprovalOutcome::AutoApproved;
            }

            let operation_id = Uuid::new_v4().to_string();
            let created_at = Utc::now();
            let expires_at = chrono::Duration::from_std(policy.timeout)
                .ok()
                .and_then(|d| created_at.checked_add_signed(d))
                .unwrap_or(created_at);
            let channel = request
                .channel
                .clone()
                .unwrap_or_else(|| self.inner.config.channel.clone());

            let confirmation = ConfirmationRequest {
                operation_id: operation_id.clone(),
                category: request.category,
                risk_level: policy.level,
                command_preview: truncate_preview(&request.command, self.inner.config.preview_chars),
                description: request.description.clone(),
                timeout: policy.timeout,
                channel,
            };

            let (tx, rx) = oneshot::channel();
            state.pending.insert(
                operation_id.clone(),
                PendingOperation {
                    id: operation_id.clone(),
                    category: request.category,
                    description: request.description,
                    command: request.command,
                    context: request.context,
                    created_at,
                    expires_at,
                    deadline: Instant::now() + policy.timeout,
                    responder: tx,
                },
            );

            (operation_id, rx, confirmation)
        };

        tracing::info!(
            operation_id = %operation_id,
            category = %confirmation.category,
            risk = %confirmation.risk_level,
            "Approval requested"
        );

        let delivered = match self
            .inner
            .delivery
            .send_confirmation_request(&confirmation)
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(operation_id = %operation_id, "Confirmation delivery failed: {}", e);
                false
            }
        };

        if !delivered {
            let removed = self.inner.state.lock().await.pending.remove(&operation_id);
            if removed.is_some() {
                tracing::warn!(operation_id = %operation_id, "Confirmation not delivered, rejecting");
                return ApprovalOutcome::DeliveryFailed;
            }
            // Someone else settled it while delivery was in flight.
            return rx.await.unwrap_or(ApprovalOutcome::Rejected);
        }

        self.await_outcome(&operation_id, rx, policy.timeout).await
    }

    async fn await_outcome(
        &self,
        operation_id: &str,
        mut rx: oneshot::Receiver<ApprovalOutcome>,
        timeout: std::time::Duration,
    ) -> ApprovalOutcome {
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(outcome)) => {
                tracing::info!(operation_id = %operation_id, outcome = ?outcome, "Approval settled");
                outcome
            }
            Ok(Err(_)) => ApprovalOutcome::Rejected,
            Err(_) => {
                let removed = self.inner.state.lock().await.pending.remove(operation_id);
                match removed {
                    Some(_) => {
                        tracing::info!(operation_id = %operation_id, "Approval timed out");
                        ApprovalOutcome::Expired
                    }
                    // Resolved between the timer firing and taking the lock.
                    None => rx.try_recv().unwrap_or(ApprovalOutcome::Expired),
                }
            }
        }
    }

    /// Apply an operator's response to a pending operation.
    ///
    /// Resolving an unknown or already-settled operation is a no-op that
    /// reports `NotFound`.
    pub async fn resolve(&self, operation_id: &str, action: ApprovalAction) -> ResolveResult {
        let outcome = match action {
            ApprovalAction::KillAll => {
                let cancelled = self.kill_all().await;
                return ResolveResult::KilledAll { cancelled };
            }
            ApprovalAction::Approve => ApprovalOutcome::Approved,
            ApprovalAction::Reject => ApprovalOutcome::Rejected,
        };

        let removed = self.inner.state.lock().await.pending.remove(operation_id);
        let Some(operation) = removed else {
            tracing::info!(operation_id = %operation_id, "Operation not found or already resolved");
            return ResolveResult::NotFound;
        };

        let status = match outcome {
            ApprovalOutcome::Approved => OperationStatus::Approved,
            _ => OperationStatus::Rejected,
        };
        tracing::info!(operation_id = %operation_id, status = %status, "Operation resolved");
        operation.finish(outcome);
        ResolveResult::Resolved { status }
    }

    /// Entry point for operator responses arriving from a channel.
    pub async fn on_approval_response(
        &self,
        operation_id: &str,
        action: ApprovalAction,
    ) -> ResolveResult {
        self.resolve(operation_id, action).await
    }

    /// Cancel every pending operation and refuse new requests until the
    /// cool-down elapses. Returns the number of operations cancelled.
    pub async fn kill_all(&self) -> usize {
        let (cancelled, generation) = {
            let mut state = self.inner.state.lock().await;
            state.kill_switch = true;
            state.kill_generation += 1;
            let drained: Vec<PendingOperation> =
                state.pending.drain().map(|(_, op)| op).collect();
            (drained, state.kill_generation)
        };

        let count = cancelled.len();
        for operation in cancelled {
            operation.finish(ApprovalOutcome::Cancelled);
        }

        let cooldown = self.inner.config.kill_switch_cooldown;
        tracing::warn!(
            cancelled = count,
            cooldown_secs = cooldown.as_secs(),
            "Kill switch activated"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let mut state = inner.state.lock().await;
            if state.kill_switch && state.kill_generation == generation {
                state.kill_switch = false;
                tracing::info!("Kill switch cleared after cool-down");
            }
        });

        count
    }

    /// Clear the kill switch before its cool-down elapses.
    pub async fn clear_kill_switch(&self) {
        let mut state = self.inner.state.lock().await;
        if state.kill_switch {
            state.kill_switch = false;
            tracing::info!("Kill switch cleared manually");
        }
    }

    pub async fn kill_switch_active(&self) -> bool {
        self.inner.state.lock().await.kill_switch
    }

    /// Snapshot of every operation still waiting for an answer, oldest first.
    pub async fn pending_operations(&self) -> Vec<PendingOperationView> {
        let state = self.inner.state.lock().await;
        let mut views: Vec<PendingOperationView> =
            state.pending.values().map(PendingOperation::view).collect();
        views.sort_by_key(|v| v.created_at);
        views
    }

    /// Expire every operation whose deadline has passed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now()).await
    }

    async fn sweep_expired_at(&self, now: Instant) -> usize {
        let expired: Vec<PendingOperation> = {
            let mut state = self.inner.state.lock().await;
            let ids: Vec<String> = state
                .pending
                .values()
                .filter(|op| op.deadline <= now)
                .map(|op| op.id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| state.pending.remove(id))
                .collect()
        };

        let count = expired.len();
        for operation in expired {
            tracing::info!(operation_id = %operation.id, "Sweeping expired operation");
            operation.finish(ApprovalOutcome::Expired);
        }
        count
    }

    /// Run `sweep_expired` periodically in the background.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let gate = self.clone();
        let period = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let swept = gate.sweep_expired().await;
                if swept > 0 {
                    tracing::debug!(swept, "Expired approvals swept");
                }
            }
        })
    }
}
