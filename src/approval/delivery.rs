//! Delivery of confirmation requests to a human operator.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::approval::ConfirmationRequest;
use crate::error::DeliveryError;

/// A message pushed to an operator-facing channel.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Channel the message is addressed to.
    pub channel: String,
    /// Rendered text shown to the operator.
    pub content: String,
    /// Structured copy of the request for channels that render buttons.
    pub metadata: serde_json::Value,
}

impl OutgoingMessage {
    /// Render a confirmation request as a message.
    pub fn confirmation(request: &ConfirmationRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            content: format_confirmation_message(request),
            metadata: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Sends confirmation requests to an operator.
///
/// Returns `Ok(true)` when the request was handed to the channel,
/// `Ok(false)` when the channel declined it.
#[async_trait]
pub trait ApprovalDelivery: Send + Sync {
    async fn send_confirmation_request(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<bool, DeliveryError>;
}

/// Writes confirmation requests to the log. Operators answer out of band.
#[derive(Debug, Default)]
pub struct LogDelivery;

#[async_trait]
impl ApprovalDelivery for LogDelivery {
    async fn send_confirmation_request(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<bool, DeliveryError> {
        tracing::warn!(
            operation_id = %request.operation_id,
            category = %request.category,
            risk = %request.risk_level,
            channel = %request.channel,
            "{}",
            format_confirmation_message(request)
        );
        Ok(true)
    }
}

/// Pushes confirmation requests into an mpsc channel drained by a frontend.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    tx: mpsc::Sender<OutgoingMessage>,
}

impl ChannelDelivery {
    pub fn new(tx: mpsc::Sender<OutgoingMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ApprovalDelivery for ChannelDelivery {
    async fn send_confirmation_request(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<bool, DeliveryError> {
        self.tx
            .send(OutgoingMessage::confirmation(request))
            .await
            .map_err(|_| DeliveryError::ChannelClosed {
                channel: request.channel.clone(),
            })?;
        Ok(true)
    }
}

/// Render the operator-facing text of a confirmation request.
pub fn format_confirmation_message(request: &ConfirmationRequest) -> String {
    let mut message = format!(
        "🔐 *Approval required* [{id}]\n\
         Category: {category}\n\
         Risk: {risk}\n\
         Command: {command}\n",
        id = request.operation_id,
        category = request.category,
        risk = request.risk_level,
        command = request.command_preview,
    );
    if !request.description.is_empty() && request.description != request.command_preview {
        message.push_str(&format!("Details: {}\n", request.description));
    }
    message.push_str(&format!(
        "Expires in {}s. No reply counts as a rejection.\n\
         Reply `approve {id}`, `reject {id}` or `kill all`.",
        request.timeout.as_secs(),
        id = request.operation_id,
    ));
    message
}
