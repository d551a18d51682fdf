//! Human approval of sensitive operations.
//!
//! Sensitive operations wait in a registry until an operator approves or
//! rejects them. Silence past the policy timeout is a rejection, and a
//! kill switch cancels everything outstanding and refuses new requests for
//! a cool-down period.

mod delivery;
mod gate;
mod types;

pub use delivery::{
    ApprovalDelivery, ChannelDelivery, LogDelivery, OutgoingMessage, format_confirmation_message,
};
pub use gate::ApprovalGate;
pub use types::{
    ApprovalAction, ApprovalOutcome, ApprovalRequest, ConfirmationRequest, OperationStatus,
    OperatorReply, PendingOperationView, ResolveResult, parse_operator_reply,
};
