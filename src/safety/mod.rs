//! Sensitivity classification for proposed actions.
//!
//! This module decides whether an action needs human confirmation:
//! - Lexical classification of a command into an operation category
//! - A fixed category -> policy table (risk level, confirm, timeout)

mod classifier;
mod policy;

pub use classifier::{Classification, OperationContext, classify};
pub use policy::{OperationCategory, OperationPolicy, PolicyTable, RiskLevel};
