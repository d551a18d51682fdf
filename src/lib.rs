//! Vigil: an always-on agent loop with a human approval gate.
//!
//! The agent periodically perceives its state, asks a model what to do and
//! acts on the answer. Anything sensitive waits on the approval gate until an
//! operator approves it, rejects it, or the request times out.

pub mod agent;
pub mod approval;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod llm;
pub mod safety;

pub use config::Config;
pub use error::{Error, Result};
