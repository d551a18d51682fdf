//! Error types for vigil.
//!
//! Each subsystem owns an error enum; `Error` wraps them for callers that
//! want a single type. The classifier and the response parser are total and
//! have no error type.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was present but could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by a `Database` collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} {id}")]
    NotFound { entity: String, id: String },
}

/// Errors raised by an LLM provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} authentication failed")]
    AuthFailed { provider: String },

    #[error("Provider {provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors raised while handing a confirmation request to a delivery channel.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Channel {channel} is closed")]
    ChannelClosed { channel: String },

    #[error("Send to {channel} failed: {reason}")]
    SendFailed { channel: String, reason: String },
}

/// Errors raised by the secure executor's built-in units of work.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that abort a single agent cycle.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("perceive failed: {0}")]
    Perceive(#[source] DatabaseError),

    #[error("think failed: {0}")]
    Think(#[source] LlmError),

    #[error("decide failed: {0}")]
    Decide(#[source] DatabaseError),

    #[error("reflect failed: {0}")]
    Reflect(#[source] DatabaseError),

    #[error("memorize failed: {0}")]
    Memorize(#[source] DatabaseError),

    #[error("evolve failed: {0}")]
    Evolve(String),
}

/// Result type for vigil operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_carries_phase() {
        let err = AgentError::Perceive(DatabaseError::Query("connection reset".into()));
        let message = err.to_string();
        assert!(message.starts_with("perceive failed"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_top_level_wraps_subsystem_errors() {
        let err: Error = LlmError::AuthFailed {
            provider: "openai".into(),
        }
        .into();
        assert!(err.to_string().contains("openai"));
    }
}
