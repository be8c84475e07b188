//! Crate-wide error type.
//!
//! Every public operation returns `Result<_, HubError>`. The first four
//! variants are expected, caller-correctable conditions. `Invocation` means
//! the live model call failed or timed out; the request fails but the
//! service keeps running, and nothing is retried here. `Storage` means a
//! durable read or write failed before commit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// No agent definition exists for the given identity.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// The agent exists but its definition is disabled.
    #[error("agent is disabled: {0}")]
    Disabled(String),

    /// A create/update draft violated a field constraint.
    #[error("invalid agent definition: {0}")]
    Validation(String),

    /// The requested provider is unknown or has no credential configured.
    #[error("provider not available: {0}")]
    UnsupportedProvider(String),

    /// The live model call failed or timed out.
    #[error("model invocation failed: {0}")]
    Invocation(String),

    /// A durable read or write failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for HubError {
    fn from(e: rusqlite::Error) -> Self {
        HubError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for HubError {
    fn from(e: std::io::Error) -> Self {
        HubError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::Storage(e.to_string())
    }
}

impl From<serde_yaml::Error> for HubError {
    fn from(e: serde_yaml::Error) -> Self {
        HubError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for HubError {
    fn from(e: tokio::task::JoinError) -> Self {
        HubError::Storage(format!("blocking task failed: {}", e))
    }
}
