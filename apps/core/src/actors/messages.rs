use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::models::Dataset;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// An error originating from the analysis agent or its HTTP backend.
    #[error("Agent request failed: {0}")]
    AgentError(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the `AgentActor`.
#[derive(Debug)]
pub enum AgentMessage {
    /// Answer a free-form question about a dataset snapshot.
    Ask {
        dataset: Arc<Dataset>,
        question: String,
        /// A channel to send the agent's answer back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}
