use crate::actors::messages::AppError;
use crate::models::Dataset;
use async_trait::async_trait;
use std::sync::Arc;

/// Defines the public interface for the free-form analysis agent.
///
/// The agent is consulted only when the built-in rules cannot answer. Any
/// backend (remote chat-completions API, a canned stand-in in tests) can sit
/// behind this trait.
#[async_trait]
pub trait AgentActor: Send + Sync + 'static {
    /// Answers `question` using `dataset` as its only source of facts.
    async fn ask(&self, dataset: Arc<Dataset>, question: String) -> Result<String, AppError>;
}
