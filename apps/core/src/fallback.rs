//! Hands questions the rules could not answer to the optional agent.

use std::sync::Arc;
use tracing::{info, warn};

use crate::actors::agent::{truncate_chars, MAX_ANSWER_CHARS};
use crate::actors::traits::AgentActor;
use crate::models::{AnalysisResult, Dataset};

/// Delegates to the agent when one is configured.
#[derive(Clone, Default)]
pub struct FallbackResponder {
    agent: Option<Arc<dyn AgentActor>>,
}

impl FallbackResponder {
    pub fn new(agent: Option<Arc<dyn AgentActor>>) -> Self {
        Self { agent }
    }

    pub fn is_configured(&self) -> bool {
        self.agent.is_some()
    }

    /// Returns the agent's answer, cut to [`MAX_ANSWER_CHARS`] characters, or
    /// `rule_result` untouched when no agent is configured. Agent failures
    /// never escape: they are reported in the text, followed by the
    /// rule-based text.
    pub async fn delegate(&self, dataset: Arc<Dataset>, question: &str, rule_result: AnalysisResult) -> AnalysisResult {
        let Some(agent) = &self.agent else {
            return rule_result;
        };

        info!("Delegating question to agent");
        match agent.ask(dataset, question.to_string()).await {
            Ok(answer) => AnalysisResult::text(truncate_chars(&answer, MAX_ANSWER_CHARS)),
            Err(e) => {
                warn!("Agent fallback failed: {}", e);
                AnalysisResult::text(format!(
                    "AI analysis failed: {}. Falling back to rules.\n{}",
                    e, rule_result.text
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::messages::{ActorError, AppError};
    use crate::brain::rules::UNANSWERED_TEXT;
    use async_trait::async_trait;

    struct CannedAgent(Result<String, AppError>);

    #[async_trait]
    impl AgentActor for CannedAgent {
        async fn ask(&self, _dataset: Arc<Dataset>, _question: String) -> Result<String, AppError> {
            self.0.clone()
        }
    }

    fn unanswered() -> AnalysisResult {
        AnalysisResult::text(UNANSWERED_TEXT)
    }

    #[tokio::test]
    async fn test_without_agent_returns_rule_result() {
        let responder = FallbackResponder::default();
        assert!(!responder.is_configured());
        let result = responder
            .delegate(Arc::new(Dataset::default()), "why?", unanswered())
            .await;
        assert_eq!(result, unanswered());
    }

    #[tokio::test]
    async fn test_agent_answer_is_returned() {
        let responder = FallbackResponder::new(Some(Arc::new(CannedAgent(Ok("Bay 3.".to_string()))) as Arc<dyn AgentActor>));
        let result = responder
            .delegate(Arc::new(Dataset::default()), "why?", unanswered())
            .await;
        assert_eq!(result, AnalysisResult::text("Bay 3."));
    }

    #[tokio::test]
    async fn test_agent_failure_combines_failure_and_rule_text() {
        let err = AppError::Actor(ActorError::AgentError("status 503".to_string()));
        let responder = FallbackResponder::new(Some(Arc::new(CannedAgent(Err(err))) as Arc<dyn AgentActor>));
        let result = responder
            .delegate(Arc::new(Dataset::default()), "why?", unanswered())
            .await;

        assert!(result.text.starts_with("AI analysis failed: Actor error: Agent request failed: status 503."));
        assert!(result.text.ends_with(&format!("Falling back to rules.\n{}", UNANSWERED_TEXT)));
        assert!(result.image_url.is_none());
    }

    #[tokio::test]
    async fn test_long_agent_answer_is_truncated() {
        let long = "x".repeat(MAX_ANSWER_CHARS * 2);
        let responder = FallbackResponder::new(Some(Arc::new(CannedAgent(Ok(long))) as Arc<dyn AgentActor>));
        let result = responder
            .delegate(Arc::new(Dataset::default()), "why?", unanswered())
            .await;
        assert_eq!(result.text.chars().count(), MAX_ANSWER_CHARS);
    }
}
