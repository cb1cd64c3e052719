use crate::actors::messages::{ActorError, AgentMessage, AppError};
use crate::actors::traits::AgentActor;
use crate::config::AppConfig;
use crate::ingest::write_csv;
use crate::models::Dataset;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Longest answer handed back to callers, in characters.
pub const MAX_ANSWER_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You are a data analyst for a fuel terminal. \
You are given a table of shipment records as CSV. Answer the user's question \
using only that table. Be concise and state the numbers you computed.";

/// A handle to the agent actor.
///
/// Cloneable; every clone talks to the same runner task over its mailbox.
#[derive(Clone)]
pub struct AgentActorHandle {
    sender: mpsc::Sender<AgentMessage>,
    reply_timeout: Duration,
}

impl AgentActorHandle {
    /// Spawns the runner on the current Tokio runtime.
    ///
    /// Returns `None` when no API key is configured; the agent is then
    /// simply unavailable rather than failing every request.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_key = config.agent_api_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(Self::spawn(AgentSettings {
            base_url: config.agent_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.agent_model.clone(),
            temperature: config.agent_temperature,
            request_timeout: config.agent_timeout(),
        }))
    }

    fn spawn(settings: AgentSettings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        // Leave the runner room to report its own timeout first.
        let reply_timeout = settings.request_timeout + Duration::from_secs(5);
        let actor = AgentActorRunner::new(receiver, settings);
        tokio::spawn(async move { actor.run().await });
        Self { sender, reply_timeout }
    }
}

#[async_trait]
impl AgentActor for AgentActorHandle {
    async fn ask(&self, dataset: Arc<Dataset>, question: String) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = AgentMessage::Ask {
            dataset,
            question,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| AppError::Actor(ActorError::Internal(e.to_string())))?;
        timeout(self.reply_timeout, recv)
            .await?
            .map_err(|e| AppError::Actor(ActorError::Internal(e.to_string())))?
    }
}

#[derive(Debug, Clone)]
struct AgentSettings {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    request_timeout: Duration,
}

// --- Actor Runner (Internal Logic) ---
struct AgentActorRunner {
    receiver: mpsc::Receiver<AgentMessage>,
    worker: AgentWorker,
}

impl AgentActorRunner {
    fn new(receiver: mpsc::Receiver<AgentMessage>, settings: AgentSettings) -> Self {
        Self {
            receiver,
            worker: AgentWorker {
                settings: Arc::new(settings),
                client: Client::new(),
            },
        }
    }

    async fn run(mut self) {
        info!("AgentActor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }
        info!("AgentActor stopped");
    }

    /// Each question gets its own task so a slow backend call never holds up
    /// the mailbox.
    fn handle_message(&self, msg: AgentMessage) {
        match msg {
            AgentMessage::Ask {
                dataset,
                question,
                responder,
            } => {
                let worker = self.worker.clone();
                tokio::spawn(async move {
                    let result = worker.answer(&dataset, &question).await;
                    if let Err(e) = &result {
                        warn!("Agent could not answer: {}", e);
                    }
                    let _ = responder.send(result);
                });
            }
        }
    }
}

/// Performs one chat-completions exchange. Cheap to clone.
#[derive(Clone)]
struct AgentWorker {
    settings: Arc<AgentSettings>,
    client: Client,
}

impl AgentWorker {
    fn build_request(&self, payload: &serde_json::Value) -> Result<reqwest::RequestBuilder, AppError> {
        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.settings.api_key))
            .map_err(|e| AppError::Config(format!("Invalid agent API key: {}", e)))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .headers(headers)
            .json(payload))
    }

    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    async fn answer(&self, dataset: &Dataset, question: &str) -> Result<String, AppError> {
        let table = write_csv(dataset)?;
        let payload = serde_json::json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Shipment data (CSV):\n{}\nQuestion: {}", table, question)
                }
            ]
        });

        timeout(self.settings.request_timeout, self.exchange(&payload)).await?
    }

    async fn exchange(&self, payload: &serde_json::Value) -> Result<String, AppError> {
        let res = self.build_request(payload)?.send().await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Actor(ActorError::AgentError(format!(
                "Agent request failed with status {}: {}",
                status, body
            ))));
        }

        let json: serde_json::Value = res.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AppError::Actor(ActorError::AgentError(
                    "Agent response had no message content".to_string(),
                ))
            })?;

        Ok(truncate_chars(content, MAX_ANSWER_CHARS))
    }
}

/// Keeps at most `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
