//! Classification over an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use triage::adapters::{AdapterError, AdapterResult, Classifier, TicketText};
use triage::classify::{build_triage_prompt, parse_triage_response, TRIAGE_SYSTEM_PROMPT};
use triage::TriageSuggestion;

use crate::config::LlmConfig;

const DEPENDENCY: &str = "classifier";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// First choice's content, or empty when the reply has none.
fn reply_content(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}

pub struct LlmClassifier {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    fn request(&self, text: &TicketText) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: TRIAGE_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_triage_prompt(text),
                },
            ],
            temperature: 0.2,
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &TicketText) -> AdapterResult<Option<TriageSuggestion>> {
        let mut request = self.http.post(&self.config.url).json(&self.request(text));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::unavailable(
                DEPENDENCY,
                format!("HTTP {}: {}", status, body),
            ));
        }

        // A 2xx with an unreadable body is a bad answer, not an outage.
        let chat: ChatResponse = match response.json().await {
            Ok(chat) => chat,
            Err(e) if e.is_timeout() => return Err(AdapterError::timeout(DEPENDENCY)),
            Err(e) => {
                warn!(error = %e, "Classifier reply is not a chat completion");
                return Ok(None);
            }
        };

        let content = reply_content(chat);
        debug!(chars = content.len(), "Classifier replied");
        Ok(parse_triage_response(&content))
    }
}

fn transport_error(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::timeout(DEPENDENCY)
    } else {
        AdapterError::unavailable(DEPENDENCY, e.to_string())
    }
}
