//! Worker configuration, read from the environment.

use std::env;
use std::time::Duration;

const DEFAULT_LLM_URL: &str = "http://localhost:8000/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash-8b";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAIL_FROM: &str = "triage@localhost";

/// Chat-completions endpoint used for classification.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: env::var("TRIAGE_LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string()),
            model: env::var("TRIAGE_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            api_key: env::var("TRIAGE_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                env::var("TRIAGE_LLM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
        }
    }
}

/// Outgoing mail relay. Without a relay URL mail is only logged.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: env::var("TRIAGE_MAIL_RELAY_URL").ok().filter(|u| !u.is_empty()),
            from: env::var("TRIAGE_MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub llm: LlmConfig,
    pub mail: MailConfig,
}
