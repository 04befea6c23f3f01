//! LLM fallback stage
//!
//! Terminal stage of the pipeline: sends a bounded prompt with the closed
//! category set to an external chat-completions endpoint and parses the
//! unstructured reply. Never returns `Miss` — transport failures, timeouts,
//! non-success statuses, and unparseable bodies all degrade to
//! `unclassified` rather than surfacing to the router.

use crate::reply::ReplyParser;
use crate::stage::StageClassifier;
use async_trait::async_trait;
use logsift_core::{Category, CategorySet, Error, LogEntry, Result, Stage, StageOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback reasoner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token; `None` for unauthenticated endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Messages longer than this are truncated before prompting
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Completion token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_prompt_chars: default_max_prompt_chars(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_prompt_chars() -> usize {
    2000
}

fn default_max_tokens() -> u32 {
    100
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// External-LLM classification stage
pub struct FallbackReasoner {
    name: String,
    client: reqwest::Client,
    config: FallbackConfig,
    categories: CategorySet,
    parser: ReplyParser,
}

impl FallbackReasoner {
    /// Create a reasoner; fails only on client construction defects
    pub fn new(config: FallbackConfig, categories: CategorySet) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            name: "fallback".to_string(),
            client,
            parser: ReplyParser::new(categories.clone()),
            categories,
            config,
        })
    }

    /// Build the bounded single-entry prompt
    fn prompt(&self, message: &str) -> String {
        let bounded = truncate_chars(message, self.config.max_prompt_chars);
        let category_list = self
            .categories
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Classify the log message into exactly one of these categories: \
             {category_list}.\n\
             If you can't figure out a category, use \"unclassified\".\n\
             Respond with the category name only, no explanations.\n\
             Log message: {bounded}"
        )
    }

    /// One round trip to the completions endpoint
    async fn request(&self, message: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let prompt = self.prompt(message);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::external(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::external(format!(
                "completions endpoint returned {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::external(format!("malformed completion body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::external("completion contained no choices"))
    }
}

#[async_trait]
impl StageClassifier for FallbackReasoner {
    async fn classify(&self, entry: &LogEntry) -> Result<StageOutcome> {
        let label = match self.request(&entry.message).await {
            Ok(reply) => {
                debug!(source = %entry.source, "fallback reply received");
                self.parser.parse(&reply)
            }
            Err(e) => {
                warn!(source = %entry.source, error = %e, "fallback request degraded to unclassified");
                Category::unclassified()
            }
        };

        Ok(StageOutcome::Matched(label))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Stage {
        Stage::Fallback
    }
}

/// Truncate on a char boundary without allocating when already short
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
