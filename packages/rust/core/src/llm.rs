//! The chat-completion capability.
//!
//! [`CompletionClient`] is the seam the extractor depends on: one structured
//! request in, untrusted text out. [`OpenAiClient`] is the production
//! implementation over an OpenAI-compatible `/chat/completions` endpoint;
//! tests substitute scripted implementations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use modulemap_shared::{ExtractOptions, ModuleMapError, Result};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("ModuleMap/", env!("CARGO_PKG_VERSION"));

/// Per-call timeout: completions can legitimately run long.
const COMPLETION_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// One structured-extraction completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed system role content.
    pub system_prompt: String,
    /// User role content: chunk plus instructions.
    pub user_prompt: String,
}

/// The completion capability: `complete(prompt) -> text | fails`.
pub trait CompletionClient {
    /// Submit one request and return the model's raw text reply.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String>>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible implementation
// ---------------------------------------------------------------------------

/// Production client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    opts: ExtractOptions,
}

impl OpenAiClient {
    /// Create a client with the default OpenAI endpoint.
    pub fn new(api_key: String, opts: ExtractOptions) -> Result<Self> {
        Self::with_base_url(api_key, opts, "https://api.openai.com/v1")
    }

    /// Create a client against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(
        api_key: String,
        opts: ExtractOptions,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(COMPLETION_TIMEOUT_SECS))
            .build()
            .map_err(|e| ModuleMapError::Completion(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            opts,
        })
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: self.opts.model.as_str(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.opts.temperature,
            max_tokens: self.opts.max_output_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = self.opts.model.as_str(), prompt_len = request.user_prompt.len(), "completion call");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModuleMapError::Completion(format!("transport failure: {e}")))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => {
                return Err(ModuleMapError::Completion(format!(
                    "authentication failed (HTTP {status})"
                )));
            }
            429 => {
                return Err(ModuleMapError::Completion("rate limited (HTTP 429)".into()));
            }
            _ if status.is_server_error() => {
                return Err(ModuleMapError::Completion(format!(
                    "server error (HTTP {status})"
                )));
            }
            _ if !status.is_success() => {
                return Err(ModuleMapError::Completion(format!("HTTP {status}")));
            }
            _ => {}
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModuleMapError::Completion(format!("unreadable response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ModuleMapError::Completion("response carried no choices".into()))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

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
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
