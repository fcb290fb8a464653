//! OpenAI-style chat completions streaming client

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::FragmentStream,
    types::{ChatMessage, GenerationParams},
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streaming chat completions client
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the OPENAI_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Override the endpoint base URL (proxies, compatible servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Open a completion stream for the given model and message list.
    ///
    /// The returned stream yields one text fragment per content delta.
    /// Chunks without content (role headers, empty deltas) are skipped.
    pub async fn open_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<FragmentStream> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            stream: true,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(model, messages = messages.len(), "opening completion stream");

        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(fragment_stream(event_source)))
    }
}

fn fragment_stream(mut event_source: EventSource) -> impl futures::Stream<Item = Result<String>> {
    stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }

                    let chunk: std::result::Result<StreamChunk, _> =
                        serde_json::from_str(&msg.data);
                    match chunk {
                        Ok(chunk) => {
                            for choice in chunk.choices {
                                if let Some(content) = choice.delta.content {
                                    if !content.is_empty() {
                                        yield Ok(content);
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(Error::UnexpectedResponse(format!(
                                "Failed to parse chunk: {}",
                                e
                            )));
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());
                    let body = response.text().await.unwrap_or_default();
                    yield Err(classify_http_error(status, retry_after, &body));
                    return;
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    yield Err(Error::Http(e));
                    return;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    return;
                }
            }
        }
    }
}

/// Map a non-2xx response to a typed error using the status code and the
/// API error payload, when one is present.
fn classify_http_error(
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> Error {
    let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
    let (error_type, code, message) = match parsed {
        Some(r) => (
            r.error.error_type.unwrap_or_default(),
            r.error.code.unwrap_or_default(),
            r.error.message,
        ),
        None => (String::new(), String::new(), body.to_string()),
    };

    if code == "model_not_found" || status == reqwest::StatusCode::NOT_FOUND {
        return Error::ModelNotFound(message);
    }
    match status.as_u16() {
        401 | 403 => Error::Auth(message),
        429 => Error::RateLimited { retry_after },
        _ => Error::Api {
            error_type: if error_type.is_empty() {
                status.to_string()
            } else {
                error_type
            },
            message,
        },
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

// Error response payload

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}
