//! One request/response turn: build messages, stream, render, commit.

use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use sage_ai::{ChatClient, ChatMessage, FragmentStream, GenerationParams, models};

use crate::history::ConversationHistory;
use crate::render::{StreamingRenderer, Theme};
use crate::tokens::TokenCounter;

const SYSTEM_PROMPT: &str = "You are an expert software engineer, you always give concise and \
     useful answers. Assume you are talking with another expert in your field.";

/// Abstraction over the completion service, so turns can run against a
/// scripted double in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Open a streaming completion for the given model and message list
    async fn open_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> sage_ai::Result<FragmentStream>;
}

#[async_trait]
impl CompletionClient for sage_ai::ChatClient {
    async fn open_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> sage_ai::Result<FragmentStream> {
        ChatClient::open_stream(self, model, messages, params).await
    }
}

/// Per-session configuration bundle
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model identifier sent with each request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens the model may generate per response
    pub max_response_tokens: u32,
    /// Code span colors
    pub theme: Theme,
    /// Whether to print the context-usage line after each turn
    pub show_usage: bool,
}

/// Token accounting for one finished turn, used only for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub limit_tokens: usize,
}

/// Format the usage indicator, right-aligned to the given width
pub fn format_usage_line(snapshot: &UsageSnapshot, width: usize) -> String {
    let line = format!(
        "[context: {} prompt + {} completion / limit {}]",
        snapshot.prompt_tokens, snapshot.completion_tokens, snapshot.limit_tokens
    );
    format!("{:>width$}", line, width = width)
}

enum TurnError {
    Io(io::Error),
    Service {
        op: &'static str,
        error: sage_ai::Error,
    },
}

impl From<io::Error> for TurnError {
    fn from(e: io::Error) -> Self {
        TurnError::Io(e)
    }
}

/// Orchestrates request/response turns against the completion service.
///
/// Owns the conversation history and the per-turn stream state; one turn
/// is processed fully before the next begins.
pub struct AssistantSession {
    config: SessionConfig,
    client: Arc<dyn CompletionClient>,
    counter: Arc<dyn TokenCounter>,
    history: ConversationHistory,
}

impl AssistantSession {
    /// Create a session. The history token budget is the model's context
    /// window minus the response reservation; unknown models get a
    /// conservative default window.
    pub fn new(
        config: SessionConfig,
        client: Arc<dyn CompletionClient>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let window = models::context_window_for(&config.model);
        let token_limit = window
            .saturating_sub(config.max_response_tokens)
            .max(1) as usize;
        let history = ConversationHistory::new(token_limit, counter.clone());
        Self {
            config,
            client,
            counter,
            history,
        }
    }

    /// The model id currently in use (may change after a fallback)
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Read-only view of the conversation history
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Drop all stored interactions
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Stored history styled for human review
    pub fn history_display(&self) -> String {
        self.history.format_for_display(self.config.theme)
    }

    /// Run one full turn: open the stream, render fragments as they
    /// arrive, then commit the interaction to history and report usage.
    ///
    /// Service failures are reported as a single line and leave history
    /// untouched; a rejected model id is retried once with the fallback
    /// model before being surfaced.
    pub async fn run_turn(&mut self, input: &str, out: &mut (impl Write + Send)) -> io::Result<()> {
        match self.stream_turn(input, out).await {
            Ok(response) => self.commit(input, &response, out),
            Err(TurnError::Io(e)) => Err(e),
            Err(TurnError::Service { op, error })
                if error.is_model_not_found() && self.config.model != models::FALLBACK_MODEL =>
            {
                tracing::debug!(model = %self.config.model, %op, "model rejected, retrying with fallback");
                writeln!(
                    out,
                    "\nModel '{}' not found. Falling back to '{}'.",
                    self.config.model,
                    models::FALLBACK_MODEL
                )?;
                self.config.model = models::FALLBACK_MODEL.to_string();
                match self.stream_turn(input, out).await {
                    Ok(response) => self.commit(input, &response, out),
                    Err(TurnError::Io(e)) => Err(e),
                    Err(TurnError::Service { op, error }) => self.report(op, &error, out),
                }
            }
            Err(TurnError::Service { op, error }) => self.report(op, &error, out),
        }
    }

    fn build_messages(&self, input: &str) -> Vec<ChatMessage> {
        let context = self.history.context();
        let system = if context.is_empty() {
            SYSTEM_PROMPT.to_string()
        } else {
            format!("{}\n\n{}", SYSTEM_PROMPT, context)
        };
        vec![ChatMessage::system(system), ChatMessage::user(input)]
    }

    async fn stream_turn(
        &self,
        input: &str,
        out: &mut (impl Write + Send),
    ) -> Result<String, TurnError> {
        let messages = self.build_messages(input);
        let params = GenerationParams {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_response_tokens),
        };

        let mut stream = self
            .client
            .open_stream(&self.config.model, &messages, &params)
            .await
            .map_err(|error| TurnError::Service {
                op: "open stream",
                error,
            })?;

        let mut renderer = StreamingRenderer::new(self.config.theme);
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => renderer.push(&fragment, out)?,
                Err(error) => {
                    // rendered partial output stays on screen, but styling
                    // must not bleed into the error report
                    renderer.finish(out)?;
                    return Err(TurnError::Service {
                        op: "read stream",
                        error,
                    });
                }
            }
        }
        Ok(renderer.finish(out)?)
    }

    fn commit(&mut self, input: &str, response: &str, out: &mut impl Write) -> io::Result<()> {
        let prompt_tokens = self.counter.count(input);
        let completion_tokens = self.counter.count(response);
        self.history.add_interaction(input, response);
        writeln!(out)?;

        if self.config.show_usage {
            let snapshot = UsageSnapshot {
                prompt_tokens,
                completion_tokens,
                limit_tokens: self.history.token_limit(),
            };
            let width = crossterm::terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(80);
            writeln!(out, "{}", format_usage_line(&snapshot, width))?;
        }
        Ok(())
    }

    fn report(&self, op: &str, error: &sage_ai::Error, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "\nAn error occurred [{}]: {}", op, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_ai::{Error, stream};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    /// Scripted client: pops one pre-built stream (or open error) per call
    /// and records the model each request was made with.
    struct ScriptedClient {
        responses: Mutex<VecDeque<sage_ai::Result<Vec<sage_ai::Result<String>>>>>,
        models_seen: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<sage_ai::Result<Vec<sage_ai::Result<String>>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                models_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn open_stream(
            &self,
            model: &str,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> sage_ai::Result<FragmentStream> {
            self.models_seen.lock().unwrap().push(model.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(items)) => Ok(stream::scripted(items)),
                Some(Err(e)) => Err(e),
                None => Err(Error::Sse("no scripted response".into())),
            }
        }
    }

    fn config(model: &str) -> SessionConfig {
        SessionConfig {
            model: model.to_string(),
            temperature: 0.7,
            max_response_tokens: 1024,
            theme: Theme::default(),
            show_usage: false,
        }
    }

    fn session(model: &str, client: Arc<ScriptedClient>) -> AssistantSession {
        AssistantSession::new(config(model), client, Arc::new(WordCounter))
    }

    fn ok_stream(fragments: &[&str]) -> sage_ai::Result<Vec<sage_ai::Result<String>>> {
        Ok(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    #[tokio::test]
    async fn test_successful_turn_commits_history() {
        let client = Arc::new(ScriptedClient::new(vec![ok_stream(&[
            "hello ",
            "```world```",
        ])]));
        let mut s = session("gpt-4", client);
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        assert_eq!(s.history().len(), 1);
        // stored response is the plain reconstruction, markers stripped
        assert_eq!(s.history().context(), "User: hi\nModel: hello world\n");
    }

    #[tokio::test]
    async fn test_context_flows_into_next_request() {
        let client = Arc::new(ScriptedClient::new(vec![
            ok_stream(&["four"]),
            ok_stream(&["eight"]),
        ]));
        let mut s = session("gpt-4", client.clone());
        let mut out = Vec::new();

        s.run_turn("what is two plus two", &mut out).await.unwrap();
        s.run_turn("double it", &mut out).await.unwrap();

        assert_eq!(s.history().len(), 2);
        let ctx = s.history().context();
        assert!(ctx.starts_with("User: what is two plus two\nModel: four\n"));
        assert!(ctx.contains("User: double it\nModel: eight\n"));
    }

    #[tokio::test]
    async fn test_open_failure_leaves_history_untouched() {
        let client = Arc::new(ScriptedClient::new(vec![Err(Error::RateLimited {
            retry_after: Some(10),
        })]));
        let mut s = session("gpt-4", client);
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        assert!(s.history().is_empty());
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("An error occurred [open stream]"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_discards_partial_response() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(vec![
            Ok("partial ".to_string()),
            Err(Error::Sse("connection reset".into())),
        ])]));
        let mut s = session("gpt-4", client);
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        assert!(s.history().is_empty());
        let text = String::from_utf8_lossy(&out);
        // partial output was rendered, then the failure reported
        assert!(text.contains("partial "));
        assert!(text.contains("An error occurred [read stream]"));
    }

    #[tokio::test]
    async fn test_model_not_found_retries_with_fallback() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(Error::ModelNotFound("gpt-9 does not exist".into())),
            ok_stream(&["recovered"]),
        ]));
        let mut s = session("gpt-9", client.clone());
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        let models_seen = client.models_seen.lock().unwrap().clone();
        assert_eq!(models_seen, vec!["gpt-9", models::FALLBACK_MODEL]);
        assert_eq!(s.model(), models::FALLBACK_MODEL);
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test]
    async fn test_model_not_found_twice_is_surfaced() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(Error::ModelNotFound("nope".into())),
            Err(Error::ModelNotFound("still nope".into())),
        ]));
        let mut s = session("gpt-9", client.clone());
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        assert_eq!(client.models_seen.lock().unwrap().len(), 2);
        assert!(s.history().is_empty());
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("An error occurred [open stream]"));
    }

    #[tokio::test]
    async fn test_model_not_found_on_fallback_model_not_retried() {
        let client = Arc::new(ScriptedClient::new(vec![Err(Error::ModelNotFound(
            "nope".into(),
        ))]));
        let mut s = session(models::FALLBACK_MODEL, client.clone());
        let mut out = Vec::new();

        s.run_turn("hi", &mut out).await.unwrap();

        assert_eq!(client.models_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_line_rendered_when_enabled() {
        let client = Arc::new(ScriptedClient::new(vec![ok_stream(&["two words"])]));
        let mut cfg = config("gpt-4");
        cfg.show_usage = true;
        let mut s = AssistantSession::new(cfg, client, Arc::new(WordCounter));
        let mut out = Vec::new();

        s.run_turn("three word prompt", &mut out).await.unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("[context: 3 prompt + 2 completion"));
    }

    #[test]
    fn test_format_usage_line_right_aligned() {
        let snapshot = UsageSnapshot {
            prompt_tokens: 5,
            completion_tokens: 7,
            limit_tokens: 100,
        };
        let line = format_usage_line(&snapshot, 60);
        assert_eq!(line.chars().count(), 60);
        assert!(line.starts_with(' '));
        assert!(line.ends_with("/ limit 100]"));
    }
}
