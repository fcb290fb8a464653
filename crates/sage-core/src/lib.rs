//! sage-core: the stateful heart of the assistant
//!
//! Combines a model-aware token counter, a token-budgeted rolling
//! conversation history, an incremental code-fence renderer, and the
//! session orchestrator that drives one request/response turn.

pub mod history;
pub mod render;
pub mod session;
pub mod tokens;

pub use history::{ConversationHistory, Interaction};
pub use render::{StreamingRenderer, Theme, format_text};
pub use session::{AssistantSession, CompletionClient, SessionConfig, UsageSnapshot};
pub use tokens::{BpeTokenCounter, TokenCounter};
