//! sage-ai: Streaming chat-completion client
//!
//! This crate provides the wire-level client for an OpenAI-style chat
//! completions endpoint: typed messages, a model registry with context
//! window data, and an SSE stream of incremental text fragments.

pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod types;

pub use client::ChatClient;
pub use error::{Error, Result};
pub use stream::FragmentStream;
pub use types::*;
