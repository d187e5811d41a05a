//! Language-model completion for Sage.
//!
//! A [`CompletionBackend`] performs one remote round trip; the
//! [`CompletionClient`] wraps a backend with a per-attempt deadline and the
//! bounded rate-limit retry. [`OpenAiBackend`] talks to an OpenAI-compatible
//! chat endpoint and [`CannedResponder`] answers offline.

pub mod backend;
pub mod canned;
pub mod client;
pub mod error;
pub mod mock;
pub mod openai;
pub mod request;

pub use backend::CompletionBackend;
pub use canned::CannedResponder;
pub use client::CompletionClient;
pub use error::CompletionError;
pub use mock::ScriptedBackend;
pub use openai::OpenAiBackend;
pub use request::{ChatMessage, CompletionOptions, CompletionRequest, Turn};
