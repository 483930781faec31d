//! Model provider access
//!
//! The core only depends on [`CompletionProvider`]: one prompt in, one text
//! completion out. [`ChatClient`] implements it against an OpenAI-compatible
//! chat completions endpoint (Mistral by default).

pub mod client;
pub mod model;
pub mod provider;

pub use client::ChatClient;
pub use model::{ChatRequest, ChatResponse, Message};
pub use provider::{CompletionProvider, Credential};
