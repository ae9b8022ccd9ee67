//! LLM provider abstraction for kasane.
//!
//! Wraps rig-core's provider clients behind a [`Provider`] struct with enum
//! dispatch, keeping provider-specific details out of the compaction engine.
//! Supports Anthropic, OpenAI, OpenRouter, and Ollama (local).

mod client;
mod kind;
mod listing;
mod resolve;

pub use client::Provider;
pub use listing::list_models;
pub use resolve::{resolve_model, resolve_summary_model};
