//! Client for the external generative classifier.
//!
//! [`ClassifierClient`] turns a patient and a batch of trials into validated
//! [`ScoredMatch`](trialmatch_core::matching::ScoredMatch) proposals, and
//! free-text eligibility criteria into a structured JSON analysis. The
//! model itself sits behind [`CompletionBackend`]; [`AnthropicBackend`] is
//! the production implementation.

#![allow(async_fn_in_trait)]

pub mod anthropic;
pub mod backend;
mod client;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod redact;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use backend::{CompletionBackend, CompletionRequest};
pub use client::{ClassifierClient, ClassifierConfig};
pub use error::{Error, Result};
