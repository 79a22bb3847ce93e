//! Core types and trait definitions for the trial-matching engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store, classifier, registry, and engine crates all depend on it; it
//! depends on nothing proprietary.

// Native `async fn` in traits; the `Send` bounds are spelled out on each
// method's returned future.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod matching;
pub mod notify;
pub mod patient;
pub mod registry;
pub mod retry;
pub mod sanitize;
pub mod store;
pub mod trial;

pub use error::{Error, Result};
