//! The seam between the classifier client and a concrete text-generation
//! endpoint.

use std::{future::Future, sync::Arc};

use crate::Result;

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
  pub system:     String,
  pub user:       String,
  pub max_tokens: u32,
}

/// A generative text endpoint. Implementations return the model's raw text;
/// redaction and parsing happen in [`crate::ClassifierClient`].
pub trait CompletionBackend: Send + Sync {
  fn complete(
    &self,
    request: &CompletionRequest,
  ) -> impl Future<Output = Result<String>> + Send;
}

impl<B: CompletionBackend> CompletionBackend for Arc<B> {
  async fn complete(&self, request: &CompletionRequest) -> Result<String> {
    (**self).complete(request).await
  }
}
