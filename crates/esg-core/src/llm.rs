//! Language-model collaborators.
//!
//! The pipeline needs two capabilities from a model: structured extraction
//! (JSON text that is validated afterwards) and free-form answers grounded in
//! supplied context. Adapters live in `esg-providers`.

use std::future::Future;

/// A system/user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
  pub system: String,
  pub user:   String,
}

impl Prompt {
  pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
    Self { system: system.into(), user: user.into() }
  }
}

/// Produces a JSON payload for a prompt. The output is untrusted: callers run
/// it through [`crate::validate`] or an equivalent parser.
pub trait Extractor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn extract_json<'a>(
    &'a self,
    prompt: &'a Prompt,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}

/// Answers a question from the context embedded in the prompt.
pub trait Answerer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn answer<'a>(
    &'a self,
    prompt: &'a Prompt,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}
