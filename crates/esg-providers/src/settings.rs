//! Provider endpoints, models and credentials.

use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_owned() }
fn default_model() -> String { "gpt-4o-mini".to_owned() }
fn default_perplexity_base_url() -> String { "https://api.perplexity.ai".to_owned() }
fn default_search_model() -> String { "sonar".to_owned() }
fn default_firecrawl_base_url() -> String { "https://api.firecrawl.dev".to_owned() }
fn default_timeout_secs() -> u64 { 60 }

/// The `[providers]` section of the configuration.
///
/// API keys left unset fall back to the conventional environment variables
/// (`OPENAI_API_KEY`, `PERPLEXITY_API_KEY`, `FIRECRAWL_API_KEY`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
  #[serde(default)]
  pub openai_api_key:      Option<String>,
  #[serde(default = "default_openai_base_url")]
  pub openai_base_url:     String,
  #[serde(default = "default_model")]
  pub model:               String,
  #[serde(default)]
  pub perplexity_api_key:  Option<String>,
  #[serde(default = "default_perplexity_base_url")]
  pub perplexity_base_url: String,
  #[serde(default = "default_search_model")]
  pub search_model:        String,
  #[serde(default)]
  pub firecrawl_api_key:   Option<String>,
  #[serde(default = "default_firecrawl_base_url")]
  pub firecrawl_base_url:  String,
  /// Per-request timeout for every provider.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:        u64,
}

impl Default for ProviderSettings {
  fn default() -> Self {
    Self {
      openai_api_key:      None,
      openai_base_url:     default_openai_base_url(),
      model:               default_model(),
      perplexity_api_key:  None,
      perplexity_base_url: default_perplexity_base_url(),
      search_model:        default_search_model(),
      firecrawl_api_key:   None,
      firecrawl_base_url:  default_firecrawl_base_url(),
      timeout_secs:        default_timeout_secs(),
    }
  }
}

impl ProviderSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  pub fn openai_key(&self) -> Result<String> {
    resolve_key(self.openai_api_key.as_deref(), "OPENAI_API_KEY", "OpenAI")
  }

  pub fn perplexity_key(&self) -> Result<String> {
    resolve_key(self.perplexity_api_key.as_deref(), "PERPLEXITY_API_KEY", "Perplexity")
  }

  pub fn firecrawl_key(&self) -> Result<String> {
    resolve_key(self.firecrawl_api_key.as_deref(), "FIRECRAWL_API_KEY", "Firecrawl")
  }
}

fn resolve_key(configured: Option<&str>, env: &str, service: &'static str) -> Result<String> {
  let from_env = std::env::var(env).ok();
  non_blank(configured)
    .or_else(|| non_blank(from_env.as_deref()))
    .map(str::to_owned)
    .ok_or(Error::MissingKey(service))
}

fn non_blank(key: Option<&str>) -> Option<&str> {
  key.map(str::trim).filter(|k| !k.is_empty())
}
