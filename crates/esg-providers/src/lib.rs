//! HTTP adapters for the pipeline's external collaborators.
//!
//! - [`PerplexitySearch`] implements [`esg_core::research::Search`]
//! - [`FirecrawlScraper`] implements [`esg_core::research::Scraper`]
//! - [`OpenAiChat`] implements [`esg_core::llm::Extractor`] and
//!   [`esg_core::llm::Answerer`] against any OpenAI-compatible endpoint

mod chat;
mod scrape;
mod search;
mod settings;

pub mod error;

pub use chat::OpenAiChat;
pub use error::{Error, Result};
pub use scrape::FirecrawlScraper;
pub use search::PerplexitySearch;
pub use settings::ProviderSettings;

use std::time::Duration;

/// Build the shared HTTP client used by every adapter.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
  Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Reject non-success responses, keeping a bounded snippet of the body.
async fn check_status(
  service: &'static str,
  resp: reqwest::Response,
) -> Result<reqwest::Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  let body: String = body.chars().take(200).collect();
  Err(Error::Status { service, status: status.as_u16(), body })
}
