//! Perplexity web search: the URLs cited by an answer to the research query.

use esg_core::research::Search;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{ProviderSettings, Result, check_status};

const SYSTEM: &str =
  "You are a sustainability research assistant. Provide credible sources with URLs.";

#[derive(Clone)]
pub struct PerplexitySearch {
  client:   reqwest::Client,
  base_url: String,
  api_key:  String,
  model:    String,
}

impl PerplexitySearch {
  pub fn new(client: reqwest::Client, settings: &ProviderSettings) -> Result<Self> {
    Ok(Self {
      client,
      base_url: settings.perplexity_base_url.trim_end_matches('/').to_owned(),
      api_key: settings.perplexity_key()?,
      model: settings.search_model.clone(),
    })
  }
}

#[derive(Deserialize)]
struct SearchResponse {
  #[serde(default)]
  citations:      Vec<String>,
  #[serde(default)]
  search_results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
  url: String,
}

impl SearchResponse {
  /// Citations when present, otherwise the URLs of the raw search results.
  fn into_urls(self) -> Vec<String> {
    if self.citations.is_empty() {
      self.search_results.into_iter().map(|r| r.url).collect()
    } else {
      self.citations
    }
  }
}

impl Search for PerplexitySearch {
  type Error = crate::Error;

  async fn search<'a>(&'a self, query: &'a str) -> Result<Vec<String>> {
    let body = json!({
      "model": self.model,
      "messages": [
        { "role": "system", "content": SYSTEM },
        { "role": "user", "content": query },
      ],
      "temperature": 0.2,
      "max_tokens": 1000,
    });

    let resp = self
      .client
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await?;
    let resp = check_status("Perplexity", resp).await?;
    let urls = resp.json::<SearchResponse>().await?.into_urls();

    debug!(count = urls.len(), "search returned urls");
    Ok(urls)
  }
}
