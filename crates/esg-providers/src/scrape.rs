//! Firecrawl page scraping: a URL's main content as Markdown.

use esg_core::research::Scraper;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{Error, ProviderSettings, Result, check_status};

const SERVICE: &str = "Firecrawl";

#[derive(Clone)]
pub struct FirecrawlScraper {
  client:   reqwest::Client,
  base_url: String,
  api_key:  String,
}

impl FirecrawlScraper {
  pub fn new(client: reqwest::Client, settings: &ProviderSettings) -> Result<Self> {
    Ok(Self {
      client,
      base_url: settings.firecrawl_base_url.trim_end_matches('/').to_owned(),
      api_key: settings.firecrawl_key()?,
    })
  }
}

#[derive(Deserialize)]
struct ScrapeResponse {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  data:    Option<ScrapeData>,
  #[serde(default)]
  error:   Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
  #[serde(default)]
  markdown: Option<String>,
}

impl ScrapeResponse {
  /// The page's Markdown. A successful scrape of an empty page yields an
  /// empty string; the research step treats that as a failed URL.
  fn into_markdown(self) -> Result<String> {
    if !self.success {
      return Err(Error::Malformed {
        service: SERVICE,
        reason:  self.error.unwrap_or_else(|| "scrape was not successful".to_owned()),
      });
    }
    Ok(self.data.and_then(|d| d.markdown).unwrap_or_default())
  }
}

impl Scraper for FirecrawlScraper {
  type Error = Error;

  async fn scrape<'a>(&'a self, url: &'a str) -> Result<String> {
    let body = json!({
      "url": url,
      "formats": ["markdown"],
      "onlyMainContent": true,
      "waitFor": 1000,
    });

    let resp = self
      .client
      .post(format!("{}/v1/scrape", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await?;
    let resp = check_status(SERVICE, resp).await?;
    let markdown = resp.json::<ScrapeResponse>().await?.into_markdown()?;

    debug!(url, chars = markdown.len(), "page scraped");
    Ok(markdown)
  }
}
