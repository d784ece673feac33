//! Research coordination: turn a company name into scraped source documents.
//!
//! One search call produces candidate URLs; each candidate is scraped
//! independently. A failed or empty scrape is recorded and skipped, and the
//! research succeeds as long as at least one source has text.

use std::{collections::HashSet, future::Future};

use chrono::Utc;
use futures::{StreamExt as _, stream};
use thiserror::Error;
use tracing::{info, warn};

use crate::{prompts, store::NewSource};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ─── Collaborators ───────────────────────────────────────────────────────────

/// A web search capability returning candidate URLs for a query.
pub trait Search: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn search<'a>(
    &'a self,
    query: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}

/// A scraping capability returning the readable text of a page.
pub trait Scraper: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn scrape<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchConfig {
  /// Most search results considered.
  pub search_limit:     usize,
  /// Sources to collect per company unless a request overrides it.
  pub source_limit:     usize,
  /// Scrapes in flight at once.
  pub concurrency:      usize,
  /// Scraped text beyond this many characters is cut off.
  pub max_source_chars: usize,
}

impl Default for ResearchConfig {
  fn default() -> Self {
    Self {
      search_limit:     10,
      source_limit:     5,
      concurrency:      4,
      max_source_chars: 50_000,
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Research {
  pub sources:     Vec<NewSource>,
  /// URLs whose scrape failed or returned no text.
  pub failed_urls: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ResearchError {
  /// The search collaborator failed (`source` is set) or found nothing.
  #[error("research unavailable for {company}")]
  Unavailable {
    company: String,
    #[source]
    source:  Option<BoxError>,
  },

  #[error("no source yielded content for {company} ({} URLs failed)", failed_urls.len())]
  NoContent {
    company:     String,
    failed_urls: Vec<String>,
  },
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct ResearchCoordinator<Se, Sc> {
  search:  Se,
  scraper: Sc,
  config:  ResearchConfig,
}

impl<Se: Search, Sc: Scraper> ResearchCoordinator<Se, Sc> {
  pub fn new(search: Se, scraper: Sc, config: ResearchConfig) -> Self {
    Self { search, scraper, config }
  }

  pub fn config(&self) -> &ResearchConfig { &self.config }

  pub async fn research(&self, company: &str) -> Result<Research, ResearchError> {
    self.research_with_limit(company, None).await
  }

  /// Research `company`, collecting at most `source_limit` sources (the
  /// configured limit when `None`).
  pub async fn research_with_limit(
    &self,
    company: &str,
    source_limit: Option<usize>,
  ) -> Result<Research, ResearchError> {
    let limit = source_limit.unwrap_or(self.config.source_limit).max(1);
    info!(company, limit, "starting research");

    let query = prompts::search_query(company);
    let urls = self.search.search(&query).await.map_err(|e| {
      warn!(company, error = %e, "search failed");
      ResearchError::Unavailable {
        company: company.to_owned(),
        source:  Some(Box::new(e)),
      }
    })?;

    // Twice the target, so a few failed scrapes can be made up for.
    let candidates = dedupe(urls, self.config.search_limit.min(limit * 2));
    if candidates.is_empty() {
      warn!(company, "search returned no candidate URLs");
      return Err(ResearchError::Unavailable {
        company: company.to_owned(),
        source:  None,
      });
    }

    let scraper = &self.scraper;
    let mut scrapes = stream::iter(candidates)
      .map(|url| async move {
        let outcome = scraper.scrape(&url).await;
        (url, outcome)
      })
      .buffer_unordered(self.config.concurrency.max(1));

    let mut sources = Vec::new();
    let mut failed_urls = Vec::new();

    while let Some((url, outcome)) = scrapes.next().await {
      match outcome {
        Ok(text) if !text.trim().is_empty() => {
          sources.push(NewSource {
            url,
            text:       truncate_chars(&text, self.config.max_source_chars),
            scraped_at: Utc::now(),
          });
          if sources.len() >= limit {
            break;
          }
        }
        Ok(_) => {
          warn!(url = %url, "scrape returned no text");
          failed_urls.push(url);
        }
        Err(e) => {
          warn!(url = %url, error = %e, "scrape failed");
          failed_urls.push(url);
        }
      }
    }

    if sources.is_empty() {
      return Err(ResearchError::NoContent {
        company: company.to_owned(),
        failed_urls,
      });
    }

    info!(
      company,
      sources = sources.len(),
      failed = failed_urls.len(),
      "research complete"
    );
    Ok(Research { sources, failed_urls })
  }
}

/// Trimmed, non-empty, first-seen URLs, at most `limit` of them.
fn dedupe(urls: Vec<String>, limit: usize) -> Vec<String> {
  let mut seen = HashSet::new();
  urls
    .into_iter()
    .map(|u| u.trim().to_owned())
    .filter(|u| !u.is_empty() && seen.insert(u.clone()))
    .take(limit)
    .collect()
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
  match text.char_indices().nth(max) {
    Some((cut, _)) => text[..cut].to_owned(),
    None => text.to_owned(),
  }
}
