//! In-memory store and scripted collaborators for unit tests.

use std::{
  collections::HashMap,
  sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  company::{Company, CompanySummary, normalize_name},
  llm::{Answerer, Extractor, Prompt},
  metric::Metric,
  research::{Scraper, Search},
  schema,
  score::ScoreRecord,
  scoring,
  store::{AnalysisStore, NewAnalysis, NewSource, Source, StoredAnalysis},
  validate::validate,
};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FakeError(String);

impl FakeError {
  pub fn new(msg: impl Into<String>) -> Self { Self(msg.into()) }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// An extraction payload filling every schema metric with the same numbers.
pub fn full_payload(value: f64, confidence: f64) -> String {
  let metrics: Vec<_> = schema::metrics()
    .map(|(category, name)| {
      json!({
        "category": category.to_string(),
        "metric_name": name,
        "value": value,
        "confidence": confidence,
        "evidence": format!("{name} evidence"),
      })
    })
    .collect();
  json!({ "metrics": metrics }).to_string()
}

/// An extraction payload whose values rise by five per metric from 10, in
/// schema order, at full confidence.
pub fn graded_payload() -> String {
  let metrics: Vec<_> = schema::metrics()
    .enumerate()
    .map(|(i, (category, name))| {
      json!({
        "category": category.to_string(),
        "metric_name": name,
        "value": 10.0 + 5.0 * i as f64,
        "confidence": 1.0,
      })
    })
    .collect();
  json!({ "metrics": metrics }).to_string()
}

/// A complete analysis of `name` dated `at`, scoring 70 across the board.
pub fn sample_analysis(name: &str, at: DateTime<Utc>) -> NewAnalysis {
  let metrics = validate(&full_payload(70.0, 0.8));
  let score = scoring::score(&metrics);
  NewAnalysis {
    company_name: name.to_owned(),
    sources: vec![
      NewSource {
        url:        format!("https://{}.test/report", name.to_lowercase()),
        text:       format!("{name} publishes an annual sustainability report."),
        scraped_at: at,
      },
      NewSource {
        url:        format!("https://news.test/{}", name.to_lowercase()),
        text:       format!("{name} cut emissions last year."),
        scraped_at: at,
      },
    ],
    metrics,
    score,
    analyzed_at: at,
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

struct Entry {
  company: Company,
  sources: Vec<Source>,
  metrics: Vec<Metric>,
  scores:  Vec<ScoreRecord>,
}

impl Entry {
  fn new(name: String, at: DateTime<Utc>) -> Self {
    Self {
      company: Company {
        company_id:          Uuid::new_v4(),
        name,
        first_researched_at: at,
        last_updated:        at,
      },
      sources: Vec::new(),
      metrics: Vec::new(),
      scores:  Vec::new(),
    }
  }

  fn current_score(&self) -> Option<&ScoreRecord> { self.scores.last() }
}

#[derive(Default)]
pub struct MemoryStore {
  companies:   Mutex<HashMap<String, Entry>>,
  fail_writes: bool,
  saves:       AtomicUsize,
}

impl MemoryStore {
  /// A store whose writes all fail.
  pub fn failing_writes() -> Self { Self { fail_writes: true, ..Self::default() } }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    self.companies.lock().expect("store mutex poisoned")
  }

  pub async fn save(&self, input: NewAnalysis) -> Company {
    self.save_analysis(input).await.expect("save analysis")
  }

  /// A company with one source and no score, as a partial write leaves it.
  pub async fn insert_unscored(&self, name: &str, at: DateTime<Utc>) {
    let mut entry = Entry::new(name.to_owned(), at);
    entry.sources.push(Source {
      source_id:  Uuid::new_v4(),
      company_id: entry.company.company_id,
      url:        "https://partial.test".to_owned(),
      text:       "partial".to_owned(),
      scraped_at: at,
    });
    self.lock().insert(name.to_lowercase(), entry);
  }

  pub fn saves(&self) -> usize { self.saves.load(Ordering::SeqCst) }
}

impl AnalysisStore for MemoryStore {
  type Error = FakeError;

  async fn save_analysis(&self, input: NewAnalysis) -> Result<Company, FakeError> {
    if self.fail_writes {
      return Err(FakeError::new("disk full"));
    }
    let name = normalize_name(&input.company_name).map_err(|e| FakeError::new(e.to_string()))?;

    let mut companies = self.lock();
    let entry = companies
      .entry(name.to_lowercase())
      .or_insert_with(|| Entry::new(name, input.analyzed_at));
    let company_id = entry.company.company_id;

    entry.company.last_updated = input.analyzed_at;
    entry.sources = input
      .sources
      .into_iter()
      .map(|s| Source {
        source_id: Uuid::new_v4(),
        company_id,
        url: s.url,
        text: s.text,
        scraped_at: s.scraped_at,
      })
      .collect();
    entry.sources.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
    entry.metrics = input.metrics.into_inner();
    entry.scores.push(ScoreRecord {
      score_id: Uuid::new_v4(),
      company_id,
      computed_at: input.analyzed_at,
      card: input.score,
    });

    self.saves.fetch_add(1, Ordering::SeqCst);
    Ok(entry.company.clone())
  }

  async fn delete_company<'a>(&'a self, name: &'a str) -> Result<bool, FakeError> {
    if self.fail_writes {
      return Err(FakeError::new("disk full"));
    }
    Ok(self.lock().remove(&name.trim().to_lowercase()).is_some())
  }

  async fn clear_all(&self) -> Result<usize, FakeError> {
    if self.fail_writes {
      return Err(FakeError::new("disk full"));
    }
    let mut companies = self.lock();
    let removed = companies.len();
    companies.clear();
    Ok(removed)
  }

  async fn get_company<'a>(&'a self, name: &'a str) -> Result<Option<Company>, FakeError> {
    Ok(self.lock().get(&name.trim().to_lowercase()).map(|e| e.company.clone()))
  }

  async fn get_current<'a>(&'a self, name: &'a str) -> Result<Option<StoredAnalysis>, FakeError> {
    Ok(self.lock().get(&name.trim().to_lowercase()).map(|e| StoredAnalysis {
      company: e.company.clone(),
      sources: e.sources.clone(),
      metrics: e.metrics.clone(),
      score:   e.current_score().cloned(),
    }))
  }

  async fn get_sources<'a>(&'a self, name: &'a str) -> Result<Vec<Source>, FakeError> {
    Ok(
      self
        .lock()
        .get(&name.trim().to_lowercase())
        .map(|e| e.sources.clone())
        .unwrap_or_default(),
    )
  }

  async fn score_history<'a>(&'a self, name: &'a str) -> Result<Vec<ScoreRecord>, FakeError> {
    let mut history = self
      .lock()
      .get(&name.trim().to_lowercase())
      .map(|e| e.scores.clone())
      .unwrap_or_default();
    history.reverse();
    Ok(history)
  }

  async fn list_companies(&self) -> Result<Vec<CompanySummary>, FakeError> {
    let mut summaries: Vec<_> = self
      .lock()
      .values()
      .map(|e| CompanySummary {
        company:     e.company.clone(),
        final_score: e.current_score().map(|s| s.card.final_score),
        level:       e.current_score().map(|s| s.card.level),
      })
      .collect();
    summaries.sort_by(|a, b| b.company.last_updated.cmp(&a.company.last_updated));
    Ok(summaries)
  }
}

// ─── Research collaborators ──────────────────────────────────────────────────

pub struct FakeSearch {
  result: Result<Vec<String>, FakeError>,
  calls:  AtomicUsize,
}

impl FakeSearch {
  pub fn returning<I, S>(urls: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { result: Ok(urls.into_iter().map(Into::into).collect()), calls: AtomicUsize::new(0) }
  }

  pub fn failing(error: FakeError) -> Self {
    Self { result: Err(error), calls: AtomicUsize::new(0) }
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Search for FakeSearch {
  type Error = FakeError;

  async fn search<'a>(&'a self, _query: &'a str) -> Result<Vec<String>, FakeError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.result.clone()
  }
}

/// Serves registered pages; any other URL fails.
#[derive(Default)]
pub struct FakeScraper {
  pages: HashMap<String, Result<String, FakeError>>,
  calls: AtomicUsize,
}

impl FakeScraper {
  pub fn page(mut self, url: &str, text: &str) -> Self {
    self.pages.insert(url.to_owned(), Ok(text.to_owned()));
    self
  }

  pub fn failing(mut self, url: &str) -> Self {
    self.pages.insert(url.to_owned(), Err(FakeError::new("timed out")));
    self
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Scraper for FakeScraper {
  type Error = FakeError;

  async fn scrape<'a>(&'a self, url: &'a str) -> Result<String, FakeError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .pages
      .get(url)
      .cloned()
      .unwrap_or_else(|| Err(FakeError::new(format!("404 for {url}"))))
  }
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// Answers intent prompts with a scripted classification and every other
/// extraction prompt with a metrics payload.
pub struct FakeModel {
  extraction:    Option<String>,
  intent:        Option<String>,
  answer:        Option<String>,
  extract_calls: AtomicUsize,
  answer_calls:  AtomicUsize,
  last_prompt:   Mutex<Option<Prompt>>,
}

impl Default for FakeModel {
  fn default() -> Self {
    Self {
      extraction:    Some(full_payload(70.0, 0.8)),
      intent:        None,
      answer:        Some("They report steady emission cuts.".to_owned()),
      extract_calls: AtomicUsize::new(0),
      answer_calls:  AtomicUsize::new(0),
      last_prompt:   Mutex::new(None),
    }
  }
}

impl FakeModel {
  /// Every call fails.
  pub fn failing() -> Self {
    Self { extraction: None, intent: None, answer: None, ..Self::default() }
  }

  pub fn with_extraction(mut self, payload: impl Into<String>) -> Self {
    self.extraction = Some(payload.into());
    self
  }

  pub fn with_intent(mut self, payload: impl Into<String>) -> Self {
    self.intent = Some(payload.into());
    self
  }

  pub fn extract_calls(&self) -> usize { self.extract_calls.load(Ordering::SeqCst) }

  pub fn answer_calls(&self) -> usize { self.answer_calls.load(Ordering::SeqCst) }

  pub fn last_prompt(&self) -> Option<Prompt> {
    self.last_prompt.lock().expect("prompt mutex poisoned").clone()
  }

  fn record(&self, prompt: &Prompt) {
    *self.last_prompt.lock().expect("prompt mutex poisoned") = Some(prompt.clone());
  }
}

impl Extractor for FakeModel {
  type Error = FakeError;

  async fn extract_json<'a>(&'a self, prompt: &'a Prompt) -> Result<String, FakeError> {
    self.record(prompt);
    if prompt.system.contains("intent") {
      return self.intent.clone().ok_or_else(|| FakeError::new("model offline"));
    }
    self.extract_calls.fetch_add(1, Ordering::SeqCst);
    self.extraction.clone().ok_or_else(|| FakeError::new("model offline"))
  }
}

impl Answerer for FakeModel {
  type Error = FakeError;

  async fn answer<'a>(&'a self, prompt: &'a Prompt) -> Result<String, FakeError> {
    self.record(prompt);
    self.answer_calls.fetch_add(1, Ordering::SeqCst);
    self.answer.clone().ok_or_else(|| FakeError::new("model offline"))
  }
}
