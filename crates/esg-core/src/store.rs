//! The `AnalysisStore` trait and the records it reads and writes.
//!
//! The trait is implemented by storage backends (e.g. `esg-store-sqlite`).
//! Every read the pipeline performs goes through it; the store is the single
//! source of truth the cache gate relies on.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  company::{Company, CompanySummary},
  metric::{Metric, ValidatedMetrics},
  score::{ScoreCard, ScoreRecord},
};

// ─── Records ─────────────────────────────────────────────────────────────────

/// A scraped document not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
  pub url:        String,
  pub text:       String,
  pub scraped_at: DateTime<Utc>,
}

/// A scraped document owned by a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
  pub source_id:  Uuid,
  pub company_id: Uuid,
  pub url:        String,
  pub text:       String,
  pub scraped_at: DateTime<Utc>,
}

/// Input to [`AnalysisStore::save_analysis`].
#[derive(Debug, Clone)]
pub struct NewAnalysis {
  pub company_name: String,
  pub sources:      Vec<NewSource>,
  pub metrics:      ValidatedMetrics,
  pub score:        ScoreCard,
  /// Becomes the company's `last_updated`, each metric's extraction time and
  /// the score record's `computed_at`.
  pub analyzed_at:  DateTime<Utc>,
}

/// Everything stored for a company. `score` is `None` only when an earlier
/// write left the company unscored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
  pub company: Company,
  /// Newest first.
  pub sources: Vec<Source>,
  /// Schema order.
  pub metrics: Vec<Metric>,
  /// The score record written by the last save, which always matches
  /// `metrics`.
  pub score:   Option<ScoreRecord>,
}

impl StoredAnalysis {
  /// The complete analysis, if a score record exists.
  pub fn into_scored(self) -> Option<Analysis> {
    let Self { company, sources, metrics, score } = self;
    score.map(|score| Analysis { company, sources, metrics, score })
  }
}

/// A stored analysis that has a current score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
  pub company: Company,
  pub sources: Vec<Source>,
  pub metrics: Vec<Metric>,
  pub score:   ScoreRecord,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an analysis store backend.
///
/// Company names are matched ignoring case everywhere. All methods return
/// `Send` futures so the trait can be used in multi-threaded async runtimes
/// (e.g. tokio with `axum`).
pub trait AnalysisStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Atomically replace a company's analysis.
  ///
  /// Creates the company on first save. Prior sources and metrics are
  /// deleted, the new ones inserted, and a new score record appended that
  /// becomes the current score. If any step fails nothing is changed.
  fn save_analysis(
    &self,
    input: NewAnalysis,
  ) -> impl Future<Output = Result<Company, Self::Error>> + Send + '_;

  /// Delete a company and, by cascade, everything it owns. Returns `false`
  /// if no such company exists.
  fn delete_company<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete every company. Returns how many were removed.
  fn clear_all(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_company<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + 'a;

  /// The company's sources, metrics and current score, or `None` if the
  /// company is unknown.
  fn get_current<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<StoredAnalysis>, Self::Error>> + Send + 'a;

  /// The company's sources, newest first. Empty for unknown companies.
  fn get_sources<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<Source>, Self::Error>> + Send + 'a;

  /// Every score record of the company, most recently saved first.
  fn score_history<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>, Self::Error>> + Send + 'a;

  /// All companies with their current score, most recently updated first.
  fn list_companies(
    &self,
  ) -> impl Future<Output = Result<Vec<CompanySummary>, Self::Error>> + Send + '_;
}
