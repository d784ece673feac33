//! The company aggregate root, owner of sources, metrics and scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, score::ScoreLevel};

/// A researched company. Names are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
  pub company_id:          Uuid,
  pub name:                String,
  pub first_researched_at: DateTime<Utc>,
  /// Set on every successful save; the cache gate measures freshness from it.
  pub last_updated:        DateTime<Utc>,
}

/// A company together with its current headline score, if it has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
  pub company:     Company,
  pub final_score: Option<f64>,
  pub level:       Option<ScoreLevel>,
}

/// Trim a user- or model-supplied company name and collapse inner runs of
/// whitespace. Empty names are rejected.
pub fn normalize_name(raw: &str) -> Result<String> {
  let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
  if name.is_empty() {
    return Err(Error::EmptyCompanyName);
  }
  Ok(name)
}
