//! Score types produced by [`crate::scoring`] and persisted as score records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::schema::Category;

// ─── Level ───────────────────────────────────────────────────────────────────

/// Qualitative rating of a final score.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum ScoreLevel {
  Excellent,
  Good,
  Fair,
  Poor,
  #[serde(rename = "Very Poor")]
  #[strum(serialize = "Very Poor")]
  VeryPoor,
}

impl ScoreLevel {
  /// Lower bounds are inclusive: 85 is Excellent, 84.99 is Good.
  pub fn from_score(score: f64) -> Self {
    if score >= 85.0 {
      Self::Excellent
    } else if score >= 70.0 {
      Self::Good
    } else if score >= 50.0 {
      Self::Fair
    } else if score >= 30.0 {
      Self::Poor
    } else {
      Self::VeryPoor
    }
  }
}

// ─── Score card ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
  pub name:       String,
  pub value:      f64,
  pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
  pub category:     Category,
  pub score:        f64,
  /// Mean confidence across the category's metrics.
  pub confidence:   f64,
  pub metric_count: usize,
  pub metrics:      Vec<MetricScore>,
}

/// The computed result of scoring one validated metric set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
  pub final_score:   f64,
  pub level:         ScoreLevel,
  pub environmental: f64,
  pub social:        f64,
  pub governance:    f64,
  pub breakdown:     Vec<CategoryBreakdown>,
}

impl ScoreCard {
  pub fn category_score(&self, category: Category) -> f64 {
    match category {
      Category::Environmental => self.environmental,
      Category::Social => self.social,
      Category::Governance => self.governance,
    }
  }

  pub fn breakdown_for(&self, category: Category) -> Option<&CategoryBreakdown> {
    self.breakdown.iter().find(|b| b.category == category)
  }
}

// ─── Persisted record ────────────────────────────────────────────────────────

/// A score card as stored for a company. The most recent record is the
/// company's current score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
  pub score_id:    Uuid,
  pub company_id:  Uuid,
  pub computed_at: DateTime<Utc>,
  #[serde(flatten)]
  pub card:        ScoreCard,
}
