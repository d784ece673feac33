//! The structured result of one chat turn.
//!
//! Replies are data, not prose; the CLI renders them as text and the HTTP API
//! returns them as JSON tagged by `kind`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  company::CompanySummary,
  report::Report,
  score::{ScoreCard, ScoreLevel},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
  Analyzed {
    outcomes: Vec<CompanyOutcome>,
  },
  Comparison {
    /// Highest final score first.
    ranking:  Vec<RankedCompany>,
    winner:   String,
    /// Final-score lead of the winner over the runner-up.
    lead:     f64,
    gap:      ComparisonGap,
    failures: Vec<AnalysisFailure>,
  },
  Scores {
    reports:  Vec<ScoreReport>,
    failures: Vec<AnalysisFailure>,
  },
  Answer {
    company:     String,
    question:    String,
    answer:      String,
    final_score: f64,
    /// URLs of the sources used as context.
    sources:     Vec<String>,
  },
  /// A Markdown export of stored analyses.
  Report(Report),
  Deleted {
    deleted:   Vec<String>,
    not_found: Vec<String>,
  },
  Listing {
    companies: Vec<CompanySummary>,
  },
  Cleared {
    removed: usize,
  },
  /// The message was not understood; nothing was changed.
  Clarification {
    message: String,
  },
  /// The message was understood but cannot be carried out as given; nothing
  /// was changed.
  Invalid {
    message: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompanyOutcome {
  Analyzed(AnalysisOutcome),
  Failed(AnalysisFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
  pub company:           String,
  pub final_score:       f64,
  pub level:             ScoreLevel,
  pub environmental:     f64,
  pub social:            f64,
  pub governance:        f64,
  /// Served from a fresh stored analysis without new research.
  pub cached:            bool,
  pub source_count:      usize,
  pub failed_urls:       Vec<String>,
  pub defaulted_metrics: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFailure {
  pub company: String,
  pub reason:  String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCompany {
  pub company:       String,
  pub final_score:   f64,
  pub level:         ScoreLevel,
  pub environmental: f64,
  pub social:        f64,
  pub governance:    f64,
}

/// How decisive a comparison is, from the winner's lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonGap {
  /// More than 10 points.
  Significant,
  /// More than 5 points.
  Moderate,
  Close,
}

impl ComparisonGap {
  pub fn from_lead(lead: f64) -> Self {
    if lead > 10.0 {
      Self::Significant
    } else if lead > 5.0 {
      Self::Moderate
    } else {
      Self::Close
    }
  }
}

/// A metric singled out as a strength or weakness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
  pub name:  String,
  pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
  pub company:         String,
  pub card:            ScoreCard,
  pub computed_at:     DateTime<Utc>,
  /// The three highest-valued metrics.
  pub strengths:       Vec<Highlight>,
  /// The three lowest-valued metrics.
  pub weaknesses:      Vec<Highlight>,
  pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gap_bands_are_exclusive_lower_bounds() {
    assert_eq!(ComparisonGap::from_lead(10.01), ComparisonGap::Significant);
    assert_eq!(ComparisonGap::from_lead(10.0), ComparisonGap::Moderate);
    assert_eq!(ComparisonGap::from_lead(5.0), ComparisonGap::Close);
    assert_eq!(ComparisonGap::from_lead(0.0), ComparisonGap::Close);
  }

  #[test]
  fn replies_are_tagged_by_kind() {
    let json = serde_json::to_value(Reply::Cleared { removed: 3 }).unwrap();
    assert_eq!(json["kind"], "cleared");
    assert_eq!(json["removed"], 3);

    let json = serde_json::to_value(Reply::Analyzed {
      outcomes: vec![CompanyOutcome::Failed(AnalysisFailure {
        company: "Acme".into(),
        reason:  "no sources".into(),
      })],
    })
    .unwrap();
    assert_eq!(json["outcomes"][0]["status"], "failed");
    assert_eq!(json["outcomes"][0]["company"], "Acme");

    let json = serde_json::to_value(Reply::Report(Report {
      companies: vec!["Acme".into()],
      file_name: "Acme_Sustainability_Report_2024-05-01.md".into(),
      markdown:  "# Sustainability Report: Acme\n".into(),
    }))
    .unwrap();
    assert_eq!(json["kind"], "report");
    assert_eq!(json["file_name"], "Acme_Sustainability_Report_2024-05-01.md");
  }
}
