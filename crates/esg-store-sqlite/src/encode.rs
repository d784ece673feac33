//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order in SQL equals chronological order. UUIDs are
//! stored as hyphenated lowercase strings; enums by their string forms.

use chrono::{DateTime, SecondsFormat, Utc};
use esg_core::{
  company::{Company, CompanySummary},
  metric::{Metric, MetricOrigin},
  schema::Category,
  score::{ScoreCard, ScoreLevel, ScoreRecord},
  store::Source,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_category(s: &str) -> Result<Category> {
  s.parse()
    .map_err(|_| esg_core::Error::UnknownCategory(s.to_owned()).into())
}

fn decode_origin(s: &str) -> Result<MetricOrigin> {
  s.parse()
    .map_err(|_| esg_core::Error::UnknownOrigin(s.to_owned()).into())
}

fn decode_level(s: &str) -> Result<ScoreLevel> {
  s.parse()
    .map_err(|_| esg_core::Error::UnknownLevel(s.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `companies` row.
pub struct RawCompany {
  pub company_id:          String,
  pub name:                String,
  pub first_researched_at: String,
  pub last_updated:        String,
}

impl RawCompany {
  pub const COLUMNS: &'static str = "company_id, name, first_researched_at, last_updated";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      company_id:          row.get(0)?,
      name:                row.get(1)?,
      first_researched_at: row.get(2)?,
      last_updated:        row.get(3)?,
    })
  }

  pub fn into_company(self) -> Result<Company> {
    Ok(Company {
      company_id:          decode_uuid(&self.company_id)?,
      name:                self.name,
      first_researched_at: decode_dt(&self.first_researched_at)?,
      last_updated:        decode_dt(&self.last_updated)?,
    })
  }
}

/// A company row joined with its newest score, if any.
pub struct RawSummary {
  pub company:     RawCompany,
  pub final_score: Option<f64>,
  pub level:       Option<String>,
}

impl RawSummary {
  pub fn into_summary(self) -> Result<CompanySummary> {
    Ok(CompanySummary {
      company:     self.company.into_company()?,
      final_score: self.final_score,
      level:       self.level.as_deref().map(decode_level).transpose()?,
    })
  }
}

pub struct RawSource {
  pub source_id:  String,
  pub company_id: String,
  pub url:        String,
  pub text:       String,
  pub scraped_at: String,
}

impl RawSource {
  pub const COLUMNS: &'static str = "source_id, company_id, url, text, scraped_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:  row.get(0)?,
      company_id: row.get(1)?,
      url:        row.get(2)?,
      text:       row.get(3)?,
      scraped_at: row.get(4)?,
    })
  }

  pub fn into_source(self) -> Result<Source> {
    Ok(Source {
      source_id:  decode_uuid(&self.source_id)?,
      company_id: decode_uuid(&self.company_id)?,
      url:        self.url,
      text:       self.text,
      scraped_at: decode_dt(&self.scraped_at)?,
    })
  }
}

pub struct RawMetric {
  pub category:   String,
  pub name:       String,
  pub value:      f64,
  pub confidence: f64,
  pub origin:     String,
  pub evidence:   Option<String>,
}

impl RawMetric {
  pub const COLUMNS: &'static str = "category, name, value, confidence, origin, evidence";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      category:   row.get(0)?,
      name:       row.get(1)?,
      value:      row.get(2)?,
      confidence: row.get(3)?,
      origin:     row.get(4)?,
      evidence:   row.get(5)?,
    })
  }

  pub fn into_metric(self) -> Result<Metric> {
    Ok(Metric {
      category:   decode_category(&self.category)?,
      name:       self.name,
      value:      self.value,
      confidence: self.confidence,
      origin:     decode_origin(&self.origin)?,
      evidence:   self.evidence,
    })
  }
}

pub struct RawScore {
  pub score_id:       String,
  pub company_id:     String,
  pub final_score:    f64,
  pub environmental:  f64,
  pub social:         f64,
  pub governance:     f64,
  pub level:          String,
  pub breakdown_json: String,
  pub computed_at:    String,
}

impl RawScore {
  pub const COLUMNS: &'static str = "score_id, company_id, final_score, environmental, social, \
                             governance, level, breakdown_json, computed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      score_id:       row.get(0)?,
      company_id:     row.get(1)?,
      final_score:    row.get(2)?,
      environmental:  row.get(3)?,
      social:         row.get(4)?,
      governance:     row.get(5)?,
      level:          row.get(6)?,
      breakdown_json: row.get(7)?,
      computed_at:    row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<ScoreRecord> {
    Ok(ScoreRecord {
      score_id:    decode_uuid(&self.score_id)?,
      company_id:  decode_uuid(&self.company_id)?,
      computed_at: decode_dt(&self.computed_at)?,
      card:        ScoreCard {
        final_score:   self.final_score,
        level:         decode_level(&self.level)?,
        environmental: self.environmental,
        social:        self.social,
        governance:    self.governance,
        breakdown:     serde_json::from_str(&self.breakdown_json)?,
      },
    })
  }
}
