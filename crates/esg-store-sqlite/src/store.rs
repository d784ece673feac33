//! [`SqliteStore`], the SQLite implementation of [`AnalysisStore`].

use std::path::Path;

use esg_core::{
  company::{Company, CompanySummary, normalize_name},
  score::ScoreRecord,
  store::{AnalysisStore, NewAnalysis, Source, StoredAnalysis},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    RawCompany, RawMetric, RawScore, RawSource, RawSummary, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An analysis store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn company_by_name(
  conn: &rusqlite::Connection,
  name: &str,
) -> rusqlite::Result<Option<RawCompany>> {
  conn
    .query_row(
      &format!("SELECT {} FROM companies WHERE name = ?1", RawCompany::COLUMNS),
      rusqlite::params![name],
      RawCompany::from_row,
    )
    .optional()
}

fn sources_of(conn: &rusqlite::Connection, company_id: &str) -> rusqlite::Result<Vec<RawSource>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM sources WHERE company_id = ?1 ORDER BY scraped_at DESC, rowid DESC",
    RawSource::COLUMNS
  ))?;
  stmt
    .query_map(rusqlite::params![company_id], RawSource::from_row)?
    .collect()
}

/// Score records for a company, most recently saved first.
fn scores_of(
  conn: &rusqlite::Connection,
  company_id: &str,
  limit: Option<u32>,
) -> rusqlite::Result<Vec<RawScore>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM score_records WHERE company_id = ?1
     ORDER BY rowid DESC
     LIMIT ?2",
    RawScore::COLUMNS
  ))?;
  // SQLite treats a negative LIMIT as "no limit".
  let limit = limit.map_or(-1, i64::from);
  stmt
    .query_map(rusqlite::params![company_id, limit], RawScore::from_row)?
    .collect()
}

/// A normalised lookup key, or `None` for names that cannot exist.
fn lookup_key(name: &str) -> Option<String> { normalize_name(name).ok() }

// ─── AnalysisStore impl ──────────────────────────────────────────────────────

impl AnalysisStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────

  async fn save_analysis(&self, input: NewAnalysis) -> Result<Company> {
    let name = normalize_name(&input.company_name)?;
    let at_str = encode_dt(input.analyzed_at);

    let sources: Vec<(String, String, String, String)> = input
      .sources
      .into_iter()
      .map(|s| (encode_uuid(Uuid::new_v4()), s.url, s.text, encode_dt(s.scraped_at)))
      .collect();

    let metrics: Vec<_> = input
      .metrics
      .into_inner()
      .into_iter()
      .enumerate()
      .map(|(position, m)| {
        (
          encode_uuid(Uuid::new_v4()),
          position as i64,
          m.category.to_string(),
          m.name,
          m.value,
          m.confidence,
          m.origin.to_string(),
          m.evidence,
        )
      })
      .collect();

    let card = input.score;
    let score_id_str = encode_uuid(Uuid::new_v4());
    let breakdown_json = serde_json::to_string(&card.breakdown)?;
    let level_str = card.level.to_string();
    let new_id_str = encode_uuid(Uuid::new_v4());
    let source_count = sources.len();

    let raw: RawCompany = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO companies (company_id, name, first_researched_at, last_updated)
           VALUES (?1, ?2, ?3, ?3)
           ON CONFLICT(name) DO UPDATE SET last_updated = excluded.last_updated",
          rusqlite::params![new_id_str, name, at_str],
        )?;
        let company = company_by_name(&tx, &name)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        let company_id = company.company_id.clone();

        tx.execute("DELETE FROM sources WHERE company_id = ?1", rusqlite::params![company_id])?;
        tx.execute("DELETE FROM metrics WHERE company_id = ?1", rusqlite::params![company_id])?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO sources (source_id, company_id, url, text, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (source_id, url, text, scraped_at) in &sources {
            stmt.execute(rusqlite::params![source_id, company_id, url, text, scraped_at])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO metrics (
               metric_id, company_id, position, category, name,
               value, confidence, origin, evidence, extracted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (metric_id, position, category, name, value, confidence, origin, evidence) in &metrics
          {
            stmt.execute(rusqlite::params![
              metric_id, company_id, position, category, name, value, confidence, origin,
              evidence, at_str,
            ])?;
          }
        }

        tx.execute(
          "INSERT INTO score_records (
             score_id, company_id, final_score, environmental, social,
             governance, level, breakdown_json, computed_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            score_id_str,
            company_id,
            card.final_score,
            card.environmental,
            card.social,
            card.governance,
            level_str,
            breakdown_json,
            at_str,
          ],
        )?;

        tx.commit()?;
        Ok(company)
      })
      .await?;

    debug!(company = %raw.name, sources = source_count, "analysis saved");
    raw.into_company()
  }

  async fn delete_company<'a>(&'a self, name: &'a str) -> Result<bool> {
    let Some(name) = lookup_key(name) else {
      return Ok(false);
    };

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM companies WHERE name = ?1", rusqlite::params![name])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn clear_all(&self) -> Result<usize> {
    let removed = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM companies", [])?))
      .await?;
    debug!(removed, "all companies deleted");
    Ok(removed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn get_company<'a>(&'a self, name: &'a str) -> Result<Option<Company>> {
    let Some(name) = lookup_key(name) else {
      return Ok(None);
    };

    let raw = self
      .conn
      .call(move |conn| Ok(company_by_name(conn, &name)?))
      .await?;
    raw.map(RawCompany::into_company).transpose()
  }

  async fn get_current<'a>(&'a self, name: &'a str) -> Result<Option<StoredAnalysis>> {
    let Some(name) = lookup_key(name) else {
      return Ok(None);
    };

    let raw = self
      .conn
      .call(move |conn| {
        let Some(company) = company_by_name(conn, &name)? else {
          return Ok(None);
        };

        let sources = sources_of(conn, &company.company_id)?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM metrics WHERE company_id = ?1 ORDER BY position",
          RawMetric::COLUMNS
        ))?;
        let metrics = stmt
          .query_map(rusqlite::params![company.company_id], RawMetric::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let score = scores_of(conn, &company.company_id, Some(1))?.into_iter().next();
        Ok(Some((company, sources, metrics, score)))
      })
      .await?;

    let Some((company, sources, metrics, score)) = raw else {
      return Ok(None);
    };

    Ok(Some(StoredAnalysis {
      company: company.into_company()?,
      sources: sources
        .into_iter()
        .map(RawSource::into_source)
        .collect::<Result<_>>()?,
      metrics: metrics
        .into_iter()
        .map(RawMetric::into_metric)
        .collect::<Result<_>>()?,
      score:   score.map(RawScore::into_record).transpose()?,
    }))
  }

  async fn get_sources<'a>(&'a self, name: &'a str) -> Result<Vec<Source>> {
    let Some(name) = lookup_key(name) else {
      return Ok(Vec::new());
    };

    let raws = self
      .conn
      .call(move |conn| {
        Ok(match company_by_name(conn, &name)? {
          Some(company) => sources_of(conn, &company.company_id)?,
          None => Vec::new(),
        })
      })
      .await?;
    raws.into_iter().map(RawSource::into_source).collect()
  }

  async fn score_history<'a>(&'a self, name: &'a str) -> Result<Vec<ScoreRecord>> {
    let Some(name) = lookup_key(name) else {
      return Ok(Vec::new());
    };

    let raws = self
      .conn
      .call(move |conn| {
        Ok(match company_by_name(conn, &name)? {
          Some(company) => scores_of(conn, &company.company_id, None)?,
          None => Vec::new(),
        })
      })
      .await?;
    raws.into_iter().map(RawScore::into_record).collect()
  }

  async fn list_companies(&self) -> Result<Vec<CompanySummary>> {
    let raws: Vec<RawSummary> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT c.company_id, c.name, c.first_researched_at, c.last_updated,
                  s.final_score, s.level
           FROM companies c
           LEFT JOIN score_records s ON s.score_id = (
             SELECT score_id FROM score_records
             WHERE company_id = c.company_id
             ORDER BY rowid DESC
             LIMIT 1
           )
           ORDER BY c.last_updated DESC, c.name",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSummary {
              company:     RawCompany::from_row(row)?,
              final_score: row.get(4)?,
              level:       row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSummary::into_summary).collect()
  }
}
