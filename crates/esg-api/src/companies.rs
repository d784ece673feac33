//! Handlers for `/companies` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/companies` | Summaries, most recently updated first |
//! | `DELETE` | `/companies` | Returns `{"deleted": n}` |
//! | `GET`    | `/companies/:name` | Current analysis; 404 if unknown |
//! | `DELETE` | `/companies/:name` | 204, or 404 if unknown |
//! | `GET`    | `/companies/:name/history` | Score records, most recently saved first |
//! | `GET`    | `/companies/:name/report` | Markdown download; `?with=A,B` compares; 404 if any is unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use chrono::Utc;
use esg_core::{
  company::CompanySummary,
  report::{self, ReportOutcome},
  score::ScoreRecord,
  store::{AnalysisStore, StoredAnalysis},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{ChatBackend, error::ApiError};

fn not_found(name: &str) -> ApiError { ApiError::NotFound(format!("company {name} not found")) }

// ─── List / clear ────────────────────────────────────────────────────────────

/// `GET /companies`
pub async fn list<B: ChatBackend>(
  State(backend): State<Arc<B>>,
) -> Result<Json<Vec<CompanySummary>>, ApiError> {
  let companies = backend
    .store()
    .list_companies()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(companies))
}

/// `DELETE /companies`
pub async fn clear<B: ChatBackend>(State(backend): State<Arc<B>>) -> Result<Json<Value>, ApiError> {
  let deleted = backend.store().clear_all().await.map_err(ApiError::store)?;
  info!(deleted, "all companies cleared");
  Ok(Json(json!({ "deleted": deleted })))
}

// ─── One company ─────────────────────────────────────────────────────────────

/// `GET /companies/:name`
pub async fn get_one<B: ChatBackend>(
  State(backend): State<Arc<B>>,
  Path(name): Path<String>,
) -> Result<Json<StoredAnalysis>, ApiError> {
  let analysis = backend
    .store()
    .get_current(&name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&name))?;
  Ok(Json(analysis))
}

/// `GET /companies/:name/history`
pub async fn history<B: ChatBackend>(
  State(backend): State<Arc<B>>,
  Path(name): Path<String>,
) -> Result<Json<Vec<ScoreRecord>>, ApiError> {
  let store = backend.store();
  if store.get_company(&name).await.map_err(ApiError::store)?.is_none() {
    return Err(not_found(&name));
  }
  let history = store.score_history(&name).await.map_err(ApiError::store)?;
  Ok(Json(history))
}

/// `DELETE /companies/:name`
pub async fn delete_one<B: ChatBackend>(
  State(backend): State<Arc<B>>,
  Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
  let removed = backend
    .store()
    .delete_company(&name)
    .await
    .map_err(ApiError::store)?;
  if !removed {
    return Err(not_found(&name));
  }
  info!(company = %name, "company deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
  /// Comma-separated companies to compare against.
  #[serde(default)]
  pub with: Option<String>,
}

/// `GET /companies/:name/report`
pub async fn report<B: ChatBackend>(
  State(backend): State<Arc<B>>,
  Path(name): Path<String>,
  Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
  let mut companies = vec![name];
  companies.extend(
    query
      .with
      .iter()
      .flat_map(|list| list.split(','))
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .map(str::to_owned),
  );

  let outcome = report::assemble(backend.store(), &companies, Utc::now().date_naive())
    .await
    .map_err(ApiError::store)?;
  let report = match outcome {
    ReportOutcome::Ready(report) => report,
    ReportOutcome::Missing(missing) => {
      return Err(ApiError::NotFound(format!(
        "no analysis stored for {}",
        missing.join(", ")
      )));
    }
  };

  info!(file = %report.file_name, "report downloaded");
  let disposition = format!("attachment; filename=\"{}\"", report.file_name);
  Ok((
    [
      (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    report.markdown,
  ))
}
