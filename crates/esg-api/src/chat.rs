//! `POST /chat`: one conversational turn.

use std::sync::Arc;

use axum::{Json, extract::State};
use esg_core::{pipeline::TurnOptions, reply::Reply};
use serde::Deserialize;

use crate::{ChatBackend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatBody {
  pub message:      String,
  /// Sources to research for analyses this message runs.
  #[serde(default)]
  pub source_limit: Option<usize>,
}

/// `POST /chat`, body: `{"message":"compare Tesla and Apple"}`, optionally
/// with `"source_limit": 3`.
pub async fn handler<B: ChatBackend>(
  State(backend): State<Arc<B>>,
  Json(body): Json<ChatBody>,
) -> Result<Json<Reply>, ApiError> {
  if body.message.trim().is_empty() {
    return Err(ApiError::BadRequest("message must not be empty".to_owned()));
  }
  if body.source_limit == Some(0) {
    return Err(ApiError::BadRequest("source_limit must be at least 1".to_owned()));
  }
  let opts = TurnOptions { source_limit: body.source_limit };
  let reply = backend.handle(&body.message, opts).await?;
  Ok(Json(reply))
}
