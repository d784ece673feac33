//! Error types for `esg-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("company name must not be empty")]
  EmptyCompanyName,

  #[error("category weights sum to {total} basis points, expected 10000")]
  UnbalancedWeights { total: u32 },

  #[error("unknown category: {0:?}")]
  UnknownCategory(String),

  #[error("unknown metric origin: {0:?}")]
  UnknownOrigin(String),

  #[error("unknown score level: {0:?}")]
  UnknownLevel(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
