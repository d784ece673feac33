use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{service} returned {status}: {body}")]
  Status { service: &'static str, status: u16, body: String },

  #[error("no API key configured for {0}")]
  MissingKey(&'static str),

  #[error("unexpected {service} response: {reason}")]
  Malformed { service: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
