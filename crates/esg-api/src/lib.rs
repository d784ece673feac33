//! JSON REST API for the ESG pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`ChatBackend`], normally an
//! [`esg_core::pipeline::Pipeline`]. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", esg_api::api_router(Arc::new(pipeline)))
//! ```

pub mod chat;
pub mod companies;
pub mod error;

use std::{future::Future, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use esg_core::{
  llm::{Answerer, Extractor},
  pipeline::{Pipeline, PipelineError, TurnOptions},
  reply::Reply,
  research::{Scraper, Search},
  store::AnalysisStore,
};

pub use error::ApiError;

/// What the API needs from the pipeline: a chat turn and read access to the
/// store it writes to.
pub trait ChatBackend: Send + Sync + 'static {
  type Store: AnalysisStore;

  fn store(&self) -> &Self::Store;

  fn handle<'a>(
    &'a self,
    text: &'a str,
    opts: TurnOptions,
  ) -> impl Future<Output = Result<Reply, PipelineError>> + Send + 'a;
}

impl<St, Se, Sc, L> ChatBackend for Pipeline<St, Se, Sc, L>
where
  St: AnalysisStore + 'static,
  Se: Search + 'static,
  Sc: Scraper + 'static,
  L: Extractor + Answerer + 'static,
{
  type Store = St;

  fn store(&self) -> &St { Pipeline::store(self) }

  async fn handle<'a>(&'a self, text: &'a str, opts: TurnOptions) -> Result<Reply, PipelineError> {
    Pipeline::handle_with(self, text, opts).await
  }
}

/// Build a fully-materialised API router for `backend`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<B: ChatBackend>(backend: Arc<B>) -> Router<()> {
  Router::new()
    .route("/chat", post(chat::handler::<B>))
    .route(
      "/companies",
      get(companies::list::<B>).delete(companies::clear::<B>),
    )
    .route(
      "/companies/{name}",
      get(companies::get_one::<B>).delete(companies::delete_one::<B>),
    )
    .route("/companies/{name}/history", get(companies::history::<B>))
    .route("/companies/{name}/report", get(companies::report::<B>))
    .with_state(backend)
}
