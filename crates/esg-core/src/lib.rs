//! Core types and the analysis pipeline for ESG scoring.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::AnalysisStore`]; search, scrape and language
//! model adapters implement the collaborator traits in [`research`] and
//! [`llm`]. The [`pipeline::Pipeline`] ties them together.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod company;
pub mod error;
pub mod intent;
pub mod llm;
pub mod metric;
pub mod pipeline;
pub mod prompts;
pub mod reply;
pub mod report;
pub mod research;
pub mod schema;
pub mod score;
pub mod scoring;
pub mod store;
pub mod validate;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
