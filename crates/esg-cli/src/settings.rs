//! Layered configuration: defaults, then `esg.toml`, then `ESG_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use esg_core::{
  cache::DEFAULT_WINDOW_DAYS, intent::RouterMode, pipeline::PipelineConfig,
  research::ResearchConfig,
};
use esg_providers::ProviderSettings;
use serde::Deserialize;

fn default_database_path() -> PathBuf { PathBuf::from("~/.local/share/esg/esg.db") }
fn default_freshness_days() -> u32 { DEFAULT_WINDOW_DAYS }
fn default_source_limit() -> usize { ResearchConfig::default().source_limit }
fn default_search_limit() -> usize { ResearchConfig::default().search_limit }
fn default_scrape_concurrency() -> usize { ResearchConfig::default().concurrency }
fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_database_path")]
  pub database_path:      PathBuf,
  #[serde(default = "default_freshness_days")]
  pub freshness_days:     u32,
  #[serde(default = "default_source_limit")]
  pub source_limit:       usize,
  #[serde(default = "default_search_limit")]
  pub search_limit:       usize,
  #[serde(default = "default_scrape_concurrency")]
  pub scrape_concurrency: usize,
  #[serde(default)]
  pub router:             RouterMode,
  #[serde(default)]
  pub server:             ServerSettings,
  #[serde(default)]
  pub providers:          ProviderSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServerSettings {
  fn default() -> Self { Self { host: default_host(), port: default_port() } }
}

impl Settings {
  /// Load settings from `path` (required when given) or `./esg.toml` (if
  /// present), overridden by `ESG_*` environment variables. Nested keys use a
  /// double underscore: `ESG_SERVER__PORT=9000`.
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let file = match path {
      Some(path) => config::File::from(path).required(true),
      None => config::File::with_name("esg").required(false),
    };

    config::Config::builder()
      .add_source(file)
      .add_source(
        config::Environment::with_prefix("ESG")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// The database path with a leading `~` expanded.
  pub fn database_path(&self) -> PathBuf { expand_tilde(&self.database_path) }

  pub fn research_config(&self) -> ResearchConfig {
    ResearchConfig {
      search_limit: self.search_limit,
      source_limit: self.source_limit,
      concurrency: self.scrape_concurrency.max(1),
      ..ResearchConfig::default()
    }
  }

  pub fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig { freshness_days: self.freshness_days, router: self.router }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.server.host, self.server.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
