//! `esg`: conversational ESG analysis from the terminal or over HTTP.
//!
//! # Usage
//!
//! ```
//! esg chat analyze Tesla
//! esg chat --sources 3 analyze Nike
//! esg repl
//! esg serve
//! esg companies --history Tesla
//! esg report Tesla Apple --output comparison.md
//! esg --config ~/.config/esg/esg.toml chat compare Tesla and Apple
//! ```

mod render;
mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use esg_core::{
  pipeline::{Pipeline, TurnOptions},
  reply::Reply,
  report::{self, Report, ReportOutcome},
  research::ResearchCoordinator,
  store::AnalysisStore as _,
};
use esg_providers::{FirecrawlScraper, OpenAiChat, PerplexitySearch};
use esg_store_sqlite::SqliteStore;
use settings::Settings;
use tokio::{
  io::{AsyncBufReadExt as _, BufReader},
  net::TcpListener,
};
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

type EsgPipeline = Pipeline<SqliteStore, PerplexitySearch, FirecrawlScraper, OpenAiChat>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "esg", version, about = "Conversational ESG analysis of companies")]
struct Cli {
  /// Path to a TOML config file (default: ./esg.toml if present).
  #[arg(short, long, value_name = "FILE", env = "ESG_CONFIG")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Handle one message and print the reply.
  Chat {
    /// The message, e.g. `compare Tesla and Apple`.
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,

    /// Print the reply as JSON.
    #[arg(long)]
    json: bool,

    /// Sources to research per company for this message.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    sources: Option<u16>,
  },
  /// Handle one message per line of standard input.
  Repl,
  /// Serve the JSON API under `/api`.
  Serve,
  /// List stored companies without contacting any provider.
  Companies {
    /// Show the score history of one company instead.
    #[arg(long, value_name = "NAME")]
    history: Option<String>,
  },
  /// Export a Markdown report of stored analyses; two or more names give a
  /// comparison. Nothing is researched.
  Report {
    /// Company names; quote names with spaces.
    #[arg(required = true, num_args = 1..)]
    companies: Vec<String>,

    /// Where to write the report (default: its own file name in the current
    /// directory).
    #[arg(short, long, value_name = "FILE", conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Print the report instead of writing a file.
    #[arg(long)]
    stdout: bool,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(cli.config.as_deref())?;
  let store = open_store(&settings).await?;

  match cli.command {
    Command::Chat { message, json, sources } => {
      let pipeline = build_pipeline(&settings, store)?;
      let opts = TurnOptions { source_limit: sources.map(usize::from) };
      let reply = pipeline.handle_with(&message.join(" "), opts).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
      } else {
        print!("{}", render::reply(&reply));
        if let Reply::Report(report) = &reply {
          save_report(report, None).await?;
        }
      }
    }
    Command::Repl => repl(build_pipeline(&settings, store)?).await?,
    Command::Serve => serve(&settings, build_pipeline(&settings, store)?).await?,
    Command::Companies { history: Some(name) } => {
      let records = store.score_history(&name).await?;
      print!("{}", render::history(&name, &records));
    }
    Command::Companies { history: None } => {
      let companies = store.list_companies().await?;
      print!("{}", render::listing(&companies));
    }
    Command::Report { companies, output, stdout } => {
      let report = match report::assemble(&store, &companies, Utc::now().date_naive()).await? {
        ReportOutcome::Ready(report) => report,
        ReportOutcome::Missing(missing) => {
          bail!("no analysis stored for {}; analyze them first", missing.join(", "))
        }
      };
      if stdout {
        print!("{}", report.markdown);
      } else {
        save_report(&report, output.as_deref()).await?;
      }
    }
  }

  Ok(())
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

async fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let path = settings.database_path();
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))
}

fn build_pipeline(settings: &Settings, store: SqliteStore) -> anyhow::Result<EsgPipeline> {
  let providers = &settings.providers;
  let client = esg_providers::http_client(providers.timeout())
    .context("failed to build HTTP client")?;

  let search = PerplexitySearch::new(client.clone(), providers)?;
  let scraper = FirecrawlScraper::new(client.clone(), providers)?;
  let model = OpenAiChat::new(client, providers)?;
  info!(model = model.model(), router = ?settings.router, "pipeline ready");

  let research = ResearchCoordinator::new(search, scraper, settings.research_config());
  Ok(Pipeline::new(store, research, model, settings.pipeline_config()))
}

/// Write `report` to `path`, or to its own file name in the current
/// directory.
async fn save_report(report: &Report, path: Option<&Path>) -> anyhow::Result<()> {
  let path = path.map_or_else(|| PathBuf::from(&report.file_name), Path::to_path_buf);
  tokio::fs::write(&path, &report.markdown)
    .await
    .with_context(|| format!("failed to write {}", path.display()))?;
  eprintln!("Saved report to {}", path.display());
  Ok(())
}

// ─── Modes ───────────────────────────────────────────────────────────────────

async fn repl(pipeline: EsgPipeline) -> anyhow::Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  eprintln!("Type a message, or `exit` to quit.");

  while let Some(line) = lines.next_line().await.context("reading stdin")? {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    if matches!(line, "exit" | "quit") {
      break;
    }
    // A failed turn is reported and the session continues.
    match pipeline.handle(line).await {
      Ok(reply) => {
        print!("{}", render::reply(&reply));
        if let Reply::Report(report) = &reply
          && let Err(e) = save_report(report, None).await
        {
          eprintln!("error: {e:#}");
        }
      }
      Err(e) => eprintln!("error: {e}"),
    }
  }
  Ok(())
}

async fn serve(settings: &Settings, pipeline: EsgPipeline) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", esg_api::api_router(Arc::new(pipeline)))
    .layer(TraceLayer::new_for_http());

  let address = settings.address();
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}
