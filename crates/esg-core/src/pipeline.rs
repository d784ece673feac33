//! The chat pipeline: classify a message, then analyze, compare, answer,
//! export or manage stored companies.
//!
//! One message is handled sequentially. Network work (research and model
//! calls) always finishes before the single store write of an analysis, so a
//! failed collaborator never leaves partial state behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  cache::{CacheGate, DEFAULT_WINDOW_DAYS, Freshness},
  company::normalize_name,
  intent::{Classification, Intent, RouterMode, classify_rules, classify_with_model},
  llm::{Answerer, Extractor},
  prompts,
  reply::{AnalysisFailure, AnalysisOutcome, CompanyOutcome, ComparisonGap, Reply},
  report::{self, ReportOutcome, rank, score_report},
  research::{ResearchCoordinator, ResearchError, Scraper, Search},
  scoring,
  store::{Analysis, AnalysisStore, NewAnalysis},
  validate::{round2, validate},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const CLARIFICATION: &str = "I can analyze companies (\"analyze Tesla\"), compare them \
                             (\"compare Tesla and Apple\"), show scores, answer questions \
                             about analyzed companies, export reports (\"download the report for \
                             Tesla\"), list, delete or clear them.";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Research(#[from] ResearchError),

  #[error("metric extraction failed: {0}")]
  Extraction(#[source] BoxError),

  #[error("answer generation failed: {0}")]
  Answer(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error(transparent)]
  Core(#[from] crate::Error),
}

impl PipelineError {
  /// Whether an external collaborator (search, scrape or model) caused this.
  pub fn is_collaborator(&self) -> bool {
    matches!(self, Self::Research(_) | Self::Extraction(_) | Self::Answer(_))
  }
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> PipelineError {
  PipelineError::Store(Box::new(e))
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Stored analyses younger than this many days are reused.
  pub freshness_days: u32,
  pub router:         RouterMode,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self { freshness_days: DEFAULT_WINDOW_DAYS, router: RouterMode::Rules }
  }
}

/// Overrides for a single message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOptions {
  /// Sources to collect for analyses this message runs, instead of the
  /// research coordinator's configured limit.
  pub source_limit: Option<usize>,
}

impl TurnOptions {
  pub fn with_source_limit(source_limit: usize) -> Self {
    Self { source_limit: Some(source_limit) }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<St, Se, Sc, L> {
  store:    St,
  research: ResearchCoordinator<Se, Sc>,
  model:    L,
  config:   PipelineConfig,
}

impl<St, Se, Sc, L> Pipeline<St, Se, Sc, L>
where
  St: AnalysisStore,
  Se: Search,
  Sc: Scraper,
  L: Extractor + Answerer,
{
  pub fn new(
    store: St,
    research: ResearchCoordinator<Se, Sc>,
    model: L,
    config: PipelineConfig,
  ) -> Self {
    Self { store, research, model, config }
  }

  pub fn store(&self) -> &St { &self.store }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  /// Handle one chat message.
  pub async fn handle(&self, text: &str) -> Result<Reply, PipelineError> {
    self.handle_with(text, TurnOptions::default()).await
  }

  /// Handle one chat message with per-message overrides.
  pub async fn handle_with(&self, text: &str, opts: TurnOptions) -> Result<Reply, PipelineError> {
    let classification = self.classify(text).await?;
    info!(
      intent = %classification.intent,
      companies = ?classification.companies,
      source_limit = ?opts.source_limit,
      "handling message"
    );
    self.dispatch(text, classification, opts).await
  }

  pub async fn classify(&self, text: &str) -> Result<Classification, PipelineError> {
    let known: Vec<String> = self
      .store
      .list_companies()
      .await
      .map_err(store_error)?
      .into_iter()
      .map(|summary| summary.company.name)
      .collect();

    Ok(match self.config.router {
      RouterMode::Rules => classify_rules(text, &known),
      RouterMode::Model => classify_with_model(&self.model, text, &known).await,
    })
  }

  /// Run the handler for an already classified message.
  pub async fn dispatch(
    &self,
    text: &str,
    classification: Classification,
    opts: TurnOptions,
  ) -> Result<Reply, PipelineError> {
    if classification.lacks_companies() {
      return Ok(Reply::Invalid { message: missing_companies_message(classification.intent) });
    }

    let Classification { intent, companies, question } = classification;
    match intent {
      Intent::Analyze => self.analyze_all(&companies, opts).await,
      Intent::Compare => self.compare(&companies, opts).await,
      Intent::ShowScore => self.show_scores(&companies, opts).await,
      Intent::RagQuestion => {
        let question = question.unwrap_or_else(|| text.trim().to_owned());
        self.answer(&companies[0], &question, opts).await
      }
      Intent::Report => self.report(&companies).await,
      Intent::Delete => self.delete(&companies).await,
      Intent::List => self.list().await,
      Intent::Clear => self.clear().await,
      Intent::Unknown => Ok(Reply::Clarification { message: CLARIFICATION.to_owned() }),
    }
  }

  // ── Analysis ──────────────────────────────────────────────────────────

  pub async fn analyze_all(
    &self,
    companies: &[String],
    opts: TurnOptions,
  ) -> Result<Reply, PipelineError> {
    let mut outcomes = Vec::with_capacity(companies.len());
    for company in companies {
      outcomes.push(self.analyze(company, opts).await?);
    }
    Ok(Reply::Analyzed { outcomes })
  }

  /// Analyze one company, reusing a fresh stored analysis when there is one.
  ///
  /// Research and extraction failures become a [`CompanyOutcome::Failed`];
  /// store failures are returned as errors.
  pub async fn analyze(
    &self,
    company: &str,
    opts: TurnOptions,
  ) -> Result<CompanyOutcome, PipelineError> {
    let company = normalize_name(company)?;

    let freshness = CacheGate::new(&self.store)
      .check(&company, self.config.freshness_days)
      .await
      .map_err(store_error)?;
    match freshness {
      Freshness::Hit(analysis) => {
        info!(company = %company, "serving stored analysis");
        return Ok(CompanyOutcome::Analyzed(cached_outcome(&analysis)));
      }
      Freshness::Miss(reason) => debug!(company = %company, ?reason, "analysis needed"),
    }

    match self.run_analysis(&company, opts).await {
      Ok(outcome) => Ok(CompanyOutcome::Analyzed(outcome)),
      Err(e) if e.is_collaborator() => {
        warn!(company = %company, error = %e, "analysis failed");
        Ok(CompanyOutcome::Failed(AnalysisFailure { company, reason: e.to_string() }))
      }
      Err(e) => Err(e),
    }
  }

  async fn run_analysis(
    &self,
    company: &str,
    opts: TurnOptions,
  ) -> Result<AnalysisOutcome, PipelineError> {
    let research = self
      .research
      .research_with_limit(company, opts.source_limit)
      .await?;

    let prompt = prompts::extraction_prompt(company, &research.sources);
    let raw = self
      .model
      .extract_json(&prompt)
      .await
      .map_err(|e| PipelineError::Extraction(Box::new(e)))?;
    debug!(company, bytes = raw.len(), "extraction payload received");

    let metrics = validate(&raw);
    let card = scoring::score(&metrics);
    let defaulted_metrics = metrics.defaulted_count();
    let source_count = research.sources.len();

    let saved = self
      .store
      .save_analysis(NewAnalysis {
        company_name: company.to_owned(),
        sources: research.sources,
        metrics,
        score: card.clone(),
        analyzed_at: Utc::now(),
      })
      .await
      .map_err(store_error)?;

    info!(
      company = %saved.name,
      final_score = card.final_score,
      level = %card.level,
      "analysis saved"
    );
    Ok(AnalysisOutcome {
      company: saved.name,
      final_score: card.final_score,
      level: card.level,
      environmental: card.environmental,
      social: card.social,
      governance: card.governance,
      cached: false,
      source_count,
      failed_urls: research.failed_urls,
      defaulted_metrics,
    })
  }

  /// The scored analysis of every company, analyzing those that have none
  /// stored. A stale stored analysis is used as it is.
  pub async fn ensure_analyzed(
    &self,
    companies: &[String],
    opts: TurnOptions,
  ) -> Result<(Vec<Analysis>, Vec<AnalysisFailure>), PipelineError> {
    let mut analyses = Vec::new();
    let mut failures = Vec::new();

    for company in companies {
      if let Some(analysis) = self.scored(company).await? {
        analyses.push(analysis);
        continue;
      }

      match self.analyze(company, opts).await? {
        CompanyOutcome::Failed(failure) => failures.push(failure),
        CompanyOutcome::Analyzed(outcome) => match self.scored(&outcome.company).await? {
          Some(analysis) => analyses.push(analysis),
          None => failures.push(AnalysisFailure {
            company: outcome.company,
            reason:  "analysis was not stored".to_owned(),
          }),
        },
      }
    }
    Ok((analyses, failures))
  }

  async fn scored(&self, company: &str) -> Result<Option<Analysis>, PipelineError> {
    Ok(
      self
        .store
        .get_current(company)
        .await
        .map_err(store_error)?
        .and_then(|stored| stored.into_scored()),
    )
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn compare(
    &self,
    companies: &[String],
    opts: TurnOptions,
  ) -> Result<Reply, PipelineError> {
    let (analyses, failures) = self.ensure_analyzed(companies, opts).await?;
    if analyses.len() < 2 {
      let reasons: Vec<String> = failures
        .iter()
        .map(|f| format!("{}: {}", f.company, f.reason))
        .collect();
      return Ok(Reply::Invalid {
        message: format!(
          "A comparison needs at least two analyzed companies ({})",
          reasons.join("; ")
        ),
      });
    }

    let ranking = rank(&analyses);
    let lead = round2(ranking[0].final_score - ranking[1].final_score);
    let winner = ranking[0].company.clone();
    info!(winner = %winner, lead, "comparison complete");

    Ok(Reply::Comparison {
      ranking,
      winner,
      lead,
      gap: ComparisonGap::from_lead(lead),
      failures,
    })
  }

  pub async fn show_scores(
    &self,
    companies: &[String],
    opts: TurnOptions,
  ) -> Result<Reply, PipelineError> {
    let (analyses, failures) = self.ensure_analyzed(companies, opts).await?;
    let reports = analyses.iter().map(score_report).collect();
    Ok(Reply::Scores { reports, failures })
  }

  /// Answer `question` about `company` from its newest stored sources.
  pub async fn answer(
    &self,
    company: &str,
    question: &str,
    opts: TurnOptions,
  ) -> Result<Reply, PipelineError> {
    let (mut analyses, failures) = self.ensure_analyzed(&[company.to_owned()], opts).await?;
    let Some(analysis) = analyses.pop() else {
      let reason = failures
        .first()
        .map_or_else(|| "no analysis available".to_owned(), |f| f.reason.clone());
      return Ok(Reply::Invalid {
        message: format!("Cannot answer questions about {company}: {reason}"),
      });
    };

    if analysis.sources.is_empty() {
      return Ok(Reply::Invalid {
        message: format!("No stored sources for {} to answer from", analysis.company.name),
      });
    }

    let prompt = prompts::rag_prompt(&analysis.company.name, question, &analysis.sources);
    let answer = self
      .model
      .answer(&prompt)
      .await
      .map_err(|e| PipelineError::Answer(Box::new(e)))?;

    Ok(Reply::Answer {
      company: analysis.company.name,
      question: question.to_owned(),
      answer,
      final_score: analysis.score.card.final_score,
      sources: analysis
        .sources
        .iter()
        .take(prompts::RAG_SOURCES)
        .map(|s| s.url.clone())
        .collect(),
    })
  }

  /// A Markdown report of already analyzed companies. Nothing is researched;
  /// unknown names make the request invalid.
  pub async fn report(&self, companies: &[String]) -> Result<Reply, PipelineError> {
    let today = Utc::now().date_naive();
    match report::assemble(&self.store, companies, today)
      .await
      .map_err(store_error)?
    {
      ReportOutcome::Ready(report) => {
        info!(file = %report.file_name, "report rendered");
        Ok(Reply::Report(report))
      }
      ReportOutcome::Missing(missing) => Ok(Reply::Invalid {
        message: format!(
          "I haven't analyzed the following companies yet: {}. Please analyze them first",
          missing.join(", ")
        ),
      }),
    }
  }

  pub async fn list(&self) -> Result<Reply, PipelineError> {
    let companies = self.store.list_companies().await.map_err(store_error)?;
    Ok(Reply::Listing { companies })
  }

  // ── Writes ────────────────────────────────────────────────────────────

  pub async fn delete(&self, companies: &[String]) -> Result<Reply, PipelineError> {
    let mut deleted = Vec::new();
    let mut not_found = Vec::new();

    for name in companies {
      let stored = self.store.get_company(name).await.map_err(store_error)?;
      let removed = match &stored {
        Some(company) => self.store.delete_company(&company.name).await.map_err(store_error)?,
        None => false,
      };
      match stored {
        Some(company) if removed => deleted.push(company.name),
        _ => not_found.push(name.clone()),
      }
    }

    info!(deleted = deleted.len(), not_found = not_found.len(), "delete handled");
    Ok(Reply::Deleted { deleted, not_found })
  }

  pub async fn clear(&self) -> Result<Reply, PipelineError> {
    let removed = self.store.clear_all().await.map_err(store_error)?;
    info!(removed, "store cleared");
    Ok(Reply::Cleared { removed })
  }
}

fn missing_companies_message(intent: Intent) -> String {
  match intent {
    Intent::Compare => {
      "Name at least two companies to compare, e.g. \"compare Tesla and Apple\"".to_owned()
    }
    Intent::RagQuestion => "Which company is the question about?".to_owned(),
    other => format!("Name a company for {}", other.as_ref().replace('_', " ")),
  }
}

fn cached_outcome(analysis: &Analysis) -> AnalysisOutcome {
  let card = &analysis.score.card;
  AnalysisOutcome {
    company:           analysis.company.name.clone(),
    final_score:       card.final_score,
    level:             card.level,
    environmental:     card.environmental,
    social:            card.social,
    governance:        card.governance,
    cached:            true,
    source_count:      analysis.sources.len(),
    failed_urls:       Vec::new(),
    defaulted_metrics: analysis.metrics.iter().filter(|m| m.is_defaulted()).count(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    research::ResearchConfig,
    score::ScoreLevel,
    scoring::score,
    store::NewSource,
    testing::{
      FakeError, FakeModel, FakeScraper, FakeSearch, MemoryStore, full_payload, graded_payload,
      sample_analysis,
    },
  };

  type TestPipeline = Pipeline<MemoryStore, FakeSearch, FakeScraper, FakeModel>;

  fn web() -> (FakeSearch, FakeScraper) {
    let search = FakeSearch::returning(["https://a.test", "https://b.test"]);
    let scraper = FakeScraper::default()
      .page("https://a.test", "Sustainability report text")
      .page("https://b.test", "Emissions news text");
    (search, scraper)
  }

  fn pipeline_with(
    store: MemoryStore,
    search: FakeSearch,
    scraper: FakeScraper,
    model: FakeModel,
  ) -> TestPipeline {
    let research = ResearchCoordinator::new(search, scraper, ResearchConfig::default());
    Pipeline::new(store, research, model, PipelineConfig::default())
  }

  fn pipeline(store: MemoryStore) -> TestPipeline {
    let (search, scraper) = web();
    pipeline_with(store, search, scraper, FakeModel::default())
  }

  /// An analysis of `name` whose metrics all score `value`.
  fn analysis_scoring(name: &str, value: f64) -> NewAnalysis {
    analysis_from(name, &full_payload(value, 1.0))
  }

  fn analysis_from(name: &str, payload: &str) -> NewAnalysis {
    let metrics = validate(payload);
    NewAnalysis {
      company_name: name.to_owned(),
      sources: vec![NewSource {
        url:        format!("https://{}.test", name.to_lowercase()),
        text:       format!("{name} report"),
        scraped_at: Utc::now(),
      }],
      score: score(&metrics),
      metrics,
      analyzed_at: Utc::now(),
    }
  }

  fn single_outcome(reply: Reply) -> CompanyOutcome {
    let Reply::Analyzed { mut outcomes } = reply else {
      panic!("expected an analysis reply, got {reply:?}");
    };
    assert_eq!(outcomes.len(), 1);
    outcomes.remove(0)
  }

  #[tokio::test]
  async fn analysis_runs_once_then_serves_the_stored_result() {
    let pipeline = pipeline(MemoryStore::default());

    let CompanyOutcome::Analyzed(first) = single_outcome(pipeline.handle("Analyze Tesla").await.unwrap())
    else {
      panic!("analysis failed");
    };
    assert!(!first.cached);
    assert_eq!(first.final_score, 70.0);
    assert_eq!(first.level, ScoreLevel::Good);
    assert_eq!(first.source_count, 2);
    assert_eq!(first.defaulted_metrics, 0);

    let CompanyOutcome::Analyzed(second) = single_outcome(pipeline.handle("tesla").await.unwrap())
    else {
      panic!("analysis failed");
    };
    assert!(second.cached);
    assert_eq!(second.company, "Tesla");
    assert_eq!(pipeline.store().saves(), 1);
    assert_eq!(pipeline.model.extract_calls(), 1);
  }

  #[tokio::test]
  async fn source_limit_can_be_set_per_message() {
    let pipeline = pipeline(MemoryStore::default());

    let reply = pipeline
      .handle_with("Analyze Tesla", TurnOptions::with_source_limit(1))
      .await
      .unwrap();
    let CompanyOutcome::Analyzed(outcome) = single_outcome(reply) else {
      panic!("analysis failed");
    };
    assert_eq!(outcome.source_count, 1);
    assert_eq!(pipeline.store().get_sources("Tesla").await.unwrap().len(), 1);

    let CompanyOutcome::Analyzed(outcome) = single_outcome(pipeline.handle("Nike").await.unwrap())
    else {
      panic!("analysis failed");
    };
    assert_eq!(outcome.source_count, 2);
  }

  #[tokio::test]
  async fn stale_analysis_is_replaced() {
    let store = MemoryStore::default();
    store.save(sample_analysis("Tesla", Utc::now() - Duration::days(10))).await;
    let pipeline = pipeline(store);

    let CompanyOutcome::Analyzed(outcome) = single_outcome(pipeline.handle("Tesla").await.unwrap())
    else {
      panic!("analysis failed");
    };
    assert!(!outcome.cached);
    assert_eq!(pipeline.store().score_history("Tesla").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn research_failure_is_reported_without_writing() {
    let pipeline = pipeline_with(
      MemoryStore::default(),
      FakeSearch::failing(FakeError::new("quota exceeded")),
      FakeScraper::default(),
      FakeModel::default(),
    );

    let outcome = single_outcome(pipeline.handle("Analyze Tesla").await.unwrap());
    assert!(matches!(outcome, CompanyOutcome::Failed(ref f) if f.company == "Tesla"));
    assert_eq!(pipeline.store().saves(), 0);
    assert_eq!(pipeline.model.extract_calls(), 0);
  }

  #[tokio::test]
  async fn extraction_failure_is_reported_without_writing() {
    let (search, scraper) = web();
    let pipeline = pipeline_with(MemoryStore::default(), search, scraper, FakeModel::failing());

    let outcome = single_outcome(pipeline.handle("Analyze Tesla").await.unwrap());
    let CompanyOutcome::Failed(failure) = outcome else {
      panic!("expected a failure");
    };
    assert!(failure.reason.contains("extraction"));
    assert!(pipeline.store().get_company("Tesla").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn malformed_extraction_is_scored_as_defaults() {
    let (search, scraper) = web();
    let model = FakeModel::default().with_extraction("Sorry, I cannot help with that.");
    let pipeline = pipeline_with(MemoryStore::default(), search, scraper, model);

    let CompanyOutcome::Analyzed(outcome) = single_outcome(pipeline.handle("Tesla").await.unwrap())
    else {
      panic!("analysis failed");
    };
    assert_eq!(outcome.defaulted_metrics, 15);
    assert_eq!(outcome.final_score, 0.0);
    assert_eq!(outcome.level, ScoreLevel::VeryPoor);
  }

  #[tokio::test]
  async fn store_failure_is_an_error() {
    let pipeline = pipeline(MemoryStore::failing_writes());
    let err = pipeline.handle("Analyze Tesla").await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert!(!err.is_collaborator());
  }

  #[tokio::test]
  async fn comparison_ranks_stored_companies() {
    let store = MemoryStore::default();
    store.save(analysis_scoring("Tesla", 80.0)).await;
    store.save(analysis_scoring("Apple", 62.0)).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("Compare Apple and Tesla").await.unwrap();
    let Reply::Comparison { ranking, winner, lead, gap, failures } = reply else {
      panic!("expected a comparison, got {reply:?}");
    };
    assert_eq!(winner, "Tesla");
    assert_eq!(ranking[1].company, "Apple");
    assert_eq!(lead, 18.0);
    assert_eq!(gap, ComparisonGap::Significant);
    assert!(failures.is_empty());
    assert_eq!(pipeline.model.extract_calls(), 0);
  }

  #[tokio::test]
  async fn comparison_analyzes_unknown_companies_first() {
    let store = MemoryStore::default();
    store.save(analysis_scoring("Tesla", 64.0)).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("Tesla vs Nike").await.unwrap();
    let Reply::Comparison { winner, lead, gap, .. } = reply else {
      panic!("expected a comparison, got {reply:?}");
    };
    assert_eq!(winner, "Nike");
    assert_eq!(lead, 6.0);
    assert_eq!(gap, ComparisonGap::Moderate);
    assert_eq!(pipeline.store().saves(), 2);
  }

  #[tokio::test]
  async fn missing_companies_are_rejected_without_side_effects() {
    let pipeline = pipeline(MemoryStore::default());

    let reply = pipeline.handle("compare Tesla").await.unwrap();
    assert!(matches!(reply, Reply::Invalid { .. }));
    assert_eq!(pipeline.store().saves(), 0);

    let reply = pipeline.handle("what is the weather like?").await.unwrap();
    assert!(matches!(reply, Reply::Invalid { .. }));
  }

  #[tokio::test]
  async fn chatter_gets_a_clarification() {
    let pipeline = pipeline(MemoryStore::default());
    let reply = pipeline.handle("hello").await.unwrap();
    assert!(matches!(reply, Reply::Clarification { .. }));
  }

  #[tokio::test]
  async fn score_reports_list_strengths_and_weaknesses() {
    let store = MemoryStore::default();
    store.save(analysis_from("Tesla", &graded_payload())).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("show the score for tesla").await.unwrap();
    let Reply::Scores { reports, failures } = reply else {
      panic!("expected scores, got {reply:?}");
    };
    assert!(failures.is_empty());
    let report = &reports[0];
    assert_eq!(report.company, "Tesla");
    assert_eq!(report.card.final_score, 41.25);

    let strengths: Vec<_> = report.strengths.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(strengths, [
      "Stakeholder Engagement",
      "Risk Management",
      "Transparency and Reporting"
    ]);
    let weaknesses: Vec<_> = report.weaknesses.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(weaknesses, [
      "Carbon Emissions Reduction",
      "Renewable Energy Usage",
      "Waste Management"
    ]);
    assert_eq!(report.weaknesses[0].value, 10.0);
    assert!(report.recommendations[0].starts_with("Critical"));
  }

  #[tokio::test]
  async fn tied_metrics_are_not_both_strength_and_weakness() {
    let store = MemoryStore::default();
    store.save(analysis_scoring("Tesla", 45.0)).await;
    let pipeline = pipeline(store);

    let Reply::Scores { reports, .. } = pipeline.handle("Tesla score").await.unwrap() else {
      panic!("expected scores");
    };
    let report = &reports[0];
    assert_eq!(report.strengths.len(), 3);
    assert_eq!(report.weaknesses.len(), 3);
    assert!(
      report
        .weaknesses
        .iter()
        .all(|w| report.strengths.iter().all(|s| s.name != w.name))
    );
  }

  #[tokio::test]
  async fn reports_export_stored_analyses_only() {
    let store = MemoryStore::default();
    store.save(analysis_scoring("Tesla", 80.0)).await;
    store.save(analysis_scoring("Apple", 62.0)).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("Download the report for Tesla").await.unwrap();
    let Reply::Report(report) = reply else {
      panic!("expected a report, got {reply:?}");
    };
    assert_eq!(report.companies, ["Tesla"]);
    assert!(report.file_name.starts_with("Tesla_Sustainability_Report_"));
    assert!(report.markdown.contains("## Detailed Metrics"));

    let Reply::Report(report) = pipeline.handle("export apple and tesla").await.unwrap() else {
      panic!("expected a comparison report");
    };
    assert!(report.file_name.starts_with("Comparison_Apple_vs_Tesla_"));

    let reply = pipeline.handle("download a report for Tesla and Nike").await.unwrap();
    let Reply::Invalid { message } = reply else {
      panic!("expected an invalid reply, got {reply:?}");
    };
    assert!(message.contains("Nike"));
    assert!(!message.contains("Tesla"));
    assert_eq!(pipeline.store().saves(), 2);
    assert_eq!(pipeline.model.extract_calls(), 0);
  }

  #[tokio::test]
  async fn questions_are_answered_from_stored_sources() {
    let store = MemoryStore::default();
    store.save(sample_analysis("Tesla", Utc::now())).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("How does Tesla handle emissions?").await.unwrap();
    let Reply::Answer { company, answer, final_score, sources, .. } = reply else {
      panic!("expected an answer, got {reply:?}");
    };
    assert_eq!(company, "Tesla");
    assert!(!answer.is_empty());
    assert_eq!(final_score, 70.0);
    assert_eq!(sources.len(), 2);

    let prompt = pipeline.model.last_prompt().unwrap();
    assert!(prompt.user.contains("How does Tesla handle emissions?"));
    assert!(prompt.user.contains("cut emissions last year"));
    assert_eq!(pipeline.model.answer_calls(), 1);
  }

  #[tokio::test]
  async fn delete_reports_unknown_names() {
    let store = MemoryStore::default();
    store.save(sample_analysis("Tesla", Utc::now())).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("delete tesla and nike").await.unwrap();
    assert_eq!(
      reply,
      Reply::Deleted { deleted: vec!["Tesla".into()], not_found: vec!["nike".into()] }
    );
    assert!(pipeline.store().get_company("Tesla").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn deleting_one_company_keeps_the_others() {
    let store = MemoryStore::default();
    store.save(sample_analysis("Tesla", Utc::now())).await;
    store.save(sample_analysis("Apple", Utc::now())).await;
    let pipeline = pipeline(store);

    let reply = pipeline.handle("delete Tesla's data").await.unwrap();
    assert_eq!(reply, Reply::Deleted { deleted: vec!["Tesla".into()], not_found: Vec::new() });

    let reply = pipeline.handle("clear Nike").await.unwrap();
    assert_eq!(reply, Reply::Deleted { deleted: Vec::new(), not_found: vec!["Nike".into()] });

    assert!(pipeline.store().get_company("Tesla").await.unwrap().is_none());
    assert!(pipeline.store().get_current("Apple").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn list_and_clear() {
    let store = MemoryStore::default();
    store.save(sample_analysis("Tesla", Utc::now() - Duration::hours(1))).await;
    store.save(sample_analysis("Apple", Utc::now())).await;
    let pipeline = pipeline(store);

    let Reply::Listing { companies } = pipeline.handle("list companies").await.unwrap() else {
      panic!("expected a listing");
    };
    let names: Vec<_> = companies.iter().map(|c| c.company.name.as_str()).collect();
    assert_eq!(names, ["Apple", "Tesla"]);

    assert_eq!(pipeline.handle("clear everything").await.unwrap(), Reply::Cleared { removed: 2 });
    assert_eq!(
      pipeline.handle("list").await.unwrap(),
      Reply::Listing { companies: Vec::new() }
    );
  }

  #[tokio::test]
  async fn model_router_uses_the_model_classification() {
    let (search, scraper) = web();
    let model = FakeModel::default().with_intent(r#"{"intent": "list_companies", "companies": []}"#);
    let research = ResearchCoordinator::new(search, scraper, ResearchConfig::default());
    let config = PipelineConfig { router: RouterMode::Model, ..PipelineConfig::default() };
    let pipeline = Pipeline::new(MemoryStore::default(), research, model, config);

    let reply = pipeline.handle("what have we got so far").await.unwrap();
    assert!(matches!(reply, Reply::Listing { .. }));
  }
}
