//! Score reports and downloadable Markdown exports.
//!
//! [`score_report`] summarises one stored analysis for a chat reply.
//! [`assemble`] renders a Markdown document for one company, or a comparison
//! of several, from the store alone: companies without a scored analysis are
//! returned as missing and never researched.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::{
  metric::Metric,
  reply::{ComparisonGap, Highlight, RankedCompany, ScoreReport},
  schema::Category,
  scoring,
  store::{Analysis, AnalysisStore, StoredAnalysis},
  validate::round2,
};

/// Metrics listed as strengths or weaknesses.
pub const HIGHLIGHTS: usize = 3;

// ─── Score reports ───────────────────────────────────────────────────────────

/// The highest and lowest valued metrics. Ties keep schema order, and a
/// metric listed as a strength is never also a weakness.
pub fn highlights(metrics: &[Metric]) -> (Vec<Highlight>, Vec<Highlight>) {
  let mut ranked: Vec<Highlight> = metrics
    .iter()
    .map(|m| Highlight { name: m.name.clone(), value: m.value })
    .collect();
  ranked.sort_by(|a, b| b.value.total_cmp(&a.value));

  let strengths: Vec<Highlight> = ranked.iter().take(HIGHLIGHTS).cloned().collect();
  let weaknesses = ranked
    .iter()
    .rev()
    .filter(|h| !strengths.iter().any(|s| s.name == h.name))
    .take(HIGHLIGHTS)
    .cloned()
    .collect();
  (strengths, weaknesses)
}

pub fn score_report(analysis: &Analysis) -> ScoreReport {
  let (strengths, weaknesses) = highlights(&analysis.metrics);
  ScoreReport {
    company: analysis.company.name.clone(),
    card: analysis.score.card.clone(),
    computed_at: analysis.score.computed_at,
    strengths,
    weaknesses,
    recommendations: scoring::recommendations(&analysis.score.card),
  }
}

/// Analyses ordered by final score, highest first.
pub fn rank(analyses: &[Analysis]) -> Vec<RankedCompany> {
  let mut ranking: Vec<RankedCompany> = analyses
    .iter()
    .map(|a| RankedCompany {
      company:       a.company.name.clone(),
      final_score:   a.score.card.final_score,
      level:         a.score.card.level,
      environmental: a.score.card.environmental,
      social:        a.score.card.social,
      governance:    a.score.card.governance,
    })
    .collect();
  ranking.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
  ranking
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// A rendered report ready to be saved or downloaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
  /// Stored spellings, in the order requested.
  pub companies: Vec<String>,
  pub file_name: String,
  pub markdown:  String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
  Ready(Report),
  /// Requested names with no scored analysis in the store.
  Missing(Vec<String>),
}

/// Build a report for `companies` from their stored analyses, dated `date`.
///
/// One company gives a single-company report, several give a comparison.
/// Names repeated under different spellings are reported once.
pub async fn assemble<S: AnalysisStore>(
  store: &S,
  companies: &[String],
  date: NaiveDate,
) -> Result<ReportOutcome, S::Error> {
  let mut analyses: Vec<Analysis> = Vec::with_capacity(companies.len());
  let mut missing = Vec::new();

  for name in companies {
    match store.get_current(name).await?.and_then(StoredAnalysis::into_scored) {
      Some(analysis) => {
        if !analyses
          .iter()
          .any(|a| a.company.company_id == analysis.company.company_id)
        {
          analyses.push(analysis);
        }
      }
      None => missing.push(name.clone()),
    }
  }

  if !missing.is_empty() || analyses.is_empty() {
    debug!(?missing, "report requested for unanalyzed companies");
    return Ok(ReportOutcome::Missing(missing));
  }
  Ok(ReportOutcome::Ready(render(&analyses, date)))
}

/// Render stored analyses; one analysis gives a single-company report.
pub fn render(analyses: &[Analysis], date: NaiveDate) -> Report {
  let companies: Vec<String> = analyses.iter().map(|a| a.company.name.clone()).collect();
  let (file_name, markdown) = match analyses {
    [single] => (
      format!("{}_Sustainability_Report_{date}.md", file_part(&single.company.name)),
      single_report(single, date),
    ),
    _ => (
      format!(
        "Comparison_{}_{date}.md",
        companies.iter().map(|c| file_part(c)).collect::<Vec<_>>().join("_vs_")
      ),
      comparison_report(analyses, date),
    ),
  };
  Report { companies, file_name, markdown }
}

fn single_report(analysis: &Analysis, date: NaiveDate) -> String {
  let report = score_report(analysis);
  let card = &report.card;
  let mut md = String::new();

  let _ = writeln!(md, "# Sustainability Report: {}\n", report.company);
  let _ = writeln!(
    md,
    "Generated {date}. Analysis computed {}.\n",
    report.computed_at.format("%Y-%m-%d %H:%M UTC")
  );
  let _ = writeln!(
    md,
    "**Overall ESG score: {:.2}/100 ({})**\n",
    card.final_score, card.level
  );

  md.push_str("## Category Scores\n\n");
  md.push_str("| Category | Weight | Score | Confidence |\n");
  md.push_str("|---|---:|---:|---:|\n");
  for category in Category::ALL {
    let confidence = card.breakdown_for(category).map_or(0.0, |b| b.confidence);
    let _ = writeln!(
      md,
      "| {category} | {:.0}% | {:.2} | {confidence:.2} |",
      category.weight() * 100.0,
      card.category_score(category),
    );
  }

  md.push_str("\n## Detailed Metrics\n\n");
  md.push_str("| Category | Metric | Value | Confidence |\n");
  md.push_str("|---|---|---:|---:|\n");
  for metric in &analysis.metrics {
    let value = if metric.is_defaulted() {
      "no data".to_owned()
    } else {
      format!("{:.1}", metric.value)
    };
    let _ = writeln!(
      md,
      "| {} | {} | {value} | {:.2} |",
      metric.category,
      cell(&metric.name),
      metric.confidence
    );
  }

  md.push_str("\n## Strengths\n\n");
  highlight_list(&mut md, &report.strengths);
  md.push_str("\n## Areas for Improvement\n\n");
  highlight_list(&mut md, &report.weaknesses);

  md.push_str("\n## Recommendations\n\n");
  if report.recommendations.is_empty() {
    md.push_str("No urgent improvements identified.\n");
  }
  for line in &report.recommendations {
    let _ = writeln!(md, "- {line}");
  }

  if !analysis.sources.is_empty() {
    md.push_str("\n## Sources\n\n");
    for source in &analysis.sources {
      let _ = writeln!(md, "- {}", source.url);
    }
  }
  md
}

fn comparison_report(analyses: &[Analysis], date: NaiveDate) -> String {
  let ranking = rank(analyses);
  let names: Vec<&str> = analyses.iter().map(|a| a.company.name.as_str()).collect();
  let mut md = String::new();

  let _ = writeln!(md, "# Sustainability Comparison: {}\n", names.join(" vs "));
  let _ = writeln!(md, "Generated {date}.\n");

  md.push_str("## Overall Scores\n\n");
  md.push_str("| Rank | Company | Score | Level |\n");
  md.push_str("|---:|---|---:|---|\n");
  for (position, ranked) in ranking.iter().enumerate() {
    let _ = writeln!(
      md,
      "| {} | {} | {:.2} | {} |",
      position + 1,
      cell(&ranked.company),
      ranked.final_score,
      ranked.level
    );
  }

  md.push_str("\n## Category Scores\n\n");
  let _ = writeln!(
    md,
    "| Category | {} |",
    ranking.iter().map(|r| cell(&r.company)).collect::<Vec<_>>().join(" | ")
  );
  let _ = writeln!(md, "|---|{}", "---:|".repeat(ranking.len()));
  for category in Category::ALL {
    let scores: Vec<String> = ranking
      .iter()
      .map(|r| {
        let score = match category {
          Category::Environmental => r.environmental,
          Category::Social => r.social,
          Category::Governance => r.governance,
        };
        format!("{score:.2}")
      })
      .collect();
    let _ = writeln!(md, "| {category} | {} |", scores.join(" | "));
  }

  if let [winner, runner_up, ..] = ranking.as_slice() {
    let lead = round2(winner.final_score - runner_up.final_score);
    let gap = match ComparisonGap::from_lead(lead) {
      ComparisonGap::Significant => "a significant lead",
      ComparisonGap::Moderate => "a moderate lead",
      ComparisonGap::Close => "a close result",
    };
    let _ = writeln!(
      md,
      "\n## Result\n\n**{}** leads {} by {lead:.2} points, {gap}.",
      winner.company, runner_up.company
    );
  }

  for analysis in analyses {
    let (strengths, weaknesses) = highlights(&analysis.metrics);
    let _ = writeln!(md, "\n## {}\n", analysis.company.name);
    md.push_str("Strengths:\n\n");
    highlight_list(&mut md, &strengths);
    md.push_str("\nAreas for improvement:\n\n");
    highlight_list(&mut md, &weaknesses);
  }
  md
}

fn highlight_list(md: &mut String, highlights: &[Highlight]) {
  for h in highlights {
    let _ = writeln!(md, "- {}: {:.1}/100", h.name, h.value);
  }
}

/// Table cells cannot contain a bare pipe.
fn cell(text: &str) -> String { text.replace('|', "\\|") }

/// A company name as a file name component: alphanumeric runs joined by `_`.
fn file_part(name: &str) -> String {
  name
    .split(|c: char| !c.is_alphanumeric())
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("_")
}
