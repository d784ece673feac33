//! Plain-text rendering of [`Reply`] values for the terminal.

use std::fmt::Write as _;

use esg_core::{
  company::CompanySummary,
  reply::{AnalysisFailure, CompanyOutcome, ComparisonGap, Reply, ScoreReport},
  score::ScoreRecord,
};

pub fn reply(reply: &Reply) -> String {
  let mut out = String::new();
  match reply {
    Reply::Analyzed { outcomes } => {
      for outcome in outcomes {
        match outcome {
          CompanyOutcome::Analyzed(a) => {
            let _ = writeln!(
              out,
              "{}: {:.1} ({}){}",
              a.company,
              a.final_score,
              a.level,
              if a.cached { " [cached]" } else { "" }
            );
            let _ = writeln!(
              out,
              "  E {:.1} | S {:.1} | G {:.1}",
              a.environmental, a.social, a.governance
            );
            if !a.cached {
              let _ = writeln!(
                out,
                "  {} sources, {} failed URLs, {} metrics defaulted",
                a.source_count,
                a.failed_urls.len(),
                a.defaulted_metrics
              );
            }
          }
          CompanyOutcome::Failed(f) => failure(&mut out, f),
        }
      }
    }
    Reply::Comparison { ranking, winner, lead, gap, failures } => {
      for (rank, company) in ranking.iter().enumerate() {
        let _ = writeln!(
          out,
          "{}. {}: {:.1} ({}) E {:.1} | S {:.1} | G {:.1}",
          rank + 1,
          company.company,
          company.final_score,
          company.level,
          company.environmental,
          company.social,
          company.governance
        );
      }
      let band = match gap {
        ComparisonGap::Significant => "a significant",
        ComparisonGap::Moderate => "a moderate",
        ComparisonGap::Close => "a close",
      };
      let _ = writeln!(out, "{winner} leads by {lead:.2} points, {band} margin.");
      for f in failures {
        failure(&mut out, f);
      }
    }
    Reply::Scores { reports, failures } => {
      for report in reports {
        score_report(&mut out, report);
      }
      for f in failures {
        failure(&mut out, f);
      }
    }
    Reply::Answer { company, answer, final_score, sources, .. } => {
      let _ = writeln!(out, "{answer}");
      let _ = writeln!(out, "({company} ESG score: {final_score:.1})");
      for url in sources {
        let _ = writeln!(out, "  - {url}");
      }
    }
    Reply::Report(report) => {
      let _ = writeln!(
        out,
        "Report ready for {}: {}",
        report.companies.join(", "),
        report.file_name
      );
    }
    Reply::Deleted { deleted, not_found } => {
      if !deleted.is_empty() {
        let _ = writeln!(out, "Deleted: {}", deleted.join(", "));
      }
      if !not_found.is_empty() {
        let _ = writeln!(out, "Not found: {}", not_found.join(", "));
      }
    }
    Reply::Listing { companies } => out.push_str(&listing(companies)),
    Reply::Cleared { removed } => {
      let _ = writeln!(out, "Removed {removed} companies.");
    }
    Reply::Clarification { message } | Reply::Invalid { message } => {
      let _ = writeln!(out, "{message}");
    }
  }
  out
}

pub fn listing(companies: &[CompanySummary]) -> String {
  if companies.is_empty() {
    return "No companies analyzed yet.\n".to_owned();
  }
  let mut out = String::new();
  for summary in companies {
    let score = match (summary.final_score, summary.level) {
      (Some(score), Some(level)) => format!("{score:.1} ({level})"),
      _ => "unscored".to_owned(),
    };
    let _ = writeln!(
      out,
      "{:<30} {:<18} updated {}",
      summary.company.name,
      score,
      summary.company.last_updated.format("%Y-%m-%d %H:%M")
    );
  }
  out
}

pub fn history(name: &str, records: &[ScoreRecord]) -> String {
  if records.is_empty() {
    return format!("No score history for {name}.\n");
  }
  let mut out = String::new();
  for record in records {
    let card = &record.card;
    let _ = writeln!(
      out,
      "{}  {:.1} ({})  E {:.1} | S {:.1} | G {:.1}",
      record.computed_at.format("%Y-%m-%d %H:%M"),
      card.final_score,
      card.level,
      card.environmental,
      card.social,
      card.governance
    );
  }
  out
}

fn score_report(out: &mut String, report: &ScoreReport) {
  let card = &report.card;
  let _ = writeln!(
    out,
    "{}: {:.1} ({}), computed {}",
    report.company,
    card.final_score,
    card.level,
    report.computed_at.format("%Y-%m-%d")
  );
  let _ = writeln!(
    out,
    "  E {:.1} | S {:.1} | G {:.1}",
    card.environmental, card.social, card.governance
  );
  let highlights = |items: &[esg_core::reply::Highlight]| {
    items
      .iter()
      .map(|h| format!("{} {:.0}", h.name, h.value))
      .collect::<Vec<_>>()
      .join(", ")
  };
  let _ = writeln!(out, "  Strengths: {}", highlights(&report.strengths));
  let _ = writeln!(out, "  Weaknesses: {}", highlights(&report.weaknesses));
  for line in &report.recommendations {
    let _ = writeln!(out, "  * {line}");
  }
}

fn failure(out: &mut String, f: &AnalysisFailure) {
  let _ = writeln!(out, "{}: failed ({})", f.company, f.reason);
}
