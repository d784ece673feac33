//! The scoring engine: a pure function from a validated metric set to a
//! [`ScoreCard`].
//!
//! Each category score is the confidence-weighted mean of its five metric
//! values. The final score is the weighted sum of category scores using the
//! fixed [`schema::WEIGHTS`].

use tracing::debug;

use crate::{
  metric::{Metric, ValidatedMetrics},
  schema::{self, Category},
  score::{CategoryBreakdown, MetricScore, ScoreCard, ScoreLevel},
  validate::round2,
};

/// Most recommendations [`recommendations`] returns.
pub const MAX_RECOMMENDATIONS: usize = 5;

pub fn score(metrics: &ValidatedMetrics) -> ScoreCard {
  let breakdown: Vec<CategoryBreakdown> = Category::ALL
    .into_iter()
    .map(|category| {
      let members: Vec<&Metric> = metrics.in_category(category).collect();
      breakdown(category, &members)
    })
    .collect();

  // Weighted in basis points so the documented examples come out exact.
  let weighted: f64 = breakdown
    .iter()
    .map(|b| b.score * f64::from(schema::WEIGHTS.basis_points(b.category)))
    .sum();
  let unrounded = weighted / f64::from(schema::WEIGHT_BASIS);

  let score_of = |category: Category| {
    breakdown
      .iter()
      .find(|b| b.category == category)
      .map_or(0.0, |b| b.score)
  };

  // The level comes from the unrounded score; only the stored number rounds.
  let card = ScoreCard {
    final_score: round2(unrounded),
    level: ScoreLevel::from_score(unrounded),
    environmental: score_of(Category::Environmental),
    social: score_of(Category::Social),
    governance: score_of(Category::Governance),
    breakdown,
  };
  debug!(final_score = card.final_score, level = %card.level, "scored metric set");
  card
}

/// `Σ(value × confidence) / Σ(confidence)`, or 0 when no metric carries any
/// confidence.
pub fn category_score(metrics: &[&Metric]) -> f64 {
  let total_confidence: f64 = metrics.iter().map(|m| m.confidence).sum();
  if total_confidence <= 0.0 {
    return 0.0;
  }
  let weighted: f64 = metrics.iter().map(|m| m.value * m.confidence).sum();
  round2(weighted / total_confidence)
}

fn breakdown(category: Category, metrics: &[&Metric]) -> CategoryBreakdown {
  let mean_confidence = if metrics.is_empty() {
    0.0
  } else {
    metrics.iter().map(|m| m.confidence).sum::<f64>() / metrics.len() as f64
  };

  CategoryBreakdown {
    category,
    score: category_score(metrics),
    confidence: round2(mean_confidence),
    metric_count: metrics.len(),
    metrics: metrics
      .iter()
      .map(|m| MetricScore {
        name:       m.name.clone(),
        value:      m.value,
        confidence: m.confidence,
      })
      .collect(),
  }
}

/// Improvement suggestions for a scored company, most urgent first.
///
/// An overall line when the final score is below 70, then per category a line
/// when the category scores below 60 and up to two of its metrics below 50.
pub fn recommendations(card: &ScoreCard) -> Vec<String> {
  let mut lines = Vec::new();

  if card.final_score < 50.0 {
    lines.push(
      "Critical: significant improvements needed across all sustainability areas".to_owned(),
    );
  } else if card.final_score < 70.0 {
    lines.push(
      "Important: enhance sustainability practices to meet industry standards".to_owned(),
    );
  }

  for category in &card.breakdown {
    if category.score < 60.0 {
      lines.push(format!(
        "Priority: improve {} practices (current score: {:.1}/100)",
        category.category, category.score
      ));
    }
    for metric in category.metrics.iter().filter(|m| m.value < 50.0).take(2) {
      lines.push(format!(
        "Focus on: {} in {} (score: {:.1}/100)",
        metric.name, category.category, metric.value
      ));
    }
  }

  lines.truncate(MAX_RECOMMENDATIONS);
  lines
}
