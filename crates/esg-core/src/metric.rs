//! Metric types.
//!
//! A [`ValidatedMetrics`] set can only be produced by
//! [`crate::validate::validate`], so holding one proves the schema
//! invariants: fifteen entries in schema order, five per category, every
//! value in `[0, 100]` and every confidence in `[0, 1]`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::schema::{self, Category};

/// Whether a metric came from the extractor or was synthesised because the
/// extractor's output did not supply a usable entry.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricOrigin {
  Extracted,
  Defaulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
  pub category:   Category,
  pub name:       String,
  pub value:      f64,
  pub confidence: f64,
  pub origin:     MetricOrigin,
  /// Short supporting quote or summary supplied by the extractor.
  pub evidence:   Option<String>,
}

impl Metric {
  /// A zero-value, zero-confidence placeholder for a schema slot.
  pub fn defaulted(category: Category, name: &str) -> Self {
    Self {
      category,
      name: name.to_owned(),
      value: 0.0,
      confidence: 0.0,
      origin: MetricOrigin::Defaulted,
      evidence: None,
    }
  }

  pub fn is_defaulted(&self) -> bool { self.origin == MetricOrigin::Defaulted }
}

/// Exactly [`schema::METRIC_COUNT`] metrics in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedMetrics(Vec<Metric>);

impl ValidatedMetrics {
  pub(crate) fn new(metrics: Vec<Metric>) -> Self {
    debug_assert_eq!(metrics.len(), schema::METRIC_COUNT);
    Self(metrics)
  }

  /// Every schema slot filled with a placeholder.
  pub fn all_defaulted() -> Self {
    Self::new(
      schema::metrics()
        .map(|(category, name)| Metric::defaulted(category, name))
        .collect(),
    )
  }

  pub fn as_slice(&self) -> &[Metric] { &self.0 }

  pub fn iter(&self) -> std::slice::Iter<'_, Metric> { self.0.iter() }

  pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Metric> {
    self.0.iter().filter(move |m| m.category == category)
  }

  pub fn defaulted_count(&self) -> usize {
    self.0.iter().filter(|m| m.is_defaulted()).count()
  }

  pub fn into_inner(self) -> Vec<Metric> { self.0 }
}

impl<'a> IntoIterator for &'a ValidatedMetrics {
  type Item = &'a Metric;
  type IntoIter = std::slice::Iter<'a, Metric>;

  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}
