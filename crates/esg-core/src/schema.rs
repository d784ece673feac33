//! The fixed metrics schema: three categories of five metrics each, and the
//! weight every category carries in the final score.
//!
//! Nothing here is configurable at runtime. Weights are kept in basis points
//! so the "sums to exactly 1.00" invariant is an integer comparison.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
  Environmental,
  Social,
  Governance,
}

impl Category {
  /// All categories in canonical (schema) order.
  pub const ALL: [Category; 3] =
    [Self::Environmental, Self::Social, Self::Governance];

  /// The five metric names required for this category.
  pub fn metric_names(self) -> &'static [&'static str; METRICS_PER_CATEGORY] {
    match self {
      Self::Environmental => &ENVIRONMENTAL,
      Self::Social => &SOCIAL,
      Self::Governance => &GOVERNANCE,
    }
  }

  /// This category's share of the final score, as a fraction of 1.
  pub fn weight(self) -> f64 { WEIGHTS.fraction(self) }
}

// ─── Metric names ────────────────────────────────────────────────────────────

pub const METRICS_PER_CATEGORY: usize = 5;
pub const METRIC_COUNT: usize = METRICS_PER_CATEGORY * Category::ALL.len();

const ENVIRONMENTAL: [&str; METRICS_PER_CATEGORY] = [
  "Carbon Emissions Reduction",
  "Renewable Energy Usage",
  "Waste Management",
  "Water Conservation",
  "Sustainable Materials",
];

const SOCIAL: [&str; METRICS_PER_CATEGORY] = [
  "Labor Practices",
  "Diversity and Inclusion",
  "Community Impact",
  "Human Rights",
  "Employee Well-being",
];

const GOVERNANCE: [&str; METRICS_PER_CATEGORY] = [
  "Board Independence",
  "Ethics and Compliance",
  "Transparency and Reporting",
  "Risk Management",
  "Stakeholder Engagement",
];

/// Every schema metric as `(category, name)`, in canonical order.
pub fn metrics() -> impl Iterator<Item = (Category, &'static str)> {
  Category::ALL
    .into_iter()
    .flat_map(|c| c.metric_names().iter().map(move |name| (c, *name)))
}

/// Position of `name` in [`metrics`] order. Matching ignores ASCII case and
/// surrounding whitespace.
pub fn position(name: &str) -> Option<usize> {
  let name = name.trim();
  metrics().position(|(_, known)| known.eq_ignore_ascii_case(name))
}

/// The category and canonical spelling of a schema metric name.
pub fn lookup(name: &str) -> Option<(Category, &'static str)> {
  position(name).and_then(|i| metrics().nth(i))
}

pub fn category_of(name: &str) -> Option<Category> { lookup(name).map(|(c, _)| c) }

// ─── Weights ─────────────────────────────────────────────────────────────────

/// The denominator for category weights: 10 000 basis points = 1.00.
pub const WEIGHT_BASIS: u32 = 10_000;

/// Category weights in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryWeights {
  pub environmental: u32,
  pub social:        u32,
  pub governance:    u32,
}

impl CategoryWeights {
  pub const fn total(&self) -> u32 {
    self.environmental + self.social + self.governance
  }

  pub const fn is_balanced(&self) -> bool { self.total() == WEIGHT_BASIS }

  /// Fail unless the weights add up to exactly 1.00.
  pub fn check(&self) -> Result<()> {
    if self.is_balanced() {
      Ok(())
    } else {
      Err(Error::UnbalancedWeights { total: self.total() })
    }
  }

  pub const fn basis_points(&self, category: Category) -> u32 {
    match category {
      Category::Environmental => self.environmental,
      Category::Social => self.social,
      Category::Governance => self.governance,
    }
  }

  pub fn fraction(&self, category: Category) -> f64 {
    f64::from(self.basis_points(category)) / f64::from(WEIGHT_BASIS)
  }
}

/// Environmental 0.40, Social 0.35, Governance 0.25.
pub const WEIGHTS: CategoryWeights = CategoryWeights {
  environmental: 4_000,
  social:        3_500,
  governance:    2_500,
};

const _: () = assert!(WEIGHTS.is_balanced(), "category weights must sum to 1.00");
