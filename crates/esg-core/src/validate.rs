//! Metrics validation: the boundary between untrusted model output and the
//! rest of the system.
//!
//! [`validate`] is total: whatever the extractor returned, the result holds
//! exactly one metric per schema slot, with values and confidences clamped
//! into range. Problems with the payload are logged and absorbed here; they
//! never surface as errors.

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
  metric::{Metric, MetricOrigin, ValidatedMetrics},
  schema::{self, Category},
};

/// Longest evidence string kept per metric, in characters.
pub const MAX_EVIDENCE_CHARS: usize = 500;

/// Turn a raw extraction payload into a complete, in-range metric set.
///
/// Accepted shapes are `{"metrics": [...]}` or a bare array of entries, each
/// carrying `category`, `metric_name` (or `name`), `value`, `confidence` and
/// an optional `evidence` string. Prose or a Markdown fence around the JSON
/// is tolerated.
pub fn validate(raw: &str) -> ValidatedMetrics {
  let Some(entries) = parse_entries(raw) else {
    warn!("extraction payload is not usable JSON; every metric defaulted");
    return ValidatedMetrics::all_defaulted();
  };

  let mut slots: Vec<Option<Metric>> = vec![None; schema::METRIC_COUNT];

  for entry in &entries {
    let Some(candidate) = Candidate::from_value(entry) else {
      debug!(?entry, "skipping malformed metric entry");
      continue;
    };

    let Some(index) = schema::position(&candidate.name) else {
      debug!(name = %candidate.name, "discarding metric outside the schema");
      continue;
    };
    let Some((expected, canonical)) = schema::metrics().nth(index) else {
      continue;
    };

    if candidate.category != Some(expected) {
      warn!(
        metric = canonical,
        expected = %expected,
        found = ?candidate.category,
        "metric reported under the wrong category; dropped"
      );
      continue;
    }

    if slots[index].is_some() {
      debug!(metric = canonical, "duplicate metric entry ignored");
      continue;
    }

    slots[index] = Some(Metric {
      category:   expected,
      name:       canonical.to_owned(),
      value:      round2(candidate.value.clamp(0.0, 100.0)),
      confidence: round2(candidate.confidence.clamp(0.0, 1.0)),
      origin:     MetricOrigin::Extracted,
      evidence:   candidate.evidence,
    });
  }

  let metrics: Vec<Metric> = slots
    .into_iter()
    .zip(schema::metrics())
    .map(|(slot, (category, name))| {
      slot.unwrap_or_else(|| Metric::defaulted(category, name))
    })
    .collect();

  let validated = ValidatedMetrics::new(metrics);
  let defaulted = validated.defaulted_count();
  if defaulted > 0 {
    warn!(defaulted, "extraction left metrics unfilled; placeholders used");
  }
  validated
}

// ─── Payload parsing ─────────────────────────────────────────────────────────

fn parse_entries(raw: &str) -> Option<Vec<Value>> {
  match extract_json(raw)? {
    Value::Array(entries) => Some(entries),
    Value::Object(mut object) => match object.remove("metrics") {
      Some(Value::Array(entries)) => Some(entries),
      _ => None,
    },
    _ => None,
  }
}

/// Parse `raw` as JSON, falling back to the outermost `{...}` or `[...]`
/// span when the model wrapped its answer in prose or a code fence.
pub(crate) fn extract_json(raw: &str) -> Option<Value> {
  let trimmed = raw.trim();
  if let Ok(value) = serde_json::from_str(trimmed) {
    return Some(value);
  }

  [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
    let start = trimmed.find(open)?;
    let end = trimmed.rfind(close)?;
    (start < end)
      .then(|| serde_json::from_str(&trimmed[start..=end]).ok())
      .flatten()
  })
}

/// One metric entry as read from the payload, before schema checks.
struct Candidate {
  category:   Option<Category>,
  name:       String,
  value:      f64,
  confidence: f64,
  evidence:   Option<String>,
}

impl Candidate {
  fn from_value(entry: &Value) -> Option<Self> {
    let object = entry.as_object()?;

    let name = object
      .get("metric_name")
      .or_else(|| object.get("name"))
      .and_then(Value::as_str)?
      .to_owned();

    let category = object
      .get("category")
      .and_then(Value::as_str)
      .and_then(|c| c.trim().parse().ok());

    let value = object.get("value").and_then(number)?;
    let confidence = object.get("confidence").and_then(number)?;

    let evidence = object
      .get("evidence")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|e| !e.is_empty())
      .map(|e| e.chars().take(MAX_EVIDENCE_CHARS).collect());

    Some(Self { category, name, value, confidence, evidence })
  }
}

/// A finite number, given either as a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse().ok()?,
    _ => return None,
  };
  n.is_finite().then_some(n)
}

pub(crate) fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn full_payload(value: f64, confidence: f64) -> Value {
    let metrics: Vec<Value> = schema::metrics()
      .map(|(category, name)| {
        json!({
          "category": category.to_string(),
          "metric_name": name,
          "value": value,
          "confidence": confidence,
        })
      })
      .collect();
    json!({ "metrics": metrics })
  }

  fn assert_shape(metrics: &ValidatedMetrics) {
    assert_eq!(metrics.as_slice().len(), schema::METRIC_COUNT);
    for category in Category::ALL {
      assert_eq!(metrics.in_category(category).count(), schema::METRICS_PER_CATEGORY);
    }
    for (metric, (category, name)) in metrics.iter().zip(schema::metrics()) {
      assert_eq!(metric.category, category);
      assert_eq!(metric.name, name);
      assert!((0.0..=100.0).contains(&metric.value));
      assert!((0.0..=1.0).contains(&metric.confidence));
    }
  }

  #[test]
  fn complete_payload_is_kept() {
    let metrics = validate(&full_payload(72.5, 0.8).to_string());
    assert_shape(&metrics);
    assert_eq!(metrics.defaulted_count(), 0);
    assert!(metrics.iter().all(|m| m.value == 72.5 && m.confidence == 0.8));
  }

  #[test]
  fn unparseable_payload_defaults_everything() {
    for raw in ["", "not json at all", "{\"metrics\": 7}", "[1, 2", "null"] {
      let metrics = validate(raw);
      assert_shape(&metrics);
      assert_eq!(metrics.defaulted_count(), schema::METRIC_COUNT, "input {raw:?}");
      assert!(metrics.iter().all(|m| m.value == 0.0 && m.confidence == 0.0));
    }
  }

  #[test]
  fn missing_metrics_are_synthesised() {
    let payload = json!({ "metrics": [
      { "category": "Social", "metric_name": "Human Rights", "value": 90, "confidence": 0.9 }
    ]});
    let metrics = validate(&payload.to_string());
    assert_shape(&metrics);
    assert_eq!(metrics.defaulted_count(), schema::METRIC_COUNT - 1);

    let human_rights = metrics.iter().find(|m| m.name == "Human Rights").unwrap();
    assert_eq!(human_rights.origin, MetricOrigin::Extracted);
    assert_eq!(human_rights.value, 90.0);
  }

  #[test]
  fn out_of_range_values_are_clamped() {
    let payload = json!([
      { "category": "Environmental", "metric_name": "Waste Management", "value": 180, "confidence": 3.5 },
      { "category": "Environmental", "metric_name": "Water Conservation", "value": -20, "confidence": -0.4 },
    ]);
    let metrics = validate(&payload.to_string());
    assert_shape(&metrics);

    let waste = metrics.iter().find(|m| m.name == "Waste Management").unwrap();
    assert_eq!((waste.value, waste.confidence), (100.0, 1.0));
    let water = metrics.iter().find(|m| m.name == "Water Conservation").unwrap();
    assert_eq!((water.value, water.confidence), (0.0, 0.0));
    assert_eq!(water.origin, MetricOrigin::Extracted);
  }

  #[test]
  fn miscategorised_metric_is_replaced_by_a_placeholder() {
    let payload = json!({ "metrics": [
      { "category": "Governance", "metric_name": "Labor Practices", "value": 95, "confidence": 1.0 }
    ]});
    let metrics = validate(&payload.to_string());
    assert_shape(&metrics);

    let labor = metrics.iter().find(|m| m.name == "Labor Practices").unwrap();
    assert_eq!(labor.category, Category::Social);
    assert!(labor.is_defaulted());
    assert_eq!(metrics.defaulted_count(), schema::METRIC_COUNT);
  }

  #[test]
  fn unknown_and_duplicate_names_are_discarded() {
    let payload = json!({ "metrics": [
      { "category": "Social", "metric_name": "Quarterly Revenue", "value": 50, "confidence": 0.5 },
      { "category": "Social", "metric_name": "community impact", "value": 40, "confidence": 0.6 },
      { "category": "Social", "metric_name": "Community Impact", "value": 99, "confidence": 0.9 },
    ]});
    let metrics = validate(&payload.to_string());
    assert_shape(&metrics);

    let community = metrics.iter().find(|m| m.name == "Community Impact").unwrap();
    assert_eq!(community.value, 40.0);
    assert_eq!(metrics.defaulted_count(), schema::METRIC_COUNT - 1);
  }

  #[test]
  fn numeric_strings_fenced_json_and_evidence_are_accepted() {
    let raw = "Here you go:\n```json\n{\"metrics\": [{\"category\": \"governance\", \
               \"name\": \"Risk Management\", \"value\": \"64.456\", \"confidence\": \"0.7\", \
               \"evidence\": \"  Annual risk report  \"}]}\n```";
    let metrics = validate(raw);
    assert_shape(&metrics);

    let risk = metrics.iter().find(|m| m.name == "Risk Management").unwrap();
    assert_eq!(risk.value, 64.46);
    assert_eq!(risk.confidence, 0.7);
    assert_eq!(risk.evidence.as_deref(), Some("Annual risk report"));
  }

  #[test]
  fn non_numeric_values_count_as_missing() {
    let payload = json!({ "metrics": [
      { "category": "Environmental", "metric_name": "Sustainable Materials", "value": "high", "confidence": 0.9 },
      { "category": "Environmental", "metric_name": "Renewable Energy Usage", "value": 80 },
    ]});
    let metrics = validate(&payload.to_string());
    assert_shape(&metrics);
    assert_eq!(metrics.defaulted_count(), schema::METRIC_COUNT);
  }

  #[test]
  fn validating_twice_is_stable() {
    let raw = full_payload(55.0, 0.5).to_string();
    assert_eq!(validate(&raw), validate(&raw));
    assert_eq!(validate("garbage"), validate("garbage"));
  }
}
