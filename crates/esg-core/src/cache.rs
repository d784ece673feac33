//! The cache gate: decides whether a stored analysis is fresh enough to reuse.
//!
//! Freshness is judged only from persisted timestamps. A company is a hit
//! when `now - last_updated <= window` and it has a score record; anything
//! else means the analysis has to be recomputed.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::store::{Analysis, AnalysisStore};

/// Default freshness window, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
  Hit(Box<Analysis>),
  Miss(MissReason),
}

impl Freshness {
  pub fn is_hit(&self) -> bool { matches!(self, Self::Hit(_)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
  NotFound,
  Stale { age: Duration },
  /// The company exists but has no score record.
  Unscored,
}

/// Read-only freshness check over a store.
pub struct CacheGate<'a, S> {
  store: &'a S,
}

impl<'a, S: AnalysisStore> CacheGate<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  pub async fn check(&self, company: &str, window_days: u32) -> Result<Freshness, S::Error> {
    self.check_at(company, window_days, Utc::now()).await
  }

  /// As [`check`](Self::check), measuring age from `now`.
  pub async fn check_at(
    &self,
    company: &str,
    window_days: u32,
    now: DateTime<Utc>,
  ) -> Result<Freshness, S::Error> {
    let Some(stored) = self.store.get_current(company).await? else {
      debug!(company, "cache miss: unknown company");
      return Ok(Freshness::Miss(MissReason::NotFound));
    };

    let age = now - stored.company.last_updated;
    if age > Duration::days(i64::from(window_days)) {
      debug!(company, age_hours = age.num_hours(), "cache miss: stale");
      return Ok(Freshness::Miss(MissReason::Stale { age }));
    }

    match stored.into_scored() {
      Some(analysis) => {
        debug!(company, "cache hit");
        Ok(Freshness::Hit(Box::new(analysis)))
      }
      None => {
        debug!(company, "cache miss: no score record");
        Ok(Freshness::Miss(MissReason::Unscored))
      }
    }
  }
}
