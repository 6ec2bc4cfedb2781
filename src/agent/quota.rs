//! Model quota tracker
//!
//! A time-boxed circuit breaker recording which backing models are
//! currently rate-limited and excluded from selection. Expiry is checked
//! on read instead of via a scheduled callback, so there is no timer to
//! leak when the orchestrator is torn down mid-cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks quota exclusions for the two candidate models.
///
/// `candidate_order` always yields the primary model first, then the
/// fallback, skipping excluded ones. An empty result signals the
/// orchestrator to short-circuit with a degraded response.
pub struct QuotaTracker {
    primary: String,
    fallback: String,
    cooldown: Duration,
    /// model name -> exclusion expiry. At most one entry per model;
    /// re-marking refreshes the expiry instead of stacking.
    excluded: Mutex<HashMap<String, Instant>>,
}

impl QuotaTracker {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            cooldown,
            excluded: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `model` is currently banned from selection.
    pub fn is_excluded(&self, model: &str) -> bool {
        let mut excluded = self.excluded.lock().expect("quota map poisoned");
        match excluded.get(model) {
            Some(expiry) if Instant::now() < *expiry => true,
            Some(_) => {
                // Cooldown has elapsed; drop the stale entry
                excluded.remove(model);
                false
            }
            None => false,
        }
    }

    /// Exclude `model` for the configured cooldown.
    pub fn mark_excluded(&self, model: &str) {
        let expiry = Instant::now() + self.cooldown;
        let mut excluded = self.excluded.lock().expect("quota map poisoned");
        excluded.insert(model.to_string(), expiry);
        tracing::warn!(
            model = %model,
            cooldown_secs = self.cooldown.as_secs(),
            "Model marked as quota-excluded"
        );
    }

    /// Candidate models ordered by preference, excluded ones skipped.
    pub fn candidate_order(&self) -> Vec<String> {
        [&self.primary, &self.fallback]
            .into_iter()
            .filter(|model| !self.is_excluded(model))
            .cloned()
            .collect()
    }

    /// Models currently excluded (for the stats endpoint).
    pub fn excluded_models(&self) -> Vec<String> {
        let now = Instant::now();
        let mut excluded = self.excluded.lock().expect("quota map poisoned");
        excluded.retain(|_, expiry| now < *expiry);
        let mut models: Vec<String> = excluded.keys().cloned().collect();
        models.sort();
        models
    }

    pub fn primary_model(&self) -> &str {
        &self.primary
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback
    }
}
