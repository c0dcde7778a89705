//! Scoring agents.
//!
//! Each agent implements [`Scorer`] for one [`Dimension`]. Caching and
//! metrics are not part of the trait; [`CachedAgent`] wraps any scorer with
//! both.

pub mod economy;
pub mod financing;
pub mod fit;
pub mod maintenance;
pub mod metrics;
pub mod resale;
pub mod weights;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::models::{AgentScore, BuyerProfile, Dimension, ScoreSource, Vehicle};
use crate::services::{CacheKey, CacheService};

pub use economy::EconomyAgent;
pub use financing::{FinancingAgent, FinancingTerms, RiskTier};
pub use fit::{BudgetAgent, CategoryFitAgent, PriorityAgent};
pub use maintenance::MaintenanceAgent;
pub use metrics::{AgentMetrics, MetricsSnapshot};
pub use resale::ResaleAgent;
pub use weights::{WeightOptimizerAgent, WeightOutcome};

/// Score substituted when an agent has nothing better to offer
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Errors an agent can report. None of them escape the orchestrator.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Agent {agent} produced invalid score {value}")]
    InvalidScore { agent: String, value: f64 },

    #[error("Missing profile data: {0}")]
    MissingProfileData(String),

    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid weight vector: {0}")]
    InvalidWeights(String),
}

/// One scoring strategy for one dimension.
///
/// `compute_score` must be a pure function of its inputs: the result is
/// cached under a key built from the vehicle id and [`Scorer::cache_fields`].
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn dimension(&self) -> Dimension;

    /// Score in 0.0..=1.0. Anything else is replaced by the fallback score.
    fn compute_score(&self, vehicle: &Vehicle, profile: &BuyerProfile) -> Result<f64, ScoringError>;

    /// Profile fields `compute_score` reads, by name. Nothing else about the
    /// profile may influence the score.
    fn cache_fields(&self, _profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::new()
    }

    fn fallback_score(&self) -> f64 {
        NEUTRAL_SCORE
    }
}

#[inline]
pub fn is_valid_score(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Reject non-finite and out-of-range scores
pub fn validate_score(agent: &str, value: f64) -> Result<f64, ScoringError> {
    if is_valid_score(value) {
        Ok(value)
    } else {
        Err(ScoringError::InvalidScore {
            agent: agent.to_string(),
            value,
        })
    }
}

/// Caching and metrics around a [`Scorer`]
pub struct CachedAgent {
    scorer: Arc<dyn Scorer>,
    cache: Arc<CacheService>,
    metrics: AgentMetrics,
    ttl: Option<Duration>,
    fallback: Option<f64>,
}

impl CachedAgent {
    pub fn new<S>(scorer: S, cache: Arc<CacheService>) -> Self
    where
        S: Scorer + 'static,
    {
        Self::from_arc(Arc::new(scorer), cache)
    }

    pub fn from_arc(scorer: Arc<dyn Scorer>, cache: Arc<CacheService>) -> Self {
        Self {
            scorer,
            cache,
            metrics: AgentMetrics::new(),
            ttl: None,
            fallback: None,
        }
    }

    /// Cache TTL for this agent's scores; the cache default when unset
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Override the scorer's own fallback score
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn dimension(&self) -> Dimension {
        self.scorer.dimension()
    }

    pub fn cache_key(&self, vehicle: &Vehicle, profile: &BuyerProfile) -> String {
        let fields = self.scorer.cache_fields(profile);
        CacheKey::agent_score(
            self.cache.namespace(),
            self.scorer.name(),
            &vehicle.id,
            &CacheKey::profile_hash(&fields),
        )
    }

    /// Uncached, unvalidated score straight from the wrapped scorer
    pub fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        self.scorer.compute_score(vehicle, profile)
    }

    /// Score through the cache. Never fails: an invalid or failed computation
    /// yields the fallback score with [`ScoreSource::Fallback`].
    pub async fn compute_score_cached(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> AgentScore {
        let started = Instant::now();
        let key = self.cache_key(vehicle, profile);

        if let Some(value) = self.cache.get::<f64>(&key).await {
            if is_valid_score(value) {
                let latency = started.elapsed();
                self.metrics.record_cache_hit(latency);
                return self.agent_score(value, ScoreSource::Cache, latency);
            }
            tracing::debug!("Discarding invalid cached score {} for {}", value, key);
            self.cache.delete(&key).await;
        }

        let outcome = self
            .scorer
            .compute_score(vehicle, profile)
            .and_then(|value| validate_score(self.name(), value));

        match outcome {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, &value, self.ttl).await {
                    tracing::debug!("Failed to cache score for {}: {}", key, e);
                }
                let latency = started.elapsed();
                self.metrics.record_success(latency);
                self.agent_score(value, ScoreSource::Computed, latency)
            }
            Err(e) => {
                let fallback = self.fallback_value();
                tracing::warn!(
                    "Agent {} failed for vehicle {}, using fallback {}: {}",
                    self.name(),
                    vehicle.id,
                    fallback,
                    e
                );
                let latency = started.elapsed();
                self.metrics.record_failure(latency);
                self.agent_score(fallback, ScoreSource::Fallback, latency)
            }
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn fallback_value(&self) -> f64 {
        let fallback = self.fallback.unwrap_or_else(|| self.scorer.fallback_score());
        if is_valid_score(fallback) {
            fallback
        } else {
            NEUTRAL_SCORE
        }
    }

    fn agent_score(&self, value: f64, source: ScoreSource, latency: Duration) -> AgentScore {
        AgentScore {
            dimension: self.dimension(),
            agent: self.name().to_string(),
            value,
            source,
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }
}

/// Format an optional profile value for [`Scorer::cache_fields`]
pub(crate) fn field_value<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{BaselineScores, Category, Dealership, FuelType, Transmission, Vehicle};

    pub fn vehicle(id: &str, category: Category, price: f64, year: u16, mileage: u32) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            brand: "Toyota".to_string(),
            model: "Test".to_string(),
            year,
            price,
            mileage,
            category,
            fuel_type: FuelType::Flex,
            transmission: Transmission::Automatic,
            scores: BaselineScores::default(),
            fuel_efficiency: None,
            dealership: Dealership {
                id: "d1".to_string(),
                name: "Test Motors".to_string(),
                city: "Sao Paulo".to_string(),
                region: "SP".to_string(),
            },
        }
    }
}
