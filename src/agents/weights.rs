//! Profile-specific weight vectors.
//!
//! Three independent pieces: [`heuristic_weights`] looks the profile up in a
//! usage table, [`semantic_adjustment`] asks an optional external analyzer
//! for per-dimension deltas, and [`blend`] merges the two and renormalizes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agents::{field_value, AgentMetrics, MetricsSnapshot, ScoringError};
use crate::config::ScoringSettings;
use crate::models::{BuyerProfile, Dimension, Usage, WeightSource, WeightVector};
use crate::services::{CacheKey, CacheService, SemanticAnalyzer, SemanticError};

/// Largest shift a semantic delta can apply to one weight
pub const SEMANTIC_SCALE: f64 = 0.5;

/// Configured weight table row used for profiles without a primary usage
pub const NEUTRAL_ROW: &str = "neutral";

/// Built-in weights per primary usage, in [`Dimension::ALL`] order:
/// category fit, priorities, budget, economy, maintenance, resale, financing
fn builtin_table(usage: Option<Usage>) -> [f64; 7] {
    match usage {
        Some(Usage::Family) => [0.25, 0.25, 0.15, 0.10, 0.10, 0.10, 0.05],
        Some(Usage::Commercial) => [0.35, 0.05, 0.15, 0.15, 0.20, 0.05, 0.05],
        Some(Usage::Urban) => [0.15, 0.20, 0.20, 0.20, 0.10, 0.10, 0.05],
        Some(Usage::Leisure) => [0.15, 0.30, 0.15, 0.10, 0.10, 0.15, 0.05],
        Some(Usage::FirstCar) => [0.10, 0.15, 0.25, 0.15, 0.15, 0.05, 0.15],
        Some(Usage::RideHailing) => [0.20, 0.05, 0.15, 0.30, 0.20, 0.05, 0.05],
        // No usage stated: neutral entry
        None => [0.15, 0.20, 0.20, 0.15, 0.10, 0.10, 0.10],
    }
}

/// Map a free-form semantic dimension name onto a weight category
pub fn map_semantic_dimension(name: &str) -> Option<Dimension> {
    match name.trim().to_ascii_lowercase().as_str() {
        "category_fit" | "category" | "body_style" | "usage" => Some(Dimension::CategoryFit),
        "priorities" | "space" | "safety" | "comfort" | "performance" => {
            Some(Dimension::Priorities)
        }
        "budget" | "price" => Some(Dimension::Budget),
        "economy" | "fuel" | "consumption" => Some(Dimension::Economy),
        "maintenance" | "reliability" => Some(Dimension::Maintenance),
        "resale" | "value_retention" => Some(Dimension::Resale),
        "financing" | "credit" => Some(Dimension::Financing),
        _ => None,
    }
}

/// Usage-keyed weight table with optional per-usage overrides
#[derive(Debug, Clone, Default)]
pub struct HeuristicTable {
    overrides: HashMap<Option<Usage>, BTreeMap<Dimension, f64>>,
}

impl HeuristicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the configured `scoring.weight_tables` rows applied.
    ///
    /// Unknown usage keys and dimension names are skipped with a warning.
    pub fn from_settings(settings: &ScoringSettings) -> Self {
        let mut table = Self::new();
        for (usage_key, row) in &settings.weight_tables {
            let usage = if usage_key.eq_ignore_ascii_case(NEUTRAL_ROW) {
                None
            } else {
                match Usage::from_key(usage_key) {
                    Some(usage) => Some(usage),
                    None => {
                        tracing::warn!("Ignoring weight table for unknown usage: {}", usage_key);
                        continue;
                    }
                }
            };

            let mut weights = BTreeMap::new();
            for (name, weight) in row {
                match map_semantic_dimension(name) {
                    Some(dimension) => {
                        *weights.entry(dimension).or_insert(0.0) += weight;
                    }
                    None => tracing::warn!(
                        "Ignoring unknown dimension {} in {} weight table",
                        name,
                        usage_key
                    ),
                }
            }
            table = table.with_override(usage, weights);
        }
        table
    }

    /// Replace the entry for a usage (`None` is the neutral entry)
    pub fn with_override(
        mut self,
        usage: Option<Usage>,
        weights: BTreeMap<Dimension, f64>,
    ) -> Self {
        self.overrides.insert(usage, weights);
        self
    }

    fn raw_entry(&self, usage: Option<Usage>) -> Vec<(Dimension, f64)> {
        match self.overrides.get(&usage) {
            Some(weights) => weights.iter().map(|(d, w)| (*d, *w)).collect(),
            None => Dimension::ALL.iter().copied().zip(builtin_table(usage)).collect(),
        }
    }
}

/// Heuristic weights for a profile
pub fn heuristic_weights(
    profile: &BuyerProfile,
    table: &HeuristicTable,
) -> Result<WeightVector, ScoringError> {
    WeightVector::normalized(table.raw_entry(profile.primary_usage)).ok_or_else(|| {
        ScoringError::InvalidWeights(format!(
            "heuristic entry for {} has no positive weight",
            profile.usage_label()
        ))
    })
}

/// Per-dimension deltas from the analyzer, clamped to -1.0..=1.0.
///
/// Empty when there is no analyzer, it fails, or it exceeds `timeout`.
/// Several semantic names mapping to one dimension are averaged.
pub async fn semantic_adjustment(
    analyzer: Option<&dyn SemanticAnalyzer>,
    profile: &BuyerProfile,
    timeout: Duration,
) -> BTreeMap<Dimension, f64> {
    let Some(analyzer) = analyzer else {
        return BTreeMap::new();
    };

    let raw = match tokio::time::timeout(timeout, analyzer.analyze(profile)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            tracing::warn!(
                "Semantic analyzer {} failed, using heuristic weights: {}",
                analyzer.name(),
                e
            );
            return BTreeMap::new();
        }
        Err(_) => {
            tracing::warn!(
                "Semantic analyzer {} failed, using heuristic weights: {}",
                analyzer.name(),
                SemanticError::Timeout(timeout)
            );
            return BTreeMap::new();
        }
    };

    let mut sums: BTreeMap<Dimension, (f64, u32)> = BTreeMap::new();
    for (name, delta) in raw {
        match map_semantic_dimension(&name) {
            Some(dimension) if delta.is_finite() => {
                let entry = sums.entry(dimension).or_insert((0.0, 0));
                entry.0 += delta.clamp(-1.0, 1.0);
                entry.1 += 1;
            }
            Some(_) => {}
            None => tracing::debug!("Ignoring unknown semantic dimension: {}", name),
        }
    }

    sums.into_iter()
        .map(|(dimension, (sum, count))| (dimension, sum / count as f64))
        .collect()
}

/// Add `delta × 0.5` to each weight, floor at zero and renormalize.
///
/// Falls back to `heuristic` when the adjusted vector has nothing left.
pub fn blend(heuristic: &WeightVector, adjustment: &BTreeMap<Dimension, f64>) -> WeightVector {
    if adjustment.is_empty() {
        return heuristic.clone();
    }

    let adjusted = heuristic.iter().map(|(dimension, weight)| {
        let delta = adjustment.get(&dimension).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        (dimension, weight + delta * SEMANTIC_SCALE)
    });

    WeightVector::normalized(adjusted).unwrap_or_else(|| heuristic.clone())
}

/// Weights chosen for a profile and how they were obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightOutcome {
    pub weights: WeightVector,
    pub source: WeightSource,
}

/// Produces the weight vector a profile's scores are blended with
pub struct WeightOptimizerAgent {
    table: HeuristicTable,
    analyzer: Option<Arc<dyn SemanticAnalyzer>>,
    analyzer_timeout: Duration,
    cache: Arc<CacheService>,
    metrics: AgentMetrics,
}

impl WeightOptimizerAgent {
    pub const NAME: &'static str = "weight_optimizer";

    pub fn new(cache: Arc<CacheService>) -> Self {
        Self {
            table: HeuristicTable::new(),
            analyzer: None,
            analyzer_timeout: Duration::from_millis(800),
            cache,
            metrics: AgentMetrics::new(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SemanticAnalyzer>, timeout: Duration) -> Self {
        self.analyzer = Some(analyzer);
        self.analyzer_timeout = timeout;
        self
    }

    pub fn with_table(mut self, table: HeuristicTable) -> Self {
        self.table = table;
        self
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    fn cache_key(&self, profile: &BuyerProfile) -> String {
        let p = &profile.priorities;
        let fields = BTreeMap::from([
            ("usage", profile.usage_label().to_string()),
            ("family_size", profile.family_size.to_string()),
            ("income_band", field_value(profile.income_band.map(|b| b.as_str()))),
            ("budget_min", format!("{:.0}", profile.budget_min)),
            ("budget_max", format!("{:.0}", profile.budget_max)),
            (
                "priorities",
                format!(
                    "{}-{}-{}-{}-{}",
                    p.economy, p.space, p.performance, p.comfort, p.safety
                ),
            ),
        ]);
        CacheKey::weights(self.cache.namespace(), Self::NAME, &CacheKey::profile_hash(&fields))
    }

    /// Weight vector for a profile. Errors only when the heuristic table has
    /// no usable entry for the profile or the result breaks the sum invariant.
    pub async fn optimize(&self, profile: &BuyerProfile) -> Result<WeightOutcome, ScoringError> {
        let started = Instant::now();
        let key = self.cache_key(profile);

        if let Some(outcome) = self.cache.get::<WeightOutcome>(&key).await {
            if outcome.weights.is_valid() {
                self.metrics.record_cache_hit(started.elapsed());
                return Ok(outcome);
            }
        }

        let result = self.compute(profile).await;
        match &result {
            Ok(outcome) => {
                // A heuristic outcome with an analyzer configured means the
                // analyzer was unavailable; ask it again next time.
                let degraded = self.analyzer.is_some() && outcome.source == WeightSource::Heuristic;
                if !degraded {
                    if let Err(e) = self.cache.set(&key, outcome, None).await {
                        tracing::debug!("Failed to cache weights for {}: {}", key, e);
                    }
                }
                self.metrics.record_success(started.elapsed());
            }
            Err(_) => self.metrics.record_failure(started.elapsed()),
        }
        result
    }

    async fn compute(&self, profile: &BuyerProfile) -> Result<WeightOutcome, ScoringError> {
        let heuristic = heuristic_weights(profile, &self.table)?;
        let adjustment =
            semantic_adjustment(self.analyzer.as_deref(), profile, self.analyzer_timeout).await;

        let (weights, source) = if adjustment.is_empty() {
            (heuristic, WeightSource::Heuristic)
        } else {
            (blend(&heuristic, &adjustment), WeightSource::Semantic)
        };

        if !weights.is_valid() {
            return Err(ScoringError::InvalidWeights(format!("weights sum to {}", weights.sum())));
        }

        tracing::debug!(
            "Weights for {} profile ({:?}): {:?}",
            profile.usage_label(),
            source,
            weights
        );
        Ok(WeightOutcome { weights, source })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::models::WEIGHT_SUM_TOLERANCE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAnalyzer(HashMap<String, f64>);

    #[async_trait]
    impl SemanticAnalyzer for FixedAnalyzer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn analyze(
            &self,
            _profile: &BuyerProfile,
        ) -> Result<HashMap<String, f64>, SemanticError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for BrokenAnalyzer {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn analyze(
            &self,
            _profile: &BuyerProfile,
        ) -> Result<HashMap<String, f64>, SemanticError> {
            Err(SemanticError::ApiError("down".into()))
        }
    }

    /// Fails its first call, succeeds afterwards
    struct FlakyAnalyzer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SemanticAnalyzer for FlakyAnalyzer {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn analyze(
            &self,
            _profile: &BuyerProfile,
        ) -> Result<HashMap<String, f64>, SemanticError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SemanticError::ApiError("warming up".into()));
            }
            Ok(HashMap::from([("economy".to_string(), 0.8)]))
        }
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for SlowAnalyzer {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn analyze(
            &self,
            _profile: &BuyerProfile,
        ) -> Result<HashMap<String, f64>, SemanticError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HashMap::from([("economy".to_string(), 1.0)]))
        }
    }

    fn cache() -> Arc<CacheService> {
        Arc::new(CacheService::local_only(100, Duration::from_secs(60)))
    }

    fn profile(usage: Option<Usage>) -> BuyerProfile {
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.primary_usage = usage;
        profile
    }

    #[test]
    fn test_builtin_tables_sum_to_one() {
        let usages = [
            None,
            Some(Usage::Family),
            Some(Usage::Commercial),
            Some(Usage::Urban),
            Some(Usage::Leisure),
            Some(Usage::FirstCar),
            Some(Usage::RideHailing),
        ];
        for usage in usages {
            let raw: f64 = builtin_table(usage).iter().sum();
            assert!((raw - 1.0).abs() < WEIGHT_SUM_TOLERANCE, "{:?} sums to {}", usage, raw);
        }
    }

    #[test]
    fn test_family_emphasizes_fit_and_priorities() {
        let weights =
            heuristic_weights(&profile(Some(Usage::Family)), &HeuristicTable::new()).unwrap();
        let top = weights.max_weight();
        assert_eq!(weights.get(Dimension::CategoryFit), top);
        assert_eq!(weights.get(Dimension::Priorities), top);
    }

    #[test]
    fn test_commercial_emphasizes_category_fit_alone() {
        let weights =
            heuristic_weights(&profile(Some(Usage::Commercial)), &HeuristicTable::new()).unwrap();
        let fit = weights.get(Dimension::CategoryFit);
        assert!(weights.iter().filter(|(d, _)| *d != Dimension::CategoryFit).all(|(_, w)| w < fit));
    }

    #[test]
    fn test_blend_renormalizes() {
        let heuristic =
            heuristic_weights(&profile(Some(Usage::Urban)), &HeuristicTable::new()).unwrap();
        let adjustment = BTreeMap::from([(Dimension::Economy, 1.0), (Dimension::Resale, -1.0)]);

        let blended = blend(&heuristic, &adjustment);

        assert!((blended.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(blended.get(Dimension::Economy) > heuristic.get(Dimension::Economy));
        assert_eq!(blended.get(Dimension::Resale), 0.0);
    }

    #[test]
    fn test_blend_extreme_adjustments_stay_valid() {
        let heuristic = WeightVector::balanced();
        for delta in [-1.0, -0.5, 0.0, 0.5, 1.0, 7.0, -7.0] {
            let adjustment: BTreeMap<Dimension, f64> =
                Dimension::ALL.iter().map(|d| (*d, delta)).collect();
            assert!(blend(&heuristic, &adjustment).is_valid(), "delta {}", delta);
        }
    }

    #[tokio::test]
    async fn test_semantic_adjustment_maps_and_averages() {
        let analyzer = FixedAnalyzer(HashMap::from([
            ("safety".to_string(), 0.6),
            ("space".to_string(), 0.2),
            ("fuel".to_string(), 3.0),
            ("horoscope".to_string(), 1.0),
        ]));

        let adjustment =
            semantic_adjustment(
                Some(&analyzer as &dyn SemanticAnalyzer),
                &profile(None),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(adjustment.len(), 2);
        assert!((adjustment[&Dimension::Priorities] - 0.4).abs() < 1e-12);
        assert_eq!(adjustment[&Dimension::Economy], 1.0);
    }

    #[tokio::test]
    async fn test_optimizer_uses_heuristic_when_analyzer_fails() {
        let optimizer = WeightOptimizerAgent::new(cache())
            .with_analyzer(Arc::new(BrokenAnalyzer), Duration::from_secs(1));
        let family = profile(Some(Usage::Family));

        let outcome = optimizer.optimize(&family).await.unwrap();

        assert_eq!(outcome.source, WeightSource::Heuristic);
        assert_eq!(outcome.weights, heuristic_weights(&family, &HeuristicTable::new()).unwrap());
    }

    #[tokio::test]
    async fn test_optimizer_retries_analyzer_after_outage() {
        let analyzer = Arc::new(FlakyAnalyzer { calls: AtomicUsize::new(0) });
        let optimizer = WeightOptimizerAgent::new(cache())
            .with_analyzer(analyzer.clone(), Duration::from_secs(1));
        let buyer = profile(Some(Usage::Family));

        let first = optimizer.optimize(&buyer).await.unwrap();
        let second = optimizer.optimize(&buyer).await.unwrap();
        let third = optimizer.optimize(&buyer).await.unwrap();

        assert_eq!(first.source, WeightSource::Heuristic);
        assert_eq!(second.source, WeightSource::Semantic);
        assert_eq!(third, second);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(optimizer.metrics().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_optimizer_times_out_slow_analyzer() {
        let optimizer =
            WeightOptimizerAgent::new(cache())
                .with_analyzer(Arc::new(SlowAnalyzer), Duration::from_millis(20));

        let outcome = optimizer.optimize(&profile(Some(Usage::Urban))).await.unwrap();
        assert_eq!(outcome.source, WeightSource::Heuristic);
    }

    #[tokio::test]
    async fn test_optimizer_blends_and_caches() {
        let analyzer = FixedAnalyzer(HashMap::from([("economy".to_string(), 0.8)]));
        let optimizer = WeightOptimizerAgent::new(cache())
            .with_analyzer(Arc::new(analyzer), Duration::from_secs(1));
        let buyer = profile(Some(Usage::Leisure));

        let first = optimizer.optimize(&buyer).await.unwrap();
        let second = optimizer.optimize(&buyer).await.unwrap();

        assert_eq!(first.source, WeightSource::Semantic);
        assert!(first.weights.is_valid());
        assert_eq!(first, second);
        assert_eq!(optimizer.metrics().cache_hits, 1);
    }

    #[test]
    fn test_table_from_settings() {
        let mut settings = ScoringSettings::default();
        settings.weight_tables.insert(
            "family".to_string(),
            HashMap::from([
                ("economy".to_string(), 3.0),
                ("fuel".to_string(), 1.0),
                ("budget".to_string(), 4.0),
            ]),
        );
        settings
            .weight_tables
            .insert("spaceship".to_string(), HashMap::from([("economy".to_string(), 1.0)]));

        let table = HeuristicTable::from_settings(&settings);
        let weights = heuristic_weights(&profile(Some(Usage::Family)), &table).unwrap();

        assert_eq!(weights.get(Dimension::Economy), 0.5);
        assert_eq!(weights.get(Dimension::Budget), 0.5);
        assert_eq!(weights.get(Dimension::CategoryFit), 0.0);
        assert_eq!(
            heuristic_weights(&profile(Some(Usage::Urban)), &table).unwrap(),
            heuristic_weights(&profile(Some(Usage::Urban)), &HeuristicTable::new()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_optimizer_rejects_empty_table_entry() {
        let table = HeuristicTable::new().with_override(Some(Usage::Family), BTreeMap::new());
        let optimizer = WeightOptimizerAgent::new(cache()).with_table(table);

        let result = optimizer.optimize(&profile(Some(Usage::Family))).await;
        assert!(matches!(result, Err(ScoringError::InvalidWeights(_))));
        assert_eq!(optimizer.metrics().failures, 1);
    }
}
