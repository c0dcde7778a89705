use chrono::Datelike;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::weights::HeuristicTable;
use crate::agents::{
    BudgetAgent, CachedAgent, CategoryFitAgent, EconomyAgent, FinancingAgent, MaintenanceAgent,
    MetricsSnapshot, PriorityAgent, ResaleAgent, Scorer, WeightOptimizerAgent,
};
use crate::config::{Settings, TcoSettings};
use crate::core::filters::prefilter;
use crate::core::tco::CostOfOwnershipCalculator;
use crate::models::{
    AgentScore, BuyerProfile, Dimension, RankedResult, Ranking, ScoreBreakdown, ScoreMetadata,
    ScoreResult, Vehicle, WeightSource, WeightVector,
};
use crate::services::{CacheService, SemanticAnalyzer};

/// Scores at or above this count as a strength worth explaining
const STRONG_SCORE: f64 = 0.6;

/// Contributions listed per result
const MAX_JUSTIFICATIONS: usize = 3;

/// Weights resolved once per scoring call
#[derive(Debug, Clone)]
struct ResolvedWeights {
    weights: WeightVector,
    source: WeightSource,
    fallback: bool,
}

/// Composition root for scoring: one cached agent per dimension, the weight
/// optimizer and the cost calculator.
///
/// # Pipeline
/// 1. Pre-filter by budget and region
/// 2. Resolve the weight vector once per call
/// 3. Score every candidate concurrently, agents concurrently per candidate
/// 4. Sort and truncate
pub struct ScoringOrchestrator {
    agents: Vec<CachedAgent>,
    weight_optimizer: WeightOptimizerAgent,
    calculator: Option<CostOfOwnershipCalculator>,
    budget_fit_bonus: f64,
    budget_tolerance: f64,
}

impl ScoringOrchestrator {
    pub fn builder(cache: Arc<CacheService>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cache)
    }

    /// Builder preloaded from the `scoring` and `tco` settings
    pub fn builder_from_settings(
        cache: Arc<CacheService>,
        settings: &Settings,
    ) -> OrchestratorBuilder {
        let scoring = &settings.scoring;
        let mut builder = OrchestratorBuilder::new(cache)
            .with_heuristic_table(HeuristicTable::from_settings(scoring))
            .with_tco_settings(settings.tco.clone())
            .budget_fit_bonus(scoring.budget_fit_bonus)
            .budget_tolerance(scoring.budget_tolerance)
            .fallback_score(scoring.fallback_score);

        if let Some(year) = scoring.reference_year {
            builder = builder.reference_year(year);
        }
        builder
    }

    /// Score one vehicle for one profile. Never fails: agent and weight
    /// failures are replaced by fallbacks and flagged in the metadata.
    pub async fn score(&self, vehicle: &Vehicle, profile: &BuyerProfile) -> ScoreResult {
        let resolved = self.resolve_weights(profile).await;
        self.score_with(vehicle, profile, &resolved).await
    }

    /// Rank a catalog for a profile.
    ///
    /// An empty catalog or a pre-filter that removes everything yields an
    /// empty ranking carrying the reason. Vehicles over the spending ceiling
    /// stay in the ranking with `fits_budget = Some(false)`.
    pub async fn rank(
        &self,
        vehicles: &[Vehicle],
        profile: &BuyerProfile,
        limit: usize,
    ) -> Ranking {
        let total_candidates = vehicles.len();
        let outcome = prefilter(vehicles, profile, self.budget_tolerance);
        let resolved = self.resolve_weights(profile).await;

        if let Some(reason) = outcome.reason {
            tracing::info!(
                "No vehicles to rank for profile {} ({:?}): {} of {} filtered out",
                profile.id,
                reason,
                outcome.filtered_out,
                total_candidates
            );
            return Ranking {
                results: Vec::new(),
                total_candidates,
                filtered_out: outcome.filtered_out,
                reason: Some(reason),
                weights_used: resolved.weights,
                weight_source: resolved.source,
            };
        }

        tracing::debug!(
            "Scoring {} candidates for profile {} ({} filtered out)",
            outcome.candidates.len(),
            profile.id,
            outcome.filtered_out
        );

        let scored = join_all(outcome.candidates.iter().map(|vehicle| {
            let resolved = &resolved;
            async move { (*vehicle, self.score_with(vehicle, profile, resolved).await) }
        }))
        .await;

        let mut results: Vec<RankedResult> = scored
            .into_iter()
            .map(|(vehicle, score)| ranked_result(vehicle, score))
            .collect();

        // Score (descending), then price (ascending), then year (descending)
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.vehicle
                        .price
                        .partial_cmp(&b.vehicle.price)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| b.vehicle.year.cmp(&a.vehicle.year))
        });
        results.truncate(limit);

        tracing::info!(
            "Ranked {} of {} vehicles for profile {} (weights: {:?})",
            results.len(),
            total_candidates,
            profile.id,
            resolved.source
        );

        Ranking {
            results,
            total_candidates,
            filtered_out: outcome.filtered_out,
            reason: None,
            weights_used: resolved.weights,
            weight_source: resolved.source,
        }
    }

    /// Per-agent metrics keyed by agent name, weight optimizer included
    pub fn metrics_snapshot(&self) -> BTreeMap<String, MetricsSnapshot> {
        let mut snapshot: BTreeMap<String, MetricsSnapshot> = self
            .agents
            .iter()
            .map(|agent| (agent.name().to_string(), agent.metrics()))
            .collect();
        snapshot.insert(self.weight_optimizer.name().to_string(), self.weight_optimizer.metrics());
        snapshot
    }

    pub fn reset_metrics(&self) {
        for agent in &self.agents {
            agent.reset_metrics();
        }
        self.weight_optimizer.reset_metrics();
    }

    pub fn agent_names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn calculator(&self) -> Option<&CostOfOwnershipCalculator> {
        self.calculator.as_ref()
    }

    async fn resolve_weights(&self, profile: &BuyerProfile) -> ResolvedWeights {
        match self.weight_optimizer.optimize(profile).await {
            Ok(outcome) => ResolvedWeights {
                weights: outcome.weights,
                source: outcome.source,
                fallback: false,
            },
            Err(e) => {
                tracing::warn!(
                    "Weight optimizer failed for profile {}, using default weights: {}",
                    profile.id,
                    e
                );
                ResolvedWeights {
                    weights: WeightVector::balanced(),
                    source: WeightSource::Default,
                    fallback: true,
                }
            }
        }
    }

    async fn score_with(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
        resolved: &ResolvedWeights,
    ) -> ScoreResult {
        let agent_scores: Vec<AgentScore> =
            join_all(
                self.agents
                    .iter()
                    .map(|agent| agent.compute_score_cached(vehicle, profile)),
            )
            .await;

        let weighted: f64 = agent_scores
            .iter()
            .map(|s| s.value * resolved.weights.get(s.dimension))
            .sum();

        let cost = self
            .calculator
            .as_ref()
            .map(|calculator| calculator.compute_for_vehicle(vehicle, profile));

        let (adjustment, fits_budget) = match (&cost, profile.spending_ceiling) {
            (Some(cost), Some(ceiling)) if ceiling.is_finite() && ceiling >= 0.0 => {
                let (adjustment, fits) =
                    budget_fit_adjustment(cost.total, ceiling, self.budget_fit_bonus);
                (adjustment, Some(fits))
            }
            _ => (0.0, None),
        };

        let final_score = (weighted + adjustment).clamp(0.0, 1.0);

        let mut agents_used = vec![self.weight_optimizer.name().to_string()];
        agents_used.extend(agent_scores.iter().map(|s| s.agent.clone()));
        let any_fallback_used =
            resolved.fallback || agent_scores.iter().any(AgentScore::is_fallback);

        tracing::debug!(
            "Scored {} ({}) at {:.4} (fallback: {}, fits budget: {:?})",
            vehicle.display_name(),
            vehicle.id,
            final_score,
            any_fallback_used,
            fits_budget
        );

        ScoreResult {
            final_score,
            breakdown: ScoreBreakdown {
                agent_scores,
                weights_used: resolved.weights.clone(),
            },
            metadata: ScoreMetadata {
                agents_used,
                any_fallback_used,
                weight_source: resolved.source,
            },
            cost,
            fits_budget,
        }
    }
}

/// Bounded adjustment for the monthly cost against the spending ceiling:
/// `+bonus` when it fits, down to `-bonus` as the overshoot reaches 100%.
pub fn budget_fit_adjustment(monthly_total: f64, ceiling: f64, bonus: f64) -> (f64, bool) {
    let bonus = if bonus.is_finite() { bonus.abs() } else { 0.0 };
    if monthly_total <= ceiling {
        return (bonus, true);
    }

    let overshoot = if ceiling > 0.0 { (monthly_total - ceiling) / ceiling } else { 1.0 };
    (-bonus * overshoot.min(1.0), false)
}

/// Score as a percentage with one decimal
pub fn match_percentage(score: f64) -> f64 {
    (score * 1000.0).round() / 10.0
}

fn ranked_result(vehicle: &Vehicle, score: ScoreResult) -> RankedResult {
    let justifications = justifications(&score);
    RankedResult {
        vehicle: vehicle.clone(),
        score: score.final_score,
        match_percentage: match_percentage(score.final_score),
        cost: score.cost,
        fits_budget: score.fits_budget,
        justifications,
        breakdown: score.breakdown,
        metadata: score.metadata,
    }
}

fn strength_label(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::CategoryFit => "Body style suits the intended use",
        Dimension::Priorities => "Matches the stated priorities",
        Dimension::Budget => "Priced within the budget",
        Dimension::Economy => "Good fuel economy",
        Dimension::Maintenance => "Low expected maintenance",
        Dimension::Resale => "Holds its resale value",
        Dimension::Financing => "Comfortable to finance",
    }
}

/// Human-readable reasons for a score: the strongest weighted contributions,
/// the budget fit, and a note when part of the score was estimated
fn justifications(score: &ScoreResult) -> Vec<String> {
    let weights = &score.breakdown.weights_used;

    let mut strengths: Vec<(&AgentScore, f64)> = score
        .breakdown
        .agent_scores
        .iter()
        .filter(|s| !s.is_fallback() && s.value >= STRONG_SCORE)
        .map(|s| (s, s.value * weights.get(s.dimension)))
        .filter(|(_, contribution)| *contribution > 0.0)
        .collect();
    strengths.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut lines: Vec<String> = strengths
        .into_iter()
        .take(MAX_JUSTIFICATIONS)
        .map(|(s, _)| format!("{} ({:.0}%)", strength_label(s.dimension), s.value * 100.0))
        .collect();

    match (score.fits_budget, &score.cost) {
        (Some(true), Some(cost)) => lines.push(format!(
            "Monthly cost of {:.2} fits the spending ceiling",
            cost.total
        )),
        (Some(false), Some(cost)) => {
            lines.push(format!("Monthly cost of {:.2} exceeds the spending ceiling", cost.total))
        }
        _ => {}
    }

    if score.metadata.any_fallback_used {
        lines.push("Some criteria were estimated from partial data".to_string());
    }

    lines
}

/// Builds a [`ScoringOrchestrator`]. Agents not replaced through
/// [`OrchestratorBuilder::with_scorer`] use the built-in implementation.
pub struct OrchestratorBuilder {
    cache: Arc<CacheService>,
    reference_year: Option<i32>,
    scorers: Vec<Arc<dyn Scorer>>,
    analyzer: Option<(Arc<dyn SemanticAnalyzer>, Duration)>,
    table: HeuristicTable,
    tco: Option<TcoSettings>,
    with_cost: bool,
    fallback_score: Option<f64>,
    budget_fit_bonus: f64,
    budget_tolerance: f64,
}

impl OrchestratorBuilder {
    fn new(cache: Arc<CacheService>) -> Self {
        Self {
            cache,
            reference_year: None,
            scorers: Vec::new(),
            analyzer: None,
            table: HeuristicTable::new(),
            tco: None,
            with_cost: true,
            fallback_score: None,
            budget_fit_bonus: 0.05,
            budget_tolerance: 0.10,
        }
    }

    /// Year vehicle ages are measured against; the current year otherwise
    pub fn reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Replace the agent for the scorer's dimension
    pub fn with_scorer<S>(mut self, scorer: S) -> Self
    where
        S: Scorer + 'static,
    {
        let scorer: Arc<dyn Scorer> = Arc::new(scorer);
        self.scorers.retain(|s| s.dimension() != scorer.dimension());
        self.scorers.push(scorer);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SemanticAnalyzer>, timeout: Duration) -> Self {
        self.analyzer = Some((analyzer, timeout));
        self
    }

    pub fn with_heuristic_table(mut self, table: HeuristicTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_tco_settings(mut self, settings: TcoSettings) -> Self {
        self.tco = Some(settings);
        self
    }

    /// Skip cost of ownership; results carry no cost and no budget fit
    pub fn without_cost(mut self) -> Self {
        self.with_cost = false;
        self
    }

    pub fn fallback_score(mut self, fallback: f64) -> Self {
        self.fallback_score = Some(fallback);
        self
    }

    pub fn budget_fit_bonus(mut self, bonus: f64) -> Self {
        self.budget_fit_bonus = bonus;
        self
    }

    pub fn budget_tolerance(mut self, tolerance: f64) -> Self {
        self.budget_tolerance = tolerance;
        self
    }

    pub fn build(self) -> ScoringOrchestrator {
        let year = self.reference_year.unwrap_or_else(|| chrono::Utc::now().year());

        let builtin: Vec<Arc<dyn Scorer>> = vec![
            Arc::new(CategoryFitAgent),
            Arc::new(PriorityAgent),
            Arc::new(BudgetAgent),
            Arc::new(EconomyAgent::new()),
            Arc::new(MaintenanceAgent::new(year)),
            Arc::new(ResaleAgent::new(year)),
            Arc::new(FinancingAgent::new()),
        ];

        let mut scorers: Vec<Arc<dyn Scorer>> = builtin
            .into_iter()
            .map(|default| {
                self.scorers
                    .iter()
                    .find(|s| s.dimension() == default.dimension())
                    .cloned()
                    .unwrap_or(default)
            })
            .collect();
        scorers.sort_by_key(|s| s.dimension());

        let agents = scorers
            .into_iter()
            .map(|scorer| {
                let agent = CachedAgent::from_arc(scorer, self.cache.clone());
                match self.fallback_score {
                    Some(fallback) => agent.with_fallback(fallback),
                    None => agent,
                }
            })
            .collect();

        let mut weight_optimizer =
            WeightOptimizerAgent::new(self.cache.clone()).with_table(self.table);
        if let Some((analyzer, timeout)) = self.analyzer {
            weight_optimizer = weight_optimizer.with_analyzer(analyzer, timeout);
        }

        let calculator = self.with_cost.then(|| match &self.tco {
            Some(settings) => CostOfOwnershipCalculator::from_settings(settings, year),
            None => CostOfOwnershipCalculator::new(year),
        });

        tracing::info!(
            "Scoring orchestrator ready (reference year {}, cost of ownership: {})",
            year,
            calculator.is_some()
        );

        ScoringOrchestrator {
            agents,
            weight_optimizer,
            calculator,
            budget_fit_bonus: self.budget_fit_bonus,
            budget_tolerance: self.budget_tolerance,
        }
    }
}
