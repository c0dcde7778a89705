use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::cost::CostBreakdown;
use crate::models::domain::Vehicle;

/// Tolerance for the "weights sum to one" invariant
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

/// Weight categories a final score is blended from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CategoryFit,
    Priorities,
    Budget,
    Economy,
    Maintenance,
    Resale,
    Financing,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::CategoryFit,
        Dimension::Priorities,
        Dimension::Budget,
        Dimension::Economy,
        Dimension::Maintenance,
        Dimension::Resale,
        Dimension::Financing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::CategoryFit => "category_fit",
            Dimension::Priorities => "priorities",
            Dimension::Budget => "budget",
            Dimension::Economy => "economy",
            Dimension::Maintenance => "maintenance",
            Dimension::Resale => "resale",
            Dimension::Financing => "financing",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an agent score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Computed,
    Cache,
    Fallback,
}

/// One agent's bounded score for one dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentScore {
    pub dimension: Dimension,
    pub agent: String,
    pub value: f64,
    pub source: ScoreSource,
    pub latency_ms: f64,
}

impl AgentScore {
    pub fn is_fallback(&self) -> bool {
        self.source == ScoreSource::Fallback
    }
}

/// Named contribution weights. Sums to 1.0 (within [`WEIGHT_SUM_TOLERANCE`])
/// whenever built through [`WeightVector::normalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<Dimension, f64>);

impl WeightVector {
    /// Build a vector from raw weights and renormalize it to sum to 1.0.
    ///
    /// Negative and non-finite weights count as zero. Returns `None` when
    /// nothing positive is left to normalize.
    pub fn normalized<I>(weights: I) -> Option<Self>
    where
        I: IntoIterator<Item = (Dimension, f64)>,
    {
        let mut raw: BTreeMap<Dimension, f64> = Dimension::ALL.iter().map(|d| (*d, 0.0)).collect();
        for (dimension, weight) in weights {
            let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
            raw.insert(dimension, weight);
        }

        let total: f64 = raw.values().sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }

        Some(Self(raw.into_iter().map(|(d, w)| (d, w / total)).collect()))
    }

    /// Equal weights over every dimension. The process-wide fallback.
    pub fn balanced() -> Self {
        let share = 1.0 / Dimension::ALL.len() as f64;
        Self(Dimension::ALL.iter().map(|d| (*d, share)).collect())
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.0.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// True when every weight is finite, non-negative, and the total is ~1.0
    pub fn is_valid(&self) -> bool {
        self.0.values().all(|w| w.is_finite() && *w >= 0.0)
            && (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.0.iter().map(|(d, w)| (*d, *w))
    }

    /// Largest single weight
    pub fn max_weight(&self) -> f64 {
        self.0.values().copied().fold(0.0, f64::max)
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::balanced()
    }
}

/// How the weights for a score were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightSource {
    Heuristic,
    Semantic,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub agent_scores: Vec<AgentScore>,
    pub weights_used: WeightVector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMetadata {
    pub agents_used: Vec<String>,
    pub any_fallback_used: bool,
    pub weight_source: WeightSource,
}

/// Result of scoring one (vehicle, profile) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub final_score: f64,
    pub breakdown: ScoreBreakdown,
    pub metadata: ScoreMetadata,
    pub cost: Option<CostBreakdown>,
    pub fits_budget: Option<bool>,
}

impl ScoreResult {
    pub fn agent_score(&self, dimension: Dimension) -> Option<&AgentScore> {
        self.breakdown
            .agent_scores
            .iter()
            .find(|s| s.dimension == dimension)
    }
}

/// A vehicle placed in a ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub vehicle: Vehicle,
    pub score: f64,
    pub match_percentage: f64,
    pub cost: Option<CostBreakdown>,
    pub fits_budget: Option<bool>,
    pub justifications: Vec<String>,
    pub breakdown: ScoreBreakdown,
    pub metadata: ScoreMetadata,
}

/// Why a ranking came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    EmptyCatalog,
    BudgetTooNarrow,
    NoRegionalInventory,
}

impl NoMatchReason {
    pub fn message(&self) -> &'static str {
        match self {
            NoMatchReason::EmptyCatalog => "The catalog has no vehicles to rank",
            NoMatchReason::BudgetTooNarrow => {
                "No vehicle is priced inside the requested budget range"
            }
            NoMatchReason::NoRegionalInventory => {
                "No dealership in the requested region has a matching vehicle"
            }
        }
    }
}

/// Ranked catalog for one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    pub results: Vec<RankedResult>,
    pub total_candidates: usize,
    pub filtered_out: usize,
    pub reason: Option<NoMatchReason>,
    pub weights_used: WeightVector,
    pub weight_source: WeightSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_weights_sum_to_one() {
        let weights = WeightVector::balanced();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(weights.is_valid());
    }

    #[test]
    fn test_normalized_drops_negative_and_nan() {
        let weights = WeightVector::normalized([
            (Dimension::Economy, 2.0),
            (Dimension::Resale, -1.0),
            (Dimension::Budget, f64::NAN),
            (Dimension::Financing, 2.0),
        ])
        .unwrap();

        assert!(weights.is_valid());
        assert_eq!(weights.get(Dimension::Economy), 0.5);
        assert_eq!(weights.get(Dimension::Resale), 0.0);
        assert_eq!(weights.get(Dimension::Budget), 0.0);
    }

    #[test]
    fn test_normalized_rejects_all_zero() {
        assert!(WeightVector::normalized([(Dimension::Economy, 0.0)]).is_none());
    }

    #[test]
    fn test_weight_vector_serializes_as_map() {
        let json = serde_json::to_value(WeightVector::balanced()).unwrap();
        assert!(json.get("category_fit").is_some());
        assert_eq!(json.as_object().unwrap().len(), Dimension::ALL.len());
    }
}
