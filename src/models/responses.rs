use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::MetricsSnapshot;
use crate::models::scoring::{NoMatchReason, RankedResult, Ranking, WeightSource, WeightVector};

/// Serialized ranking handed back to the request layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
    pub ranking_id: uuid::Uuid,
    pub results: Vec<RankedResult>,
    pub total_candidates: usize,
    pub filtered_out: usize,
    pub reason: Option<NoMatchReason>,
    pub message: Option<String>,
    pub weights_used: WeightVector,
    pub weight_source: WeightSource,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Ranking> for RankResponse {
    fn from(ranking: Ranking) -> Self {
        Self {
            ranking_id: uuid::Uuid::new_v4(),
            message: ranking.reason.map(|r| r.message().to_string()),
            results: ranking.results,
            total_candidates: ranking.total_candidates,
            filtered_out: ranking.filtered_out,
            reason: ranking.reason,
            weights_used: ranking.weights_used,
            weight_source: ranking.weight_source,
            generated_at: chrono::Utc::now(),
        }
    }
}

/// Per-agent metrics for observability collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub agents: BTreeMap<String, MetricsSnapshot>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

