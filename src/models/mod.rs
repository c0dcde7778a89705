// Model exports
pub mod cost;
pub mod domain;
pub mod requests;
pub mod responses;
pub mod scoring;

pub use cost::{CostBreakdown, CostCents, TcoAssumptions};
pub use domain::{
    BaselineScores, BuyerProfile, Category, Dealership, FuelType, IncomeBand, Priorities,
    Transmission, Usage, Vehicle,
};
pub use requests::RankRequest;
pub use responses::{MetricsResponse, RankResponse};
pub use scoring::{
    AgentScore, Dimension, NoMatchReason, RankedResult, Ranking, ScoreBreakdown, ScoreMetadata,
    ScoreResult, ScoreSource, WeightSource, WeightVector, WEIGHT_SUM_TOLERANCE,
};
