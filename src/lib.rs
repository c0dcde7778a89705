//! CarMatch Algo - vehicle scoring and ranking engine
//!
//! Scores catalog vehicles against a buyer profile with a set of independent
//! agents, blends their scores with profile-specific weights, estimates the
//! monthly cost of ownership and ranks the catalog.

pub mod agents;
pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use agents::{CachedAgent, Scorer, ScoringError, WeightOptimizerAgent};
pub use core::{CostOfOwnershipCalculator, ScoringOrchestrator};
pub use models::{
    BuyerProfile, CostBreakdown, RankRequest, RankResponse, Ranking, ScoreResult, Vehicle,
    WeightVector,
};
pub use services::{CacheService, SemanticAnalyzer, SharedCache};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_library_exports() {
        let cache = Arc::new(CacheService::local_only(10, Duration::from_secs(1)));
        let orchestrator = ScoringOrchestrator::builder(cache).reference_year(2025).build();
        assert!(orchestrator.calculator().is_some());
        assert!(WeightVector::default().is_valid());
    }
}
