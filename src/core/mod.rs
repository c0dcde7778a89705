// Core algorithm exports
pub mod filters;
pub mod orchestrator;
pub mod tco;

pub use filters::{in_region, prefilter, within_budget, FilterOutcome};
pub use orchestrator::{
    budget_fit_adjustment, match_percentage, OrchestratorBuilder, ScoringOrchestrator,
};
pub use tco::{amortized_installment, mileage_multiplier, CostOfOwnershipCalculator};
