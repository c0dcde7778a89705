use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::{field_value, Scorer, ScoringError};
use crate::core::tco::amortized_installment;
use crate::models::{BuyerProfile, Dimension, IncomeBand, Vehicle};

/// Down payment assumed when probing affordability
const PROBE_DOWN_PAYMENT: f64 = 0.20;

/// Credit risk tier derived from the declared income band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    /// No income declared; priced like `Medium` but scored lower
    Unknown,
}

impl RiskTier {
    pub fn from_income(income: Option<IncomeBand>) -> Self {
        match income {
            None => RiskTier::Unknown,
            Some(IncomeBand::UpTo3k) => RiskTier::High,
            Some(IncomeBand::From3kTo5k) | Some(IncomeBand::From5kTo8k) => RiskTier::Medium,
            Some(IncomeBand::From8kTo12k) | Some(IncomeBand::Above12k) => RiskTier::Low,
        }
    }

    fn base_score(&self) -> f64 {
        match self {
            RiskTier::Low => 0.85,
            RiskTier::Medium => 0.65,
            RiskTier::Unknown => 0.50,
            RiskTier::High => 0.35,
        }
    }
}

/// Credit conditions a buyer can expect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingTerms {
    pub tier: RiskTier,
    pub min_monthly_rate: f64,
    pub max_monthly_rate: f64,
    pub max_term_months: u32,
}

impl FinancingTerms {
    pub fn for_tier(tier: RiskTier) -> Self {
        let (min_monthly_rate, max_monthly_rate, max_term_months) = match tier {
            RiskTier::Low => (0.0129, 0.0159, 72),
            RiskTier::Medium | RiskTier::Unknown => (0.0169, 0.0199, 60),
            RiskTier::High => (0.0219, 0.0279, 48),
        };
        Self {
            tier,
            min_monthly_rate,
            max_monthly_rate,
            max_term_months,
        }
    }

    pub fn mid_rate(&self) -> f64 {
        (self.min_monthly_rate + self.max_monthly_rate) / 2.0
    }
}

/// Financing risk: how comfortably the buyer can finance this vehicle
#[derive(Debug, Clone, Default)]
pub struct FinancingAgent;

impl FinancingAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn terms_for(profile: &BuyerProfile) -> FinancingTerms {
        FinancingTerms::for_tier(RiskTier::from_income(profile.income_band))
    }

    /// Score adjustment from the installment-to-income ratio
    fn affordability_adjustment(ratio: f64) -> f64 {
        if ratio <= 0.15 {
            0.15
        } else if ratio <= 0.25 {
            0.05
        } else if ratio <= 0.35 {
            -0.10
        } else {
            -0.25
        }
    }
}

impl Scorer for FinancingAgent {
    fn name(&self) -> &'static str {
        "financing"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Financing
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let terms = Self::terms_for(profile);
        let mut score = terms.tier.base_score();

        if let Some(income) = profile.income_band {
            let installment = amortized_installment(
                vehicle.price * (1.0 - PROBE_DOWN_PAYMENT),
                terms.mid_rate(),
                terms.max_term_months,
            );
            let ratio = installment / income.reference_monthly_income();
            score += Self::affordability_adjustment(ratio);
        }

        Ok(score.clamp(0.0, 1.0))
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::from([("income_band", field_value(profile.income_band.map(|b| b.as_str())))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::vehicle;
    use crate::models::Category;

    fn profile(income: Option<IncomeBand>) -> BuyerProfile {
        let mut profile = BuyerProfile::with_budget(40_000.0, 80_000.0);
        profile.income_band = income;
        profile
    }

    #[test]
    fn test_undeclared_income_is_medium_priced_unknown_tier() {
        let terms = FinancingAgent::terms_for(&profile(None));
        assert_eq!(terms.tier, RiskTier::Unknown);
        assert_eq!(
            terms,
            FinancingTerms {
                tier: RiskTier::Unknown,
                ..FinancingTerms::for_tier(RiskTier::Medium)
            }
        );
    }

    #[test]
    fn test_low_risk_scores_above_unknown_and_high() {
        let agent = FinancingAgent::new();
        let car = vehicle("a", Category::Hatch, 60_000.0, 2022, 20_000);

        let low = agent.compute_score(&car, &profile(Some(IncomeBand::Above12k))).unwrap();
        let unknown = agent.compute_score(&car, &profile(None)).unwrap();
        let high = agent.compute_score(&car, &profile(Some(IncomeBand::UpTo3k))).unwrap();

        assert!(low > unknown);
        assert!(unknown > high);
    }

    #[test]
    fn test_expensive_vehicle_hurts_affordability() {
        let agent = FinancingAgent::new();
        let buyer = profile(Some(IncomeBand::From5kTo8k));
        let cheap = vehicle("a", Category::Hatch, 40_000.0, 2022, 20_000);
        let pricey = vehicle("b", Category::Suv, 200_000.0, 2022, 20_000);

        assert!(
            agent.compute_score(&pricey, &buyer).unwrap()
                < agent.compute_score(&cheap, &buyer).unwrap()
        );
    }
}
