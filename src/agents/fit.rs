use std::collections::BTreeMap;

use crate::agents::{Scorer, ScoringError};
use crate::models::{BuyerProfile, Category, Dimension, Usage, Vehicle};

/// Fit used when the buyer didn't state a primary usage
const NEUTRAL_CATEGORY_FIT: f64 = 0.6;

/// Fit multiplier when the family doesn't fit in the vehicle
const CAPACITY_PENALTY: f64 = 0.4;

/// How well a body style serves a primary usage
pub fn category_fit(usage: Usage, category: Category) -> f64 {
    use Category::*;

    match usage {
        Usage::Family => match category {
            Suv | Minivan => 1.0,
            Van => 0.85,
            Sedan => 0.75,
            Pickup => 0.65,
            Hatch => 0.55,
            Compact => 0.35,
            Coupe => 0.15,
        },
        Usage::Commercial => match category {
            Van | Pickup => 1.0,
            Minivan => 0.70,
            Suv => 0.55,
            Hatch => 0.50,
            Sedan => 0.45,
            Compact => 0.40,
            Coupe => 0.10,
        },
        Usage::Urban => match category {
            Compact | Hatch => 1.0,
            Sedan => 0.75,
            Suv | Coupe => 0.60,
            Minivan => 0.40,
            Pickup | Van => 0.30,
        },
        Usage::Leisure => match category {
            Suv => 1.0,
            Pickup => 0.90,
            Coupe => 0.85,
            Sedan => 0.70,
            Hatch | Minivan => 0.60,
            Compact | Van => 0.50,
        },
        Usage::FirstCar => match category {
            Hatch => 1.0,
            Compact => 0.95,
            Sedan => 0.75,
            Suv => 0.60,
            Coupe => 0.50,
            Pickup | Minivan => 0.40,
            Van => 0.30,
        },
        Usage::RideHailing => match category {
            Sedan => 1.0,
            Hatch => 0.80,
            Suv => 0.75,
            Minivan => 0.70,
            Compact => 0.55,
            Van => 0.50,
            Pickup => 0.30,
            Coupe => 0.10,
        },
    }
}

/// Body style against primary usage and household size
#[derive(Debug, Clone, Default)]
pub struct CategoryFitAgent;

impl Scorer for CategoryFitAgent {
    fn name(&self) -> &'static str {
        "category_fit"
    }

    fn dimension(&self) -> Dimension {
        Dimension::CategoryFit
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let fit = match profile.primary_usage {
            Some(usage) => category_fit(usage, vehicle.category),
            None => NEUTRAL_CATEGORY_FIT,
        };

        if profile.family_size > vehicle.category.seating_capacity() {
            return Ok(fit * CAPACITY_PENALTY);
        }
        Ok(fit)
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("usage", profile.usage_label().to_string()),
            ("family_size", profile.family_size.to_string()),
        ])
    }
}

/// Listing baseline scores weighted by the buyer's stated priorities
#[derive(Debug, Clone, Default)]
pub struct PriorityAgent;

impl Scorer for PriorityAgent {
    fn name(&self) -> &'static str {
        "priorities"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Priorities
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let p = &profile.priorities;
        let s = &vehicle.scores;

        let pairs = [
            (p.economy, s.economy),
            (p.space, s.space),
            (p.performance, s.performance),
            (p.comfort, s.comfort),
            (p.safety, s.safety),
        ];

        let total_weight: f64 = pairs.iter().map(|(w, _)| *w as f64).sum();
        if total_weight <= 0.0 {
            return Err(ScoringError::MissingProfileData("no stated priorities".into()));
        }

        Ok(pairs.iter().map(|(w, score)| *w as f64 * score).sum::<f64>() / total_weight)
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        let p = &profile.priorities;
        BTreeMap::from([
            ("priority_economy", p.economy.to_string()),
            ("priority_space", p.space.to_string()),
            ("priority_performance", p.performance.to_string()),
            ("priority_comfort", p.comfort.to_string()),
            ("priority_safety", p.safety.to_string()),
        ])
    }
}

/// Price against the budget range
#[derive(Debug, Clone, Default)]
pub struct BudgetAgent;

impl BudgetAgent {
    /// Share above `budget_max` at which the score reaches zero
    const OVERSHOOT_LIMIT: f64 = 0.30;
}

impl Scorer for BudgetAgent {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Budget
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let (min, max) = (profile.budget_min, profile.budget_max);
        if !(max.is_finite() && max > 0.0) {
            return Err(ScoringError::MissingProfileData("budget_max".into()));
        }

        let price = vehicle.price;
        let score = if price > max {
            1.0 - ((price - max) / (max * Self::OVERSHOOT_LIMIT)).min(1.0)
        } else if price < min && min > 0.0 {
            // Cheaper than the buyer planned is fine, just less on target
            0.85 + 0.15 * (price / min).max(0.0)
        } else {
            1.0
        };
        Ok(score)
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("budget_min", format!("{:.0}", profile.budget_min)),
            ("budget_max", format!("{:.0}", profile.budget_max)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::vehicle;

    #[test]
    fn test_family_prefers_suv_over_compact() {
        let agent = CategoryFitAgent;
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.primary_usage = Some(Usage::Family);
        profile.family_size = 4;

        let suv = vehicle("suv", Category::Suv, 75_000.0, 2022, 20_000);
        let compact = vehicle("compact", Category::Compact, 55_000.0, 2022, 20_000);

        assert!(
            agent.compute_score(&suv, &profile).unwrap()
                > agent.compute_score(&compact, &profile).unwrap()
        );
    }

    #[test]
    fn test_large_family_penalizes_small_vehicle() {
        let agent = CategoryFitAgent;
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.primary_usage = Some(Usage::Urban);
        let compact = vehicle("compact", Category::Compact, 55_000.0, 2022, 20_000);

        let small_household = agent.compute_score(&compact, &profile).unwrap();
        profile.family_size = 6;
        let large_household = agent.compute_score(&compact, &profile).unwrap();

        assert_eq!(small_household, 1.0);
        assert!((large_household - CAPACITY_PENALTY).abs() < 1e-12);
    }

    #[test]
    fn test_priorities_weight_baseline_scores() {
        let agent = PriorityAgent;
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.priorities.safety = 5;
        profile.priorities.space = 5;
        profile.priorities.performance = 1;

        let mut safe = vehicle("a", Category::Suv, 70_000.0, 2022, 20_000);
        safe.scores.safety = 0.9;
        safe.scores.space = 0.9;
        safe.scores.performance = 0.2;
        let mut fast = vehicle("b", Category::Coupe, 70_000.0, 2022, 20_000);
        fast.scores.safety = 0.4;
        fast.scores.space = 0.2;
        fast.scores.performance = 1.0;

        assert!(
            agent.compute_score(&safe, &profile).unwrap()
                > agent.compute_score(&fast, &profile).unwrap()
        );
    }

    #[test]
    fn test_zero_priorities_is_missing_data() {
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.priorities = crate::models::Priorities {
            economy: 0,
            space: 0,
            performance: 0,
            comfort: 0,
            safety: 0,
        };
        let car = vehicle("a", Category::Suv, 70_000.0, 2022, 20_000);

        assert!(matches!(
            PriorityAgent.compute_score(&car, &profile),
            Err(ScoringError::MissingProfileData(_))
        ));
    }

    #[test]
    fn test_budget_score_curve() {
        let agent = BudgetAgent;
        let profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        let score = |price: f64| {
            agent
                .compute_score(&vehicle("a", Category::Sedan, price, 2022, 0), &profile)
                .unwrap()
        };

        assert_eq!(score(65_000.0), 1.0);
        assert_eq!(score(80_000.0), 1.0);
        assert!(score(92_000.0) < 1.0 && score(92_000.0) > 0.0);
        assert_eq!(score(120_000.0), 0.0);
        assert!(score(25_000.0) < 1.0 && score(25_000.0) >= 0.85);
    }
}
