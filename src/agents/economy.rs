use std::collections::BTreeMap;

use crate::agents::{field_value, Scorer, ScoringError};
use crate::models::{BuyerProfile, Dimension, FuelType, Vehicle};

/// Efficiency (km/l) that scores zero
const MIN_EFFICIENCY: f64 = 6.0;
/// Efficiency (km/l) that scores one
const MAX_EFFICIENCY: f64 = 18.0;

/// Monthly distance above which measured efficiency dominates the score
const HIGH_DISTANCE_KM: f64 = 2_000.0;

/// Fuel economy for the buyer's driving profile
#[derive(Debug, Clone, Default)]
pub struct EconomyAgent;

impl EconomyAgent {
    pub fn new() -> Self {
        Self
    }

    /// Efficiency normalised to 0.0 - 1.0
    pub fn efficiency_score(vehicle: &Vehicle) -> f64 {
        if vehicle.fuel_type == FuelType::Electric {
            return 1.0;
        }
        let efficiency = vehicle.effective_fuel_efficiency();
        ((efficiency - MIN_EFFICIENCY) / (MAX_EFFICIENCY - MIN_EFFICIENCY)).clamp(0.0, 1.0)
    }

    fn fuel_type_bonus(fuel_type: FuelType) -> f64 {
        match fuel_type {
            FuelType::Hybrid => 0.10,
            FuelType::Flex => 0.03,
            FuelType::Diesel => 0.02,
            FuelType::Gasoline | FuelType::Electric => 0.0,
        }
    }

    /// Weight of measured efficiency against the listing's baseline economy
    fn efficiency_weight(profile: &BuyerProfile) -> f64 {
        let heavy_usage = profile.primary_usage.map(|u| u.is_high_distance()).unwrap_or(false)
            || profile.monthly_distance_km.map(|d| d > HIGH_DISTANCE_KM).unwrap_or(false);

        if heavy_usage { 0.75 } else { 0.55 }
    }
}

impl Scorer for EconomyAgent {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Economy
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let weight = Self::efficiency_weight(profile);
        let blended =
            weight * Self::efficiency_score(vehicle) + (1.0 - weight) * vehicle.scores.economy;

        Ok((blended + Self::fuel_type_bonus(vehicle.fuel_type)).min(1.0))
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("usage", profile.usage_label().to_string()),
            ("monthly_distance_km", field_value(profile.monthly_distance_km.map(|d| d.round()))),
        ])
    }
}
