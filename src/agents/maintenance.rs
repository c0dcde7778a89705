use std::collections::BTreeMap;

use crate::agents::{Scorer, ScoringError};
use crate::core::tco::mileage_multiplier;
use crate::models::{BuyerProfile, Dimension, Transmission, Usage, Vehicle};

/// Burden contributed per year of age, up to [`MAX_AGE_BURDEN`]
const AGE_BURDEN_PER_YEAR: f64 = 0.03;
const MAX_AGE_BURDEN: f64 = 0.30;

/// Maintenance cost tier of a brand, as a burden in 0.0 - 1.0
pub fn brand_cost_burden(brand: &str) -> f64 {
    match brand.trim().to_ascii_lowercase().as_str() {
        "toyota" | "honda" | "hyundai" | "chevrolet" | "gm" | "fiat" | "volkswagen" | "vw"
        | "renault" | "nissan" | "kia" => 0.10,
        "bmw" | "mercedes-benz" | "mercedes" | "audi" | "land rover" | "volvo" | "porsche"
        | "mini" => 0.45,
        _ => 0.25,
    }
}

fn transmission_burden(transmission: Transmission) -> f64 {
    match transmission {
        Transmission::Manual => 0.0,
        Transmission::Automatic => 0.03,
        Transmission::Cvt => 0.05,
    }
}

/// Expected maintenance burden; a higher score means a lighter burden
#[derive(Debug, Clone)]
pub struct MaintenanceAgent {
    reference_year: i32,
}

impl MaintenanceAgent {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    /// Burden in 0.0 - 1.0 before inversion
    pub fn burden(&self, vehicle: &Vehicle, profile: &BuyerProfile) -> f64 {
        let age = vehicle.age(self.reference_year) as f64;
        let age_burden = (age * AGE_BURDEN_PER_YEAR).min(MAX_AGE_BURDEN);
        // 1.0x -> 0.0, 1.5x -> 0.10, 2.0x -> 0.20
        let mileage_burden = (mileage_multiplier(vehicle.mileage) - 1.0) * 0.2;

        // Commercial use wears vehicles faster
        let wear_factor = if profile.primary_usage == Some(Usage::Commercial) { 1.2 } else { 1.0 };

        let reliability_relief = (vehicle.scores.reliability - 0.5) * 0.2;

        (brand_cost_burden(&vehicle.brand)
            + (age_burden + mileage_burden) * wear_factor
            + transmission_burden(vehicle.transmission)
            - reliability_relief)
            .clamp(0.0, 1.0)
    }
}

impl Scorer for MaintenanceAgent {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Maintenance
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        Ok(1.0 - self.burden(vehicle, profile))
    }

    fn cache_fields(&self, profile: &BuyerProfile) -> BTreeMap<&'static str, String> {
        BTreeMap::from([("usage", profile.usage_label().to_string())])
    }
}
