use crate::agents::{Scorer, ScoringError};
use crate::models::{BuyerProfile, Category, Dimension, Vehicle};

/// (age in years, fraction of value lost)
const DEPRECIATION_CURVE: [(f64, f64); 9] = [
    (0.0, 0.00),
    (1.0, 0.15),
    (2.0, 0.25),
    (3.0, 0.33),
    (5.0, 0.45),
    (7.0, 0.55),
    (10.0, 0.65),
    (15.0, 0.75),
    (20.0, 0.80),
];

/// Odometer reading at which the mileage penalty stops growing
pub const MILEAGE_PENALTY_CAP_KM: f64 = 150_000.0;

/// Largest mileage penalty
pub const MAX_MILEAGE_PENALTY: f64 = 0.35;

/// Share of value lost to age, linearly interpolated over the
/// depreciation curve and flat past its last anchor.
///
/// Monotonically non-decreasing in `age`.
pub fn age_depreciation(age: f64) -> f64 {
    if !age.is_finite() || age <= 0.0 {
        return 0.0;
    }

    for window in DEPRECIATION_CURVE.windows(2) {
        let (age0, dep0) = window[0];
        let (age1, dep1) = window[1];
        if age <= age1 {
            let t = (age - age0) / (age1 - age0);
            return dep0 + t * (dep1 - dep0);
        }
    }

    DEPRECIATION_CURVE[DEPRECIATION_CURVE.len() - 1].1
}

/// Penalty rising linearly from 0 and capped at [`MILEAGE_PENALTY_CAP_KM`]
pub fn mileage_penalty(mileage: u32) -> f64 {
    (mileage as f64 / MILEAGE_PENALTY_CAP_KM).min(1.0) * MAX_MILEAGE_PENALTY
}

/// How well a brand holds its value on the used market
pub fn brand_retention(brand: &str) -> f64 {
    match brand.trim().to_ascii_lowercase().as_str() {
        "toyota" => 0.95,
        "honda" => 0.93,
        "jeep" | "hyundai" => 0.86,
        "volkswagen" | "vw" => 0.85,
        "chevrolet" | "gm" => 0.83,
        "nissan" | "kia" => 0.81,
        "fiat" | "ford" => 0.78,
        "mercedes-benz" | "mercedes" | "bmw" | "audi" => 0.76,
        "renault" | "peugeot" | "citroen" | "citroën" => 0.74,
        _ => 0.80,
    }
}

/// Used-market demand by body style
pub fn category_demand(category: Category) -> f64 {
    match category {
        Category::Suv => 1.00,
        Category::Pickup => 0.98,
        Category::Hatch => 0.92,
        Category::Compact => 0.90,
        Category::Sedan => 0.88,
        Category::Minivan => 0.82,
        Category::Van => 0.80,
        Category::Coupe => 0.78,
    }
}

/// Resale strength of a vehicle. Independent of the buyer profile.
#[derive(Debug, Clone)]
pub struct ResaleAgent {
    reference_year: i32,
}

impl ResaleAgent {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }
}

impl Scorer for ResaleAgent {
    fn name(&self) -> &'static str {
        "resale"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Resale
    }

    fn compute_score(
        &self,
        vehicle: &Vehicle,
        _profile: &BuyerProfile,
    ) -> Result<f64, ScoringError> {
        let age = vehicle.age(self.reference_year) as f64;

        Ok(brand_retention(&vehicle.brand)
            * (1.0 - age_depreciation(age))
            * category_demand(vehicle.category)
            * (1.0 - mileage_penalty(vehicle.mileage)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::vehicle;

    #[test]
    fn test_depreciation_anchor_points() {
        assert_eq!(age_depreciation(0.0), 0.0);
        assert!((age_depreciation(1.0) - 0.15).abs() < 1e-12);
        assert!((age_depreciation(4.0) - 0.39).abs() < 1e-12);
        assert!((age_depreciation(20.0) - 0.80).abs() < 1e-12);
        assert_eq!(age_depreciation(45.0), 0.80);
    }

    #[test]
    fn test_depreciation_is_monotonic() {
        let mut previous = age_depreciation(0.0);
        for step in 1..=300 {
            let current = age_depreciation(step as f64 * 0.1);
            assert!(current >= previous, "depreciation decreased at age {}", step as f64 * 0.1);
            previous = current;
        }
    }

    #[test]
    fn test_mileage_penalty_is_capped() {
        assert_eq!(mileage_penalty(0), 0.0);
        assert!(mileage_penalty(75_000) > 0.0);
        assert_eq!(mileage_penalty(150_000), MAX_MILEAGE_PENALTY);
        assert_eq!(mileage_penalty(400_000), MAX_MILEAGE_PENALTY);
    }

    #[test]
    fn test_higher_mileage_scores_lower() {
        let agent = ResaleAgent::new(2025);
        let profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        let low = vehicle("low", Category::Sedan, 70_000.0, 2021, 10_000);
        let high = vehicle("high", Category::Sedan, 70_000.0, 2021, 160_000);

        let low_score = agent.compute_score(&low, &profile).unwrap();
        let high_score = agent.compute_score(&high, &profile).unwrap();

        assert!(high_score < low_score);
        assert!((0.0..=1.0).contains(&high_score));
    }

    #[test]
    fn test_brand_lookup_is_case_insensitive() {
        assert_eq!(brand_retention("TOYOTA"), brand_retention("toyota"));
        assert_eq!(brand_retention("Unknown Motors"), 0.80);
    }
}
