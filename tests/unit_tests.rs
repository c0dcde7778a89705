// Unit tests for CarMatch Algo

use carmatch_algo::agents::resale::{age_depreciation, mileage_penalty, MAX_MILEAGE_PENALTY};
use carmatch_algo::agents::weights::{blend, heuristic_weights, HeuristicTable};
use carmatch_algo::agents::{
    BudgetAgent, CategoryFitAgent, EconomyAgent, FinancingAgent, MaintenanceAgent, PriorityAgent,
    ResaleAgent, Scorer,
};
use carmatch_algo::core::filters::prefilter;
use carmatch_algo::core::tco::{amortized_installment, mileage_multiplier};
use carmatch_algo::core::CostOfOwnershipCalculator;
use carmatch_algo::models::{
    BaselineScores, BuyerProfile, Category, Dealership, Dimension, FuelType, IncomeBand,
    TcoAssumptions, Transmission, Usage, Vehicle, WEIGHT_SUM_TOLERANCE,
};
use carmatch_algo::services::{CacheKey, LocalCache};
use std::collections::BTreeMap;
use std::time::Duration;

const CATEGORIES: [Category; 8] = [
    Category::Compact,
    Category::Hatch,
    Category::Sedan,
    Category::Suv,
    Category::Pickup,
    Category::Van,
    Category::Minivan,
    Category::Coupe,
];

fn create_vehicle(
    id: &str,
    brand: &str,
    category: Category,
    price: f64,
    year: u16,
    mileage: u32,
) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        brand: brand.to_string(),
        model: "Model".to_string(),
        year,
        price,
        mileage,
        category,
        fuel_type: FuelType::Gasoline,
        transmission: Transmission::Manual,
        scores: BaselineScores::default(),
        fuel_efficiency: None,
        dealership: Dealership {
            id: "dealer-1".to_string(),
            name: "Central Motors".to_string(),
            city: "Campinas".to_string(),
            region: "SP".to_string(),
        },
    }
}

fn create_profiles() -> Vec<BuyerProfile> {
    let mut profiles = Vec::new();
    for usage in [None, Some(Usage::Family), Some(Usage::Commercial), Some(Usage::RideHailing)] {
        for income in [None, Some(IncomeBand::UpTo3k), Some(IncomeBand::Above12k)] {
            let mut profile = BuyerProfile::with_budget(30_000.0, 90_000.0);
            profile.primary_usage = usage;
            profile.income_band = income;
            profile.family_size = 5;
            profiles.push(profile);
        }
    }
    profiles
}

#[test]
fn test_every_agent_score_is_bounded() {
    let agents: Vec<Box<dyn Scorer>> = vec![
        Box::new(CategoryFitAgent),
        Box::new(PriorityAgent),
        Box::new(BudgetAgent),
        Box::new(EconomyAgent::new()),
        Box::new(MaintenanceAgent::new(2025)),
        Box::new(ResaleAgent::new(2025)),
        Box::new(FinancingAgent::new()),
    ];

    for profile in create_profiles() {
        for category in CATEGORIES {
            for (year, mileage) in [(2025, 0), (2018, 90_000), (2001, 400_000)] {
                for price in [5_000.0, 60_000.0, 900_000.0] {
                    let vehicle = create_vehicle("v", "Lada", category, price, year, mileage);
                    for agent in &agents {
                        let score = agent.compute_score(&vehicle, &profile).unwrap();
                        assert!(
                            (0.0..=1.0).contains(&score),
                            "{} scored {} for {:?}",
                            agent.name(),
                            score,
                            category
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_agents_cover_every_dimension_once() {
    let dimensions = [
        CategoryFitAgent.dimension(),
        PriorityAgent.dimension(),
        BudgetAgent.dimension(),
        EconomyAgent::new().dimension(),
        MaintenanceAgent::new(2025).dimension(),
        ResaleAgent::new(2025).dimension(),
        FinancingAgent::new().dimension(),
    ];
    let mut sorted = dimensions.to_vec();
    sorted.sort();
    assert_eq!(sorted, Dimension::ALL.to_vec());
}

#[test]
fn test_age_depreciation_anchors() {
    assert_eq!(age_depreciation(0.0), 0.0);
    assert!((age_depreciation(1.0) - 0.15).abs() < 1e-12);
    assert!((age_depreciation(4.0) - 0.39).abs() < 1e-12);
    assert!((age_depreciation(15.0) - 0.75).abs() < 1e-12);
    assert!((age_depreciation(40.0) - 0.80).abs() < 1e-12);
}

#[test]
fn test_age_depreciation_is_monotonic() {
    let mut previous = 0.0;
    for tenth in 0..=300 {
        let current = age_depreciation(tenth as f64 / 10.0);
        assert!(current >= previous, "depreciation fell at age {}", tenth as f64 / 10.0);
        previous = current;
    }
}

#[test]
fn test_mileage_penalty_is_capped() {
    assert_eq!(mileage_penalty(0), 0.0);
    assert!(mileage_penalty(75_000) > 0.0);
    assert_eq!(mileage_penalty(150_000), MAX_MILEAGE_PENALTY);
    assert_eq!(mileage_penalty(900_000), MAX_MILEAGE_PENALTY);
}

#[test]
fn test_resale_prefers_newer_vehicles() {
    let agent = ResaleAgent::new(2025);
    let profile = BuyerProfile::with_budget(30_000.0, 90_000.0);

    let mut previous = f64::MAX;
    for year in (2005..=2025).rev() {
        let vehicle = create_vehicle("v", "Honda", Category::Sedan, 70_000.0, year, 30_000);
        let score = agent.compute_score(&vehicle, &profile).unwrap();
        assert!(score <= previous);
        previous = score;
    }
}

#[test]
fn test_heuristic_weights_sum_to_one_for_every_usage() {
    let table = HeuristicTable::new();
    let mut profile = BuyerProfile::with_budget(30_000.0, 90_000.0);

    for usage in std::iter::once(None).chain(Usage::ALL.into_iter().map(Some)) {
        profile.primary_usage = usage;
        let weights = heuristic_weights(&profile, &table).unwrap();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE, "{:?}", usage);
    }
}

#[test]
fn test_blended_weights_sum_to_one() {
    let table = HeuristicTable::new();
    let mut profile = BuyerProfile::with_budget(30_000.0, 90_000.0);
    profile.primary_usage = Some(Usage::Family);
    let heuristic = heuristic_weights(&profile, &table).unwrap();

    let deltas = [-1.0, -0.3, 0.0, 0.25, 1.0];
    for (i, dimension) in Dimension::ALL.iter().enumerate() {
        for delta in deltas {
            let adjustment = BTreeMap::from([
                (*dimension, delta),
                (Dimension::ALL[(i + 3) % Dimension::ALL.len()], -delta),
            ]);
            let blended = blend(&heuristic, &adjustment);
            assert!(blended.is_valid(), "{:?} {}", dimension, delta);
        }
    }
}

#[test]
fn test_tco_components_sum_to_total() {
    let calculator = CostOfOwnershipCalculator::new(2025);
    let assumptions = TcoAssumptions::default();

    for category in CATEGORIES {
        for price in [19_999.99, 54_321.0, 87_654.32, 250_000.0] {
            for mileage in [0, 120_000, 200_000] {
                let cost =
                    calculator.compute_tco(price, category, Some(11.3), 7, mileage, &assumptions);
                assert_eq!(cost.components_sum(), cost.total);
                assert_eq!(cost.cents.components_sum(), cost.cents.total);
                let cents = |v: f64| (v * 100.0).round() as i64;
                assert_eq!(cents(cost.financing), cost.cents.financing);
                assert_eq!(cents(cost.tax), cost.cents.tax);
            }
        }
    }
}

#[test]
fn test_tco_is_deterministic() {
    let calculator = CostOfOwnershipCalculator::new(2025);
    let assumptions = TcoAssumptions::default();

    let first = calculator.compute_tco(73_500.0, Category::Suv, None, 3, 45_000, &assumptions);
    let second = calculator.compute_tco(73_500.0, Category::Suv, None, 3, 45_000, &assumptions);

    assert_eq!(first, second);
    assert_eq!(first.assumptions, assumptions);
}

#[test]
fn test_zero_rate_installment_is_straight_division() {
    assert_eq!(amortized_installment(60_000.0, 0.0, 60), 1_000.0);
}

#[test]
fn test_mileage_multiplier_steps() {
    assert_eq!(mileage_multiplier(100_000), 1.0);
    assert_eq!(mileage_multiplier(100_001), 1.5);
    assert_eq!(mileage_multiplier(150_001), 2.0);
}

#[test]
fn test_local_cache_evicts_batch_without_victimizing_new_entry() {
    let cache = LocalCache::new(50);
    for i in 0..50 {
        cache.insert(format!("k{}", i), "v".to_string(), Duration::from_secs(60 + i));
    }

    let evicted = cache.insert("fresh".to_string(), "v".to_string(), Duration::from_secs(1));

    assert_eq!(evicted, 5);
    assert_eq!(cache.len(), 46);
    assert_eq!(cache.get("fresh"), Some("v".to_string()));
    // Nearest expiry goes first
    assert!(cache.get("k0").is_none());
    assert!(cache.get("k49").is_some());
}

#[test]
fn test_cache_keys_depend_only_on_declared_fields() {
    let agent = EconomyAgent::new();
    let mut profile = BuyerProfile::with_budget(30_000.0, 90_000.0);
    let before = CacheKey::profile_hash(&agent.cache_fields(&profile));

    profile.income_band = Some(IncomeBand::Above12k);
    profile.family_size = 6;
    assert_eq!(CacheKey::profile_hash(&agent.cache_fields(&profile)), before);

    profile.primary_usage = Some(Usage::RideHailing);
    assert_ne!(CacheKey::profile_hash(&agent.cache_fields(&profile)), before);

    let key = CacheKey::agent_score("carmatch", "economy", "v-1", &before);
    assert!(key.starts_with("carmatch:agent:economy:v-1:"));
    assert_eq!(before.len(), 16);
}

#[test]
fn test_prefilter_counts_filtered_vehicles() {
    let profile = BuyerProfile::with_budget(30_000.0, 60_000.0);
    let catalog = vec![
        create_vehicle("a", "Fiat", Category::Hatch, 45_000.0, 2020, 40_000),
        create_vehicle("b", "Fiat", Category::Hatch, 150_000.0, 2024, 0),
        create_vehicle("c", "Fiat", Category::Hatch, 1_000.0, 1995, 300_000),
    ];

    let outcome = prefilter(&catalog, &profile, 0.10);

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.filtered_out, 2);
    assert!(outcome.reason.is_none());
}

#[test]
fn test_vehicle_json_is_camel_case() {
    let json = r#"{
        "id": "v-1",
        "brand": "Toyota",
        "model": "Corolla",
        "year": 2021,
        "price": 98000,
        "mileage": 41000,
        "category": "sedan",
        "fuelType": "flex",
        "transmission": "cvt",
        "scores": {"economy": 0.8, "reliability": 0.9},
        "fuelEfficiency": 12.1,
        "dealership": {"id": "d-1", "name": "Toyota Centro", "city": "Curitiba", "region": "PR"}
    }"#;

    let vehicle: Vehicle = serde_json::from_str(json).unwrap();

    assert_eq!(vehicle.category, Category::Sedan);
    assert_eq!(vehicle.fuel_efficiency, Some(12.1));
    assert_eq!(vehicle.scores.space, 0.5);
}
