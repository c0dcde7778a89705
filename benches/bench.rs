// Criterion benchmarks for CarMatch Algo

use carmatch_algo::core::{CostOfOwnershipCalculator, ScoringOrchestrator};
use carmatch_algo::models::{
    BaselineScores, BuyerProfile, Category, Dealership, FuelType, TcoAssumptions, Transmission,
    Usage, Vehicle,
};
use carmatch_algo::services::CacheService;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
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

fn create_vehicle(id: usize) -> Vehicle {
    Vehicle {
        id: format!("v-{}", id),
        brand: if id % 3 == 0 { "Toyota" } else { "Fiat" }.to_string(),
        model: format!("Model {}", id % 17),
        year: 2010 + (id % 15) as u16,
        price: 40_000.0 + (id % 50) as f64 * 1_000.0,
        mileage: (id % 20) as u32 * 10_000,
        category: CATEGORIES[id % CATEGORIES.len()],
        fuel_type: FuelType::Flex,
        transmission: Transmission::Automatic,
        scores: BaselineScores::default(),
        fuel_efficiency: Some(8.0 + (id % 8) as f64),
        dealership: Dealership {
            id: format!("d-{}", id % 5),
            name: "Bench Motors".to_string(),
            city: "Sao Paulo".to_string(),
            region: "SP".to_string(),
        },
    }
}

fn create_profile() -> BuyerProfile {
    let mut profile = BuyerProfile::with_budget(45_000.0, 85_000.0);
    profile.primary_usage = Some(Usage::Family);
    profile.family_size = 4;
    profile.spending_ceiling = Some(3_500.0);
    profile
}

fn orchestrator() -> ScoringOrchestrator {
    let cache = Arc::new(CacheService::local_only(100_000, Duration::from_secs(300)));
    ScoringOrchestrator::builder(cache).reference_year(2025).build()
}

fn bench_compute_tco(c: &mut Criterion) {
    let calculator = CostOfOwnershipCalculator::new(2025);
    let assumptions = TcoAssumptions::default();

    c.bench_function("compute_tco", |b| {
        b.iter(|| {
            calculator.compute_tco(
                black_box(72_000.0),
                black_box(Category::Suv),
                black_box(Some(10.5)),
                black_box(4),
                black_box(65_000),
                &assumptions,
            )
        });
    });
}

fn bench_rank(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let profile = create_profile();

    let mut group = c.benchmark_group("rank");

    for size in [10, 100, 1000].iter() {
        let catalog: Vec<Vehicle> = (0..*size).map(create_vehicle).collect();

        // Fresh cache every iteration
        group.bench_with_input(BenchmarkId::new("cold", size), size, |b, _| {
            b.iter(|| {
                let orchestrator = orchestrator();
                runtime.block_on(orchestrator.rank(black_box(&catalog), black_box(&profile), 10))
            });
        });

        let warm = orchestrator();
        runtime.block_on(warm.rank(&catalog, &profile, 10));
        group.bench_with_input(BenchmarkId::new("warm", size), size, |b, _| {
            b.iter(|| runtime.block_on(warm.rank(black_box(&catalog), black_box(&profile), 10)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_tco, bench_rank);
criterion_main!(benches);
