use carmatch_algo::config::Settings;
use carmatch_algo::core::{CostOfOwnershipCalculator, ScoringOrchestrator};
use carmatch_algo::models::{
    BuyerProfile, Category, MetricsResponse, RankRequest, RankResponse, Vehicle,
};
use carmatch_algo::services::{CacheService, HttpSemanticAnalyzer};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carmatch-algo")]
#[command(about = "CarMatch - vehicle scoring and ranking engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to config/default.toml + config/local.toml)
    #[arg(short, long, global = true, env = "CARMATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a catalog of vehicles for a buyer profile
    Rank {
        /// JSON array of vehicles
        #[arg(long)]
        catalog: PathBuf,

        /// JSON buyer profile
        #[arg(long)]
        profile: PathBuf,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print per-agent metrics to stderr after ranking
        #[arg(long)]
        metrics: bool,
    },

    /// Estimate the monthly cost of ownership of a vehicle
    Cost {
        #[arg(long)]
        price: f64,

        /// compact, hatch, sedan, suv, pickup, van, minivan or coupe
        #[arg(long, value_parser = parse_category)]
        category: Category,

        /// Vehicle age in years
        #[arg(long, default_value = "0")]
        age: u32,

        #[arg(long, default_value = "0")]
        mileage: u32,

        /// Fuel efficiency in km/l; category default when omitted
        #[arg(long)]
        efficiency: Option<f64>,

        /// Region code for the vehicle tax rate
        #[arg(long)]
        region: Option<String>,

        /// Monthly distance driven in km
        #[arg(long)]
        distance: Option<f64>,
    },
}

fn parse_category(value: &str) -> Result<Category, String> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown category: {}", value))
}

fn init_tracing(settings: &Settings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format =
        std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    // stdout carries the JSON output
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    match log_format.as_str() {
        "json" => subscriber.json().init(),
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.init(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?;
    Ok(value)
}

async fn build_orchestrator(
    settings: &Settings,
) -> Result<ScoringOrchestrator, Box<dyn std::error::Error>> {
    let cache = Arc::new(CacheService::from_settings(&settings.cache).await);
    info!(
        "Cache initialized (local: {} entries, TTL: {}s, shared tier: {})",
        settings.cache.l1_cache_size,
        settings.cache.ttl_secs,
        cache.has_shared_tier()
    );

    let mut builder = ScoringOrchestrator::builder_from_settings(cache, settings);

    if let Some(endpoint) = &settings.semantic.endpoint {
        let timeout = Duration::from_millis(settings.semantic.timeout_ms);
        let analyzer = HttpSemanticAnalyzer::new(
            endpoint.clone(),
            settings.semantic.api_key.clone(),
            timeout,
        )?;
        info!("Semantic analyzer enabled: {}", endpoint);
        builder = builder.with_analyzer(Arc::new(analyzer), timeout);
    }

    Ok(builder.build())
}

async fn run_rank(
    settings: &Settings,
    catalog: &Path,
    profile: &Path,
    limit: Option<usize>,
    metrics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = RankRequest {
        profile: read_json::<BuyerProfile>(profile)?,
        catalog: read_json::<Vec<Vehicle>>(catalog)?,
        limit: limit.unwrap_or(settings.scoring.default_limit),
    };

    if let Err(errors) = request.validate_all() {
        error!("Validation failed for rank request: field_errors={:?}", errors);
        return Err(errors.into());
    }

    let limit = request.limit.min(settings.scoring.max_limit);
    info!(
        "Ranking {} vehicles for profile {:?}, limit: {}",
        request.catalog.len(),
        request.profile.id,
        limit
    );

    let orchestrator = build_orchestrator(settings).await?;
    let ranking = orchestrator.rank(&request.catalog, &request.profile, limit).await;

    let response = RankResponse::from(ranking);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if metrics {
        let report = MetricsResponse {
            agents: orchestrator.metrics_snapshot(),
            timestamp: chrono::Utc::now(),
        };
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_cost(
    settings: &Settings,
    price: f64,
    category: Category,
    age: u32,
    mileage: u32,
    efficiency: Option<f64>,
    region: Option<String>,
    distance: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be a non-negative number, got {}", price).into());
    }

    let reference_year = settings
        .scoring
        .reference_year
        .unwrap_or_else(|| chrono::Utc::now().year());
    let calculator = CostOfOwnershipCalculator::from_settings(&settings.tco, reference_year);

    let mut assumptions = calculator.default_assumptions().clone();
    if let Some(region) = region {
        assumptions.region = region.trim().to_ascii_uppercase();
    }
    if let Some(distance) = distance {
        assumptions.monthly_distance_km = distance;
    }

    let breakdown = calculator.compute_tco(price, category, efficiency, age, mileage, &assumptions);
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => Settings::default(),
    };

    init_tracing(&settings);

    if let Err(e) = loaded {
        error!("Failed to load configuration: {}", e);
        return Err(e.into());
    }
    info!("Configuration loaded successfully");

    let result = match cli.command {
        Commands::Rank {
            catalog,
            profile,
            limit,
            metrics,
        } => run_rank(&settings, &catalog, &profile, limit, metrics).await,
        Commands::Cost {
            price,
            category,
            age,
            mileage,
            efficiency,
            region,
            distance,
        } => run_cost(&settings, price, category, age, mileage, efficiency, region, distance),
    };

    if let Err(e) = &result {
        error!("Command failed: {}", e);
    }

    result
}
