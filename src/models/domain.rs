use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Body style of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Compact,
    Hatch,
    Sedan,
    Suv,
    Pickup,
    Van,
    Minivan,
    Coupe,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Compact => "compact",
            Category::Hatch => "hatch",
            Category::Sedan => "sedan",
            Category::Suv => "suv",
            Category::Pickup => "pickup",
            Category::Van => "van",
            Category::Minivan => "minivan",
            Category::Coupe => "coupe",
        }
    }

    /// Typical fuel efficiency (km/l) used when a listing doesn't declare one
    pub fn default_fuel_efficiency(&self) -> f64 {
        match self {
            Category::Compact => 13.5,
            Category::Hatch => 12.5,
            Category::Sedan => 11.5,
            Category::Coupe => 10.0,
            Category::Suv => 9.5,
            Category::Minivan => 9.5,
            Category::Van => 8.5,
            Category::Pickup => 8.0,
        }
    }

    /// Seats that can be used comfortably
    pub fn seating_capacity(&self) -> u8 {
        match self {
            Category::Coupe => 2,
            Category::Compact => 4,
            Category::Hatch | Category::Sedan | Category::Pickup => 5,
            Category::Suv => 5,
            Category::Minivan => 7,
            Category::Van => 8,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Flex,
    Gasoline,
    Diesel,
    Hybrid,
    Electric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    Manual,
    Automatic,
    Cvt,
}

/// Per-dimension baseline scores attached to a catalog listing (0.0 - 1.0)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BaselineScores {
    #[validate(range(min = 0.0, max = 1.0))]
    pub economy: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub space: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub performance: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub comfort: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub safety: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub reliability: f64,
}

impl Default for BaselineScores {
    fn default() -> Self {
        Self {
            economy: 0.5,
            space: 0.5,
            performance: 0.5,
            comfort: 0.5,
            safety: 0.5,
            reliability: 0.5,
        }
    }
}

/// Dealership holding a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dealership {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
    /// State / region code, e.g. "SP"
    #[serde(default)]
    pub region: String,
}

/// A catalog vehicle. Read-only for the duration of a scoring call.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[validate(length(min = 1))]
    pub id: String,
    pub brand: String,
    pub model: String,
    #[validate(range(min = 1950, max = 2100))]
    pub year: u16,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub mileage: u32,
    pub category: Category,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    #[serde(default)]
    #[validate(nested)]
    pub scores: BaselineScores,
    /// Declared efficiency in km per liter (liter-equivalent for electrics)
    #[serde(default)]
    pub fuel_efficiency: Option<f64>,
    #[serde(default)]
    pub dealership: Dealership,
}

impl Vehicle {
    /// Age in whole years relative to `reference_year`, never negative
    pub fn age(&self, reference_year: i32) -> u32 {
        (reference_year - self.year as i32).max(0) as u32
    }

    /// Declared fuel efficiency, or the category default when missing or unusable
    pub fn effective_fuel_efficiency(&self) -> f64 {
        match self.fuel_efficiency {
            Some(eff) if eff.is_finite() && eff > 0.0 => eff,
            _ => self.category.default_fuel_efficiency(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.brand, self.model, self.year)
    }
}

/// What the buyer mainly needs the vehicle for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Family,
    Commercial,
    Urban,
    Leisure,
    FirstCar,
    RideHailing,
}

impl Usage {
    pub const ALL: [Usage; 6] = [
        Usage::Family,
        Usage::Commercial,
        Usage::Urban,
        Usage::Leisure,
        Usage::FirstCar,
        Usage::RideHailing,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|u| u.as_str() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Usage::Family => "family",
            Usage::Commercial => "commercial",
            Usage::Urban => "urban",
            Usage::Leisure => "leisure",
            Usage::FirstCar => "first_car",
            Usage::RideHailing => "ride_hailing",
        }
    }

    /// Usages that put a lot of distance on the vehicle
    pub fn is_high_distance(&self) -> bool {
        matches!(self, Usage::Commercial | Usage::RideHailing)
    }
}

/// Declared monthly household income band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeBand {
    UpTo3k,
    From3kTo5k,
    From5kTo8k,
    From8kTo12k,
    Above12k,
}

impl IncomeBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeBand::UpTo3k => "up_to_3k",
            IncomeBand::From3kTo5k => "from_3k_to_5k",
            IncomeBand::From5kTo8k => "from_5k_to_8k",
            IncomeBand::From8kTo12k => "from_8k_to_12k",
            IncomeBand::Above12k => "above_12k",
        }
    }

    /// Representative monthly income for the band
    pub fn reference_monthly_income(&self) -> f64 {
        match self {
            IncomeBand::UpTo3k => 2_500.0,
            IncomeBand::From3kTo5k => 4_000.0,
            IncomeBand::From5kTo8k => 6_500.0,
            IncomeBand::From8kTo12k => 10_000.0,
            IncomeBand::Above12k => 15_000.0,
        }
    }
}

/// Stated priority weights, 1 (don't care) to 5 (essential)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Priorities {
    #[validate(range(min = 1, max = 5))]
    pub economy: u8,
    #[validate(range(min = 1, max = 5))]
    pub space: u8,
    #[validate(range(min = 1, max = 5))]
    pub performance: u8,
    #[validate(range(min = 1, max = 5))]
    pub comfort: u8,
    #[validate(range(min = 1, max = 5))]
    pub safety: u8,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            economy: 3,
            space: 3,
            performance: 3,
            comfort: 3,
            safety: 3,
        }
    }
}

/// Buyer profile. Read-only for the duration of a scoring call.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_budget_range"))]
pub struct BuyerProfile {
    #[serde(default)]
    pub id: String,
    #[validate(range(min = 0.0))]
    pub budget_min: f64,
    #[validate(range(min = 0.0))]
    pub budget_max: f64,
    #[serde(default)]
    pub primary_usage: Option<Usage>,
    #[serde(default = "default_family_size")]
    #[validate(range(min = 1, max = 12))]
    pub family_size: u8,
    #[serde(default)]
    #[validate(nested)]
    pub priorities: Priorities,
    #[serde(default)]
    pub income_band: Option<IncomeBand>,
    /// Maximum monthly cost of ownership the buyer accepts
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub spending_ceiling: Option<f64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 20000.0))]
    pub monthly_distance_km: Option<f64>,
    #[serde(default)]
    pub local_inventory_only: bool,
}

fn default_family_size() -> u8 { 1 }

fn validate_budget_range(profile: &BuyerProfile) -> Result<(), ValidationError> {
    if profile.budget_min > profile.budget_max {
        return Err(ValidationError::new("budget_range"));
    }
    Ok(())
}

impl BuyerProfile {
    /// Minimal profile for a budget range; everything else left at defaults
    pub fn with_budget(budget_min: f64, budget_max: f64) -> Self {
        Self {
            id: String::new(),
            budget_min,
            budget_max,
            primary_usage: None,
            family_size: default_family_size(),
            priorities: Priorities::default(),
            income_band: None,
            spending_ceiling: None,
            region: None,
            monthly_distance_km: None,
            local_inventory_only: false,
        }
    }

    pub fn usage_label(&self) -> &'static str {
        self.primary_usage.map(|u| u.as_str()).unwrap_or("unspecified")
    }
}
