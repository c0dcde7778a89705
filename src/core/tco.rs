use std::collections::HashMap;

use crate::config::TcoSettings;
use crate::models::{BuyerProfile, Category, CostBreakdown, CostCents, TcoAssumptions, Vehicle};

/// Fraction of the yearly maintenance base added per year of age
pub const DEFAULT_AGING_FACTOR: f64 = 0.08;

/// Mileage above which maintenance costs 1.5x
pub const HIGH_MILEAGE_KM: u32 = 100_000;

/// Mileage above which maintenance costs 2x
pub const VERY_HIGH_MILEAGE_KM: u32 = 150_000;

/// Region tax rate applied when the region is unknown
pub const DEFAULT_REGION_TAX_RATE: f64 = 0.03;

/// Fixed monthly installment for `principal` over `term_months` at `monthly_rate`.
///
/// Standard amortization: `P·r / (1 − (1 + r)^−n)`, or `P / n` at a zero rate.
/// A zero term means no financing.
pub fn amortized_installment(principal: f64, monthly_rate: f64, term_months: u32) -> f64 {
    if principal <= 0.0 || term_months == 0 {
        return 0.0;
    }
    let n = term_months as f64;
    if monthly_rate.abs() < f64::EPSILON {
        return principal / n;
    }
    principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-n))
}

/// Step multiplier on maintenance cost by odometer reading
#[inline]
pub fn mileage_multiplier(mileage: u32) -> f64 {
    if mileage > VERY_HIGH_MILEAGE_KM {
        2.0
    } else if mileage > HIGH_MILEAGE_KM {
        1.5
    } else {
        1.0
    }
}

/// Yearly maintenance cost of a new vehicle of this category
pub fn maintenance_base_annual(category: Category) -> f64 {
    match category {
        Category::Compact => 1_800.0,
        Category::Hatch => 2_000.0,
        Category::Sedan => 2_600.0,
        Category::Coupe => 3_000.0,
        Category::Minivan => 3_200.0,
        Category::Suv => 3_400.0,
        Category::Pickup => 3_800.0,
        Category::Van => 4_000.0,
    }
}

/// Yearly insurance premium as a fraction of the vehicle price
pub fn insurance_annual_rate(category: Category) -> f64 {
    match category {
        Category::Compact => 0.035,
        Category::Hatch => 0.038,
        Category::Sedan => 0.040,
        Category::Minivan => 0.042,
        Category::Suv => 0.045,
        Category::Van => 0.048,
        Category::Pickup => 0.050,
        Category::Coupe => 0.060,
    }
}

/// Yearly ownership tax as a fraction of the vehicle price
pub fn region_tax_rate(region: &str) -> f64 {
    match region.trim().to_ascii_uppercase().as_str() {
        "SP" | "RJ" | "MG" => 0.04,
        "GO" => 0.0375,
        "PR" | "DF" => 0.035,
        "RS" | "PE" | "CE" => 0.03,
        "BA" => 0.025,
        "SC" | "ES" => 0.02,
        _ => DEFAULT_REGION_TAX_RATE,
    }
}

/// Per-category and per-region rates, with configured entries taking
/// precedence over the built-in tables
#[derive(Debug, Clone, Default)]
pub struct RateTables {
    maintenance_base: HashMap<String, f64>,
    insurance_rates: HashMap<String, f64>,
    region_tax_rates: HashMap<String, f64>,
}

impl RateTables {
    /// Built-in tables only
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides from `tco.maintenance_base`, `tco.insurance_rates` and
    /// `tco.region_tax_rates`. Negative or non-finite entries are ignored.
    pub fn from_settings(settings: &TcoSettings) -> Self {
        Self {
            maintenance_base: usable_rates(
                &settings.maintenance_base,
                "maintenance_base",
                str::to_ascii_lowercase,
            ),
            insurance_rates: usable_rates(
                &settings.insurance_rates,
                "insurance_rates",
                str::to_ascii_lowercase,
            ),
            region_tax_rates: usable_rates(
                &settings.region_tax_rates,
                "region_tax_rates",
                str::to_ascii_uppercase,
            ),
        }
    }

    pub fn maintenance_base_annual(&self, category: Category) -> f64 {
        self.maintenance_base
            .get(category.as_str())
            .copied()
            .unwrap_or_else(|| maintenance_base_annual(category))
    }

    pub fn insurance_annual_rate(&self, category: Category) -> f64 {
        self.insurance_rates
            .get(category.as_str())
            .copied()
            .unwrap_or_else(|| insurance_annual_rate(category))
    }

    pub fn region_tax_rate(&self, region: &str) -> f64 {
        self.region_tax_rates
            .get(&region.trim().to_ascii_uppercase())
            .copied()
            .unwrap_or_else(|| region_tax_rate(region))
    }
}

fn usable_rates(
    raw: &HashMap<String, f64>,
    table: &str,
    normalize: fn(&str) -> String,
) -> HashMap<String, f64> {
    raw.iter()
        .filter_map(|(key, rate)| {
            if rate.is_finite() && *rate >= 0.0 {
                Some((normalize(key.trim()), *rate))
            } else {
                tracing::warn!("Ignoring tco.{} entry {} = {}", table, key, rate);
                None
            }
        })
        .collect()
}

fn to_cents(amount: f64) -> i64 {
    if amount.is_finite() && amount > 0.0 {
        (amount * 100.0).round() as i64
    } else {
        0
    }
}

fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Monthly cost-of-ownership estimator.
///
/// Pure: the same inputs always produce the same [`CostBreakdown`], and the
/// assumptions used are returned with it.
#[derive(Debug, Clone)]
pub struct CostOfOwnershipCalculator {
    aging_factor: f64,
    reference_year: i32,
    defaults: TcoAssumptions,
    rates: RateTables,
}

impl CostOfOwnershipCalculator {
    pub fn new(reference_year: i32) -> Self {
        Self {
            aging_factor: DEFAULT_AGING_FACTOR,
            reference_year,
            defaults: TcoAssumptions::default(),
            rates: RateTables::new(),
        }
    }

    pub fn from_settings(settings: &TcoSettings, reference_year: i32) -> Self {
        Self {
            aging_factor: settings.aging_factor,
            reference_year,
            defaults: settings.assumptions(),
            rates: RateTables::from_settings(settings),
        }
    }

    pub fn default_assumptions(&self) -> &TcoAssumptions {
        &self.defaults
    }

    /// Default assumptions with the profile's region and monthly distance applied
    pub fn assumptions_for(&self, profile: &BuyerProfile) -> TcoAssumptions {
        let mut assumptions = self.defaults.clone();
        if let Some(region) = profile.region.as_deref().filter(|r| !r.trim().is_empty()) {
            assumptions.region = region.trim().to_ascii_uppercase();
        }
        if let Some(distance) = profile.monthly_distance_km.filter(|d| d.is_finite() && *d >= 0.0) {
            assumptions.monthly_distance_km = distance;
        }
        assumptions
    }

    /// Estimate for a catalog vehicle under a buyer's assumptions
    pub fn compute_for_vehicle(&self, vehicle: &Vehicle, profile: &BuyerProfile) -> CostBreakdown {
        self.compute_tco(
            vehicle.price,
            vehicle.category,
            vehicle.fuel_efficiency,
            vehicle.age(self.reference_year),
            vehicle.mileage,
            &self.assumptions_for(profile),
        )
    }

    /// Monthly cost of ownership.
    ///
    /// `fuel_efficiency` is in km per fuel unit; the category default is used
    /// when it is missing or not positive. Every component is rounded to
    /// cents and the total is the sum of the rounded components.
    pub fn compute_tco(
        &self,
        price: f64,
        category: Category,
        fuel_efficiency: Option<f64>,
        age_years: u32,
        mileage: u32,
        assumptions: &TcoAssumptions,
    ) -> CostBreakdown {
        let price = non_negative(price);
        let down_payment_pct = if assumptions.down_payment_pct.is_finite() {
            assumptions.down_payment_pct.clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Financing
        let financed_amount = if assumptions.term_months == 0 {
            0.0
        } else {
            price * (1.0 - down_payment_pct)
        };
        let financing = amortized_installment(
            financed_amount,
            non_negative(assumptions.monthly_rate),
            assumptions.term_months,
        );

        // Fuel
        let efficiency = match fuel_efficiency {
            Some(eff) if eff.is_finite() && eff > 0.0 => eff,
            _ => category.default_fuel_efficiency(),
        };
        let fuel = non_negative(assumptions.monthly_distance_km) / efficiency
            * non_negative(assumptions.fuel_price);

        // Maintenance
        let maintenance = self.rates.maintenance_base_annual(category)
            * (1.0 + age_years as f64 * self.aging_factor)
            / 12.0
            * mileage_multiplier(mileage);

        // Insurance and tax
        let insurance = price * self.rates.insurance_annual_rate(category) / 12.0;
        let tax = price * self.rates.region_tax_rate(&assumptions.region) / 12.0;

        let cents = CostCents::new(
            to_cents(financing),
            to_cents(fuel),
            to_cents(maintenance),
            to_cents(insurance),
            to_cents(tax),
        );

        CostBreakdown {
            financing: from_cents(cents.financing),
            fuel: from_cents(cents.fuel),
            maintenance: from_cents(cents.maintenance),
            insurance: from_cents(cents.insurance),
            tax: from_cents(cents.tax),
            total: from_cents(cents.total),
            cents,
            financed_amount: from_cents(to_cents(financed_amount)),
            annual_total: from_cents(cents.total * 12),
            assumptions: assumptions.clone(),
        }
    }
}
