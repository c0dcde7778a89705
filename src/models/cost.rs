use serde::{Deserialize, Serialize};

/// Financing and usage assumptions behind a cost estimate.
///
/// Returned with every [`CostBreakdown`] so the estimate can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcoAssumptions {
    /// Fraction of the price paid upfront (0.0 - 1.0)
    pub down_payment_pct: f64,
    pub term_months: u32,
    /// Monthly interest rate as a fraction, e.g. 0.0149 for 1.49%/month
    pub monthly_rate: f64,
    pub monthly_distance_km: f64,
    pub fuel_price: f64,
    pub region: String,
}

impl Default for TcoAssumptions {
    fn default() -> Self {
        Self {
            down_payment_pct: 0.20,
            term_months: 60,
            monthly_rate: 0.0149,
            monthly_distance_km: 1_000.0,
            fuel_price: 5.89,
            region: "SP".to_string(),
        }
    }
}

/// Monthly components in integer cents. `total` is always the exact sum of
/// the other five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCents {
    pub financing: i64,
    pub fuel: i64,
    pub maintenance: i64,
    pub insurance: i64,
    pub tax: i64,
    pub total: i64,
}

impl CostCents {
    pub fn new(financing: i64, fuel: i64, maintenance: i64, insurance: i64, tax: i64) -> Self {
        Self {
            financing,
            fuel,
            maintenance,
            insurance,
            tax,
            total: financing + fuel + maintenance + insurance + tax,
        }
    }

    pub fn components_sum(&self) -> i64 {
        self.financing + self.fuel + self.maintenance + self.insurance + self.tax
    }
}

/// Monthly cost of ownership, in currency units rounded to cents.
///
/// The float fields are display values derived from `cents`; sums should be
/// taken over `cents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub financing: f64,
    pub fuel: f64,
    pub maintenance: f64,
    pub insurance: f64,
    pub tax: f64,
    pub total: f64,
    pub cents: CostCents,
    pub financed_amount: f64,
    pub annual_total: f64,
    pub assumptions: TcoAssumptions,
}

impl CostBreakdown {
    /// Sum of the five monthly components, added in cents and converted once
    pub fn components_sum(&self) -> f64 {
        self.cents.components_sum() as f64 / 100.0
    }
}
