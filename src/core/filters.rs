use crate::models::{BuyerProfile, NoMatchReason, Vehicle};

/// Candidates that survived the pre-filter, and why nothing did when empty
#[derive(Debug)]
pub struct FilterOutcome<'a> {
    pub candidates: Vec<&'a Vehicle>,
    pub filtered_out: usize,
    pub reason: Option<NoMatchReason>,
}

/// Check if a vehicle's price falls inside the buyer's budget range
///
/// Stage 1 of the pre-filter. `tolerance` widens the range on both sides
/// (0.10 admits up to 10% over `budget_max`) so near misses still get scored
/// and the budget agent ranks them.
#[inline]
pub fn within_budget(vehicle: &Vehicle, profile: &BuyerProfile, tolerance: f64) -> bool {
    let tolerance = tolerance.max(0.0);
    let lower = profile.budget_min * (1.0 - tolerance).max(0.0);
    let upper = profile.budget_max * (1.0 + tolerance);

    vehicle.price.is_finite() && vehicle.price >= lower && vehicle.price <= upper
}

/// Check if a vehicle is sold in the buyer's region
///
/// Stage 2. Only restricts when the buyer asked for local inventory and
/// declared a region.
#[inline]
pub fn in_region(vehicle: &Vehicle, profile: &BuyerProfile) -> bool {
    match (&profile.region, profile.local_inventory_only) {
        (Some(region), true) => vehicle
            .dealership
            .region
            .trim()
            .eq_ignore_ascii_case(region.trim()),
        _ => true,
    }
}

/// Run every stage over a catalog
pub fn prefilter<'a>(
    vehicles: &'a [Vehicle],
    profile: &BuyerProfile,
    tolerance: f64,
) -> FilterOutcome<'a> {
    if vehicles.is_empty() {
        return FilterOutcome {
            candidates: Vec::new(),
            filtered_out: 0,
            reason: Some(NoMatchReason::EmptyCatalog),
        };
    }

    let in_budget: Vec<&Vehicle> = vehicles
        .iter()
        .filter(|v| within_budget(v, profile, tolerance))
        .collect();
    let budget_matches = in_budget.len();

    let candidates: Vec<&Vehicle> = in_budget
        .into_iter()
        .filter(|v| in_region(v, profile))
        .collect();

    let reason = if budget_matches == 0 {
        Some(NoMatchReason::BudgetTooNarrow)
    } else if candidates.is_empty() {
        Some(NoMatchReason::NoRegionalInventory)
    } else {
        None
    };

    FilterOutcome {
        filtered_out: vehicles.len() - candidates.len(),
        candidates,
        reason,
    }
}
