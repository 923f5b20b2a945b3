//! The individual pricing steps, grouped by the stage of the chain they belong to.

mod bounds;
mod costs;
mod fit;
mod mixing;
mod scoring;

pub use bounds::{CalculateBasePrice, CalculateMinMaxPrice, CalculateMinMaxRate, CalculateSpread};
pub use costs::{
    CalculateActualCosts, CalculateActualPricePerSqm, CalculateConditionalCosts,
    CalculateFinalPrice,
};
pub use fit::{CalculateFitCondValues, FitRateSource};
pub use mixing::{
    CalculateFitSpreadRate, CalculateMixedScoring, CalculateNormalizedRunningTotal,
    CalculateRunningTotalMixedScoring, CalculateScope,
};
pub use scoring::{
    normalized_ranks, CalculateNormalizedRanks, CalculateNormalizedScoring, CalculatePresetValues,
    FilterAndScoreUnits,
};

use tracing::warn;

use super::pipeline::PricingContext;

/// Steps that work over the unit list have nothing to do without units.
fn has_units(context: &PricingContext, step: &'static str) -> bool {
    if context.premises.is_empty() {
        warn!(step, "no premises to process");
        false
    } else {
        true
    }
}

/// Replaces a non-finite input with `fallback`, logging which unit it belonged to.
fn checked(value: f64, fallback: f64, field: &'static str, premises_id: i64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(premises_id, field, fallback, "invalid value, using fallback");
        fallback
    }
}
