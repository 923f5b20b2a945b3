use tracing::{debug, info, warn};

use super::super::numeric::{finite_or, DIVISION_FLOOR};
use super::super::pipeline::{PricingContext, PricingStep, StepError};
use super::{checked, has_units};

/// Area used as a divisor: non-positive areas become the division floor.
fn divisor_area(area: f64, premises_id: i64) -> f64 {
    if area > 0.0 && area.is_finite() {
        area
    } else {
        warn!(premises_id, area, "area is not positive, using {DIVISION_FLOOR}");
        DIVISION_FLOOR
    }
}

/// `conditional_cost = fit_conditional_value * total_area_m2` and each unit's
/// share of the total conditional cost.
pub struct CalculateConditionalCosts;

impl PricingStep for CalculateConditionalCosts {
    fn name(&self) -> &'static str {
        "CalculateConditionalCosts"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let mut total = 0.0;
        for premise in &mut context.premises {
            let id = premise.unit.id;
            let area = checked(premise.unit.total_area_m2, 0.0, "total_area_m2", id).max(0.0);
            let fit = checked(
                premise.calculation.fit_conditional_value,
                0.0,
                "fit_conditional_value",
                id,
            );

            let cost = finite_or(fit * area, 0.0);
            premise.calculation.conditional_cost = cost;
            total += cost;
        }

        for premise in &mut context.premises {
            premise.calculation.cost_share = if total == 0.0 {
                0.0
            } else {
                finite_or(premise.calculation.conditional_cost / total, 0.0)
            };
            debug!(
                premises_id = premise.unit.id,
                conditional_cost = premise.calculation.conditional_cost,
                cost_share = premise.calculation.cost_share,
                "cost share assigned"
            );
        }

        info!(
            total_conditional_cost = total,
            units = context.premises.len(),
            "conditional costs calculated"
        );
        Ok(context)
    }
}

/// `actual_cost = current_price_per_sqm * sum(total_area_m2)`, shared by every unit.
pub struct CalculateActualCosts;

impl PricingStep for CalculateActualCosts {
    fn name(&self) -> &'static str {
        "CalculateActualCosts"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let price_per_sqm = context
            .static_config()
            .and_then(|config| config.lenient_number("current_price_per_sqm"))
            .unwrap_or_else(|| {
                warn!("current_price_per_sqm unavailable, actual cost is 0");
                0.0
            });

        let total_area: f64 = context
            .premises
            .iter()
            .map(|premise| finite_or(premise.unit.total_area_m2, 0.0))
            .sum();
        let total_area = if total_area <= 0.0 {
            warn!(total_area, "total area is not positive, using {DIVISION_FLOOR}");
            DIVISION_FLOOR
        } else {
            total_area
        };

        let actual_cost = finite_or(total_area * price_per_sqm, 0.0);
        for premise in &mut context.premises {
            let area = divisor_area(premise.unit.total_area_m2, premise.unit.id);
            let share = checked(premise.calculation.cost_share, 0.0, "cost_share", premise.unit.id);

            premise.calculation.actual_cost = actual_cost;
            premise.calculation.actual_price_per_sqm = finite_or(actual_cost * share / area, 0.0);
        }

        info!(total_area, price_per_sqm, actual_cost, "actual costs calculated");
        Ok(context)
    }
}

/// `actual_price_per_sqm = actual_cost * cost_share / total_area_m2`.
pub struct CalculateActualPricePerSqm;

impl PricingStep for CalculateActualPricePerSqm {
    fn name(&self) -> &'static str {
        "CalculateActualPricePerSqm"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        for premise in &mut context.premises {
            let id = premise.unit.id;
            let area = divisor_area(premise.unit.total_area_m2, id);
            let actual_cost = checked(premise.calculation.actual_cost, 0.0, "actual_cost", id);
            let share = checked(premise.calculation.cost_share, 0.0, "cost_share", id);

            premise.calculation.actual_price_per_sqm = finite_or(actual_cost * share / area, 0.0);
            debug!(
                premises_id = id,
                actual_price_per_sqm = premise.calculation.actual_price_per_sqm,
                "actual price per sqm"
            );
        }

        Ok(context)
    }
}

/// `base_price * fit_conditional_value * (1 - bargainGap / 100)`, clamped to the
/// unit's own `[min_price, max_price]`.
pub struct CalculateFinalPrice;

impl PricingStep for CalculateFinalPrice {
    fn name(&self) -> &'static str {
        "CalculateFinalPrice"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let bargain_gap = context
            .static_config()
            .and_then(|config| config.bargain_gap())
            .unwrap_or_else(|| {
                warn!("bargainGap unavailable, using 0");
                0.0
            });
        let discount = 1.0 - bargain_gap / 100.0;

        let mut lowest = f64::INFINITY;
        let mut highest = f64::NEG_INFINITY;
        for premise in &mut context.premises {
            let id = premise.unit.id;
            let calculation = &mut premise.calculation;
            let base_price = checked(calculation.base_price, 0.0, "base_price", id);
            let fit = checked(calculation.fit_conditional_value, 1.0, "fit_conditional_value", id);
            let min_price = checked(calculation.min_price, 0.0, "min_price", id);
            let max_price = checked(calculation.max_price, f64::INFINITY, "max_price", id);

            let price = (base_price * fit * discount).max(min_price).min(max_price);
            let price = if price.is_finite() {
                price
            } else {
                warn!(premises_id = id, "final price is not finite, using min_price");
                min_price
            };

            calculation.final_price = price;
            lowest = lowest.min(price);
            highest = highest.max(price);
            debug!(
                premises_id = id,
                base_price, fit, bargain_gap, final_price = price, "final price"
            );
        }

        info!(
            bargain_gap,
            lowest_final_price = lowest,
            highest_final_price = highest,
            "final prices calculated"
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pricing::domain::{
        Premises, PremisesWithCalculation, PricingConfigRecord,
    };
    use serde_json::{json, Value};

    fn context(static_config: Value, units: &[(f64, f64)]) -> PricingContext {
        let premises = units
            .iter()
            .enumerate()
            .map(|(index, (area, fit))| {
                let mut premise = PremisesWithCalculation::from(Premises {
                    id: index as i64 + 1,
                    total_area_m2: *area,
                    ..Premises::default()
                });
                premise.calculation.fit_conditional_value = *fit;
                premise
            })
            .collect();

        PricingContext {
            pricing_configs: vec![PricingConfigRecord {
                content: json!({ "staticConfig": static_config }),
                ..PricingConfigRecord::default()
            }],
            premises,
            ..PricingContext::default()
        }
    }

    #[test]
    fn cost_shares_sum_to_one() {
        let context = CalculateConditionalCosts
            .apply(context(json!({}), &[(50.0, 0.9), (60.0, 1.0), (70.0, 1.1)]))
            .expect("costs");

        let total: f64 = context
            .premises
            .iter()
            .map(|premise| premise.calculation.cost_share)
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((context.premises[0].calculation.conditional_cost - 45.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_conditional_cost_gives_zero_shares() {
        let context = CalculateConditionalCosts
            .apply(context(json!({}), &[(0.0, 1.0), (-5.0, 1.0)]))
            .expect("costs");

        assert!(context
            .premises
            .iter()
            .all(|premise| premise.calculation.cost_share == 0.0));
    }

    #[test]
    fn actual_cost_is_redistributed_by_share() {
        let steps: [&dyn PricingStep; 3] = [
            &CalculateConditionalCosts,
            &CalculateActualCosts,
            &CalculateActualPricePerSqm,
        ];
        let context = steps
            .iter()
            .try_fold(
                context(
                    json!({ "current_price_per_sqm": 1000 }),
                    &[(50.0, 0.9), (60.0, 1.0), (70.0, 1.1)],
                ),
                |context, step| step.apply(context),
            )
            .expect("costs");

        let redistributed: f64 = context
            .premises
            .iter()
            .map(|premise| premise.calculation.actual_price_per_sqm * premise.unit.total_area_m2)
            .sum();
        assert!((redistributed - 180_000.0).abs() < 1e-6);
        assert!(context
            .premises
            .iter()
            .all(|premise| premise.calculation.actual_cost == 180_000.0));
    }

    #[test]
    fn zero_area_never_produces_nan() {
        let steps: [&dyn PricingStep; 2] = [&CalculateActualCosts, &CalculateActualPricePerSqm];
        let context = steps
            .iter()
            .try_fold(
                context(json!({ "current_price_per_sqm": 1000 }), &[(0.0, 1.0)]),
                |context, step| step.apply(context),
            )
            .expect("costs");

        let calculation = &context.premises[0].calculation;
        assert!(calculation.actual_cost.is_finite());
        assert!(calculation.actual_price_per_sqm.is_finite());
    }

    #[test]
    fn final_price_is_clamped_per_unit() {
        let mut context = context(
            json!({ "bargainGap": 10 }),
            &[(50.0, 0.5), (60.0, 1.0), (70.0, 2.0)],
        );
        for premise in &mut context.premises {
            premise.calculation.base_price = 1000.0;
            premise.calculation.min_price = 800.0;
            premise.calculation.max_price = 1200.0;
        }

        let context = CalculateFinalPrice.apply(context).expect("final prices");
        let prices: Vec<f64> = context
            .premises
            .iter()
            .map(|premise| premise.calculation.final_price)
            .collect();

        assert_eq!(prices, vec![800.0, 900.0, 1200.0]);
    }

    #[test]
    fn missing_bargain_gap_means_no_discount() {
        let mut context = context(json!({}), &[(50.0, 1.0)]);
        context.premises[0].calculation.base_price = 1000.0;
        context.premises[0].calculation.min_price = 0.0;
        context.premises[0].calculation.max_price = 2000.0;

        let context = CalculateFinalPrice.apply(context).expect("final prices");
        assert_eq!(context.premises[0].calculation.final_price, 1000.0);
    }
}
