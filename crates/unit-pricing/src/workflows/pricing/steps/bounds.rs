use tracing::{debug, error, warn};

use super::super::numeric::{finite_or, nonzero_or_floor, DIVISION_FLOOR};
use super::super::pipeline::{PricingContext, PricingStep, StepError};
use super::super::rules::StaticConfig;

/// Copies `current_price_per_sqm` from the latest pricing config onto every unit.
pub struct CalculateBasePrice;

impl PricingStep for CalculateBasePrice {
    fn name(&self) -> &'static str {
        "CalculateBasePrice"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        let config = context
            .latest_pricing_config()
            .ok_or(StepError::MissingPricingConfig)?;
        let price = StaticConfig::from_content(&config.content)
            .and_then(|config| config.current_price_per_sqm())
            .ok_or_else(|| StepError::InvalidValue {
                field: "current_price_per_sqm",
                reason: "missing or not a number".to_string(),
            })?;

        let price = if price == 0.0 {
            warn!("current_price_per_sqm is zero, using {DIVISION_FLOOR}");
            DIVISION_FLOOR
        } else {
            price
        };

        for premise in &mut context.premises {
            premise.calculation.base_price = price;
        }
        debug!(base_price = price, "base price assigned");

        Ok(context)
    }
}

/// Copies the reference liquidation ratios onto the unit's liquidation rates.
pub struct CalculateMinMaxRate;

impl PricingStep for CalculateMinMaxRate {
    fn name(&self) -> &'static str {
        "CalculateMinMaxRate"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        for premise in &mut context.premises {
            let calculation = &mut premise.calculation;
            let (min_ref, max_ref) = (calculation.min_ref_price, calculation.max_ref_price);

            if !min_ref.is_finite() || !max_ref.is_finite() {
                error!(
                    premises_id = premise.unit.id,
                    "reference liquidation prices are not numbers, rates set to 0"
                );
                calculation.min_liq_rate = 0.0;
                calculation.max_liq_rate = 0.0;
                continue;
            }

            if min_ref == 0.0 || max_ref == 0.0 {
                warn!(
                    premises_id = premise.unit.id,
                    min_ref, max_ref, "zero reference price, using {DIVISION_FLOOR}"
                );
            }
            calculation.min_liq_rate = nonzero_or_floor(min_ref);
            calculation.max_liq_rate = nonzero_or_floor(max_ref);
        }

        Ok(context)
    }
}

/// `min_price = base_price * min_liq_rate`, `max_price = base_price * max_liq_rate`.
pub struct CalculateMinMaxPrice;

impl PricingStep for CalculateMinMaxPrice {
    fn name(&self) -> &'static str {
        "CalculateMinMaxPrice"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        for premise in &mut context.premises {
            let calculation = &mut premise.calculation;
            let base_price = calculation.base_price;
            let (min_rate, max_rate) = (calculation.min_liq_rate, calculation.max_liq_rate);

            if !base_price.is_finite() || !min_rate.is_finite() || !max_rate.is_finite() {
                error!(
                    premises_id = premise.unit.id,
                    "base price or liquidation rates are not numbers, prices set to 0"
                );
                calculation.min_price = 0.0;
                calculation.max_price = 0.0;
                continue;
            }

            calculation.min_price = finite_or(base_price * nonzero_or_floor(min_rate), 0.0);
            calculation.max_price = finite_or(base_price * nonzero_or_floor(max_rate), 0.0);
        }

        Ok(context)
    }
}

/// `spread = max_liq_rate / min_liq_rate - 1`.
pub struct CalculateSpread;

impl PricingStep for CalculateSpread {
    fn name(&self) -> &'static str {
        "CalculateSpread"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        for premise in &mut context.premises {
            let id = premise.unit.id;
            let calculation = &mut premise.calculation;
            let (min_rate, max_rate) = (calculation.min_liq_rate, calculation.max_liq_rate);

            if !min_rate.is_finite() || !max_rate.is_finite() {
                error!(premises_id = id, "liquidation rates are not numbers, spread set to 0");
                calculation.spread = 0.0;
                continue;
            }

            let divisor = if min_rate <= 0.0 {
                warn!(premises_id = id, "min_liq_rate is not positive, using {DIVISION_FLOOR}");
                DIVISION_FLOOR
            } else {
                min_rate
            };

            calculation.spread = finite_or(max_rate / divisor - 1.0, 0.0);
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pricing::domain::{PremisesWithCalculation, PricingConfigRecord};
    use serde_json::json;

    fn context_with_price(price: serde_json::Value) -> PricingContext {
        PricingContext {
            pricing_configs: vec![PricingConfigRecord {
                content: json!({ "staticConfig": { "current_price_per_sqm": price } }),
                ..PricingConfigRecord::default()
            }],
            premises: vec![PremisesWithCalculation::default(); 2],
            ..PricingContext::default()
        }
    }

    #[test]
    fn base_price_floors_zero_and_rejects_text() {
        let context = CalculateBasePrice
            .apply(context_with_price(json!(0)))
            .expect("zero price is floored");
        assert!(context
            .premises
            .iter()
            .all(|premise| premise.calculation.base_price == DIVISION_FLOOR));

        let err = CalculateBasePrice
            .apply(context_with_price(json!("1000")))
            .expect_err("string price is rejected");
        assert!(matches!(
            err,
            StepError::InvalidValue {
                field: "current_price_per_sqm",
                ..
            }
        ));
    }

    #[test]
    fn zero_minimum_rate_never_divides_by_zero() {
        let mut context = context_with_price(json!(1000));
        context.premises[0].calculation.max_ref_price = 1.1;

        let context = CalculateMinMaxRate.apply(context).expect("rates");
        let context = CalculateSpread.apply(context).expect("spread");
        let calculation = &context.premises[0].calculation;

        assert_eq!(calculation.min_liq_rate, DIVISION_FLOOR);
        assert!(calculation.spread.is_finite());
        assert!(calculation.spread > 0.0);
    }

    #[test]
    fn price_bounds_scale_base_price() {
        let mut context = context_with_price(json!(1000));
        for premise in &mut context.premises {
            premise.calculation.min_ref_price = 0.9;
            premise.calculation.max_ref_price = 1.1;
        }

        let context = [
            &CalculateBasePrice as &dyn PricingStep,
            &CalculateMinMaxRate,
            &CalculateMinMaxPrice,
            &CalculateSpread,
        ]
        .iter()
        .try_fold(context, |context, step| step.apply(context))
        .expect("bounds chain");

        let calculation = &context.premises[1].calculation;
        assert!((calculation.min_price - 900.0).abs() < 1e-9);
        assert!((calculation.max_price - 1100.0).abs() < 1e-9);
        assert!((calculation.spread - (1.1 / 0.9 - 1.0)).abs() < 1e-12);
    }
}
