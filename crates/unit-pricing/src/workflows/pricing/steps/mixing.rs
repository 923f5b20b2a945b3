use tracing::{debug, warn};

use super::super::numeric::{finite_or, max_of, min_of, DIVISION_FLOOR};
use super::super::pipeline::{PricingContext, PricingStep, StepError};
use super::{checked, has_units};

/// `mixed_scoring = normalized_scoring + normalized_scoring * preset_value`.
pub struct CalculateMixedScoring;

impl PricingStep for CalculateMixedScoring {
    fn name(&self) -> &'static str {
        "CalculateMixedScoring"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        for premise in &mut context.premises {
            let id = premise.unit.id;
            let calculation = &mut premise.calculation;
            let score = checked(calculation.normalized_scoring, 0.0, "normalized_scoring", id);
            let preset = checked(calculation.preset_value, 0.0, "preset_value", id);

            calculation.mixed_scoring = finite_or(score + score * preset, 0.0);
            debug!(premises_id = id, mixed_scoring = calculation.mixed_scoring, "mixed scoring");
        }

        Ok(context)
    }
}

/// Cumulative mixed scoring. The first unit always starts at `0.0`; every later
/// unit adds its own mixed score to the previous total.
pub struct CalculateRunningTotalMixedScoring;

impl PricingStep for CalculateRunningTotalMixedScoring {
    fn name(&self) -> &'static str {
        "CalculateRunningTotalMixedScoring"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let mut running_total = 0.0;
        for (index, premise) in context.premises.iter_mut().enumerate() {
            let mixed = checked(
                premise.calculation.mixed_scoring,
                0.0,
                "mixed_scoring",
                premise.unit.id,
            );
            if index > 0 {
                running_total += mixed;
            }
            premise.calculation.running_total_mixed = running_total;
        }

        Ok(context)
    }
}

pub struct CalculateNormalizedRunningTotal;

impl PricingStep for CalculateNormalizedRunningTotal {
    fn name(&self) -> &'static str {
        "CalculateNormalizedRunningTotal"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let totals: Vec<f64> = context
            .premises
            .iter()
            .map(|premise| {
                checked(
                    premise.calculation.running_total_mixed,
                    0.0,
                    "running_total_mixed",
                    premise.unit.id,
                )
            })
            .collect();
        let max_total = max_of(&totals).unwrap_or(0.0);

        for (premise, total) in context.premises.iter_mut().zip(totals) {
            premise.calculation.normalized_running_total = if max_total == 0.0 {
                0.0
            } else {
                finite_or(total / max_total, 0.0)
            };
        }
        if max_total == 0.0 {
            warn!("highest running total is zero, normalized running totals set to 0");
        }

        Ok(context)
    }
}

/// Range of the normalized running totals, written to every unit.
pub struct CalculateScope;

impl PricingStep for CalculateScope {
    fn name(&self) -> &'static str {
        "CalculateScope"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let values: Vec<f64> = context
            .premises
            .iter()
            .map(|premise| {
                checked(
                    premise.calculation.normalized_running_total,
                    0.0,
                    "normalized_running_total",
                    premise.unit.id,
                )
            })
            .collect();
        let scope = match (max_of(&values), min_of(&values)) {
            (Some(max), Some(min)) => finite_or(max - min, 0.0),
            _ => 0.0,
        };

        for premise in &mut context.premises {
            premise.calculation.scope = scope;
        }
        debug!(scope, "scope calculated");

        Ok(context)
    }
}

/// `fit_spread_rate = scope / spread`, both read from the first unit.
pub struct CalculateFitSpreadRate;

impl PricingStep for CalculateFitSpreadRate {
    fn name(&self) -> &'static str {
        "CalculateFitSpreadRate"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let scope = context.premises[0].calculation.scope;
        let spread = context.premises[0].calculation.spread;
        let rate = if spread == 0.0 || !spread.is_finite() || !scope.is_finite() {
            warn!(scope, spread, "spread is zero or invalid, using {DIVISION_FLOOR}");
            DIVISION_FLOOR
        } else {
            finite_or(scope / spread, DIVISION_FLOOR)
        };

        for premise in &mut context.premises {
            premise.calculation.fit_spread_rate = rate;
        }
        debug!(scope, spread, fit_spread_rate = rate, "fit spread rate calculated");

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pricing::domain::PremisesWithCalculation;

    fn context_with_mixed(mixed: &[f64]) -> PricingContext {
        let premises = mixed
            .iter()
            .map(|value| {
                let mut premise = PremisesWithCalculation::default();
                premise.calculation.mixed_scoring = *value;
                premise
            })
            .collect();
        PricingContext {
            premises,
            ..PricingContext::default()
        }
    }

    #[test]
    fn running_total_starts_at_zero() {
        let context = CalculateRunningTotalMixedScoring
            .apply(context_with_mixed(&[0.5, 0.25, 1.0]))
            .expect("running total");
        let totals: Vec<f64> = context
            .premises
            .iter()
            .map(|p| p.calculation.running_total_mixed)
            .collect();

        assert_eq!(totals, vec![0.0, 0.25, 1.25]);
    }

    #[test]
    fn normalized_running_total_and_scope() {
        let context = [
            &CalculateRunningTotalMixedScoring as &dyn PricingStep,
            &CalculateNormalizedRunningTotal,
            &CalculateScope,
        ]
        .iter()
        .try_fold(context_with_mixed(&[1.0, 1.0, 2.0]), |context, step| {
            step.apply(context)
        })
        .expect("chain");

        let normalized: Vec<f64> = context
            .premises
            .iter()
            .map(|p| p.calculation.normalized_running_total)
            .collect();
        assert_eq!(normalized, vec![0.0, 1.0 / 3.0, 1.0]);
        assert!(context.premises.iter().all(|p| p.calculation.scope == 1.0));
    }

    #[test]
    fn single_unit_running_total_normalizes_to_zero() {
        let context = CalculateNormalizedRunningTotal
            .apply(
                CalculateRunningTotalMixedScoring
                    .apply(context_with_mixed(&[3.0]))
                    .expect("total"),
            )
            .expect("normalized");
        assert_eq!(context.premises[0].calculation.normalized_running_total, 0.0);
    }

    #[test]
    fn mixed_scoring_replaces_invalid_inputs() {
        let mut context = context_with_mixed(&[0.0, 0.0]);
        context.premises[0].calculation.normalized_scoring = 0.5;
        context.premises[0].calculation.preset_value = 1.0;
        context.premises[1].calculation.normalized_scoring = f64::NAN;

        let context = CalculateMixedScoring.apply(context).expect("mixed");
        assert_eq!(context.premises[0].calculation.mixed_scoring, 1.0);
        assert_eq!(context.premises[1].calculation.mixed_scoring, 0.0);
    }

    #[test]
    fn zero_spread_uses_division_floor() {
        let mut context = context_with_mixed(&[0.0]);
        context.premises[0].calculation.scope = 1.0;

        let context = CalculateFitSpreadRate.apply(context).expect("rate");
        assert_eq!(context.premises[0].calculation.fit_spread_rate, DIVISION_FLOOR);

        let mut context = context_with_mixed(&[0.0, 0.0]);
        for premise in &mut context.premises {
            premise.calculation.scope = 1.0;
            premise.calculation.spread = 0.25;
        }
        let context = CalculateFitSpreadRate.apply(context).expect("rate");
        assert!(context
            .premises
            .iter()
            .all(|p| p.calculation.fit_spread_rate == 4.0));
    }
}
