use tracing::{debug, warn};

use super::super::numeric::{finite_or, max_of, median, min_of, nonzero_or_floor, DIVISION_FLOOR};
use super::super::pipeline::{PricingContext, PricingStep, StepError};
use super::super::rules::StaticConfig;
use super::{checked, has_units};

/// Where the fit step takes its liquidation bounds and reference price from.
///
/// Liquidation refusal values are ratios of a price per sqm under both sources,
/// the same reading `CalculateMinMaxPrice` gives them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FitRateSource {
    /// Lowest `min_price` and highest `max_price` across units, against the
    /// units' `base_price`.
    #[default]
    UnitLiquidationRates,
    /// `onboarding_current_price_per_sqm` scaled by the refusal ratios, against
    /// `staticConfig.current_price_per_sqm`.
    OnboardingPrice,
}

impl FitRateSource {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "unit" => Some(Self::UnitLiquidationRates),
            "onboarding" => Some(Self::OnboardingPrice),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UnitLiquidationRates => "unit",
            Self::OnboardingPrice => "onboarding",
        }
    }
}

/// Liquidation bounds and the reference they are measured against, all per sqm.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RateInputs {
    price_per_sqm: f64,
    min_price_per_sqm: f64,
    max_price_per_sqm: f64,
}

impl RateInputs {
    /// `(b_rate_net, t_rate_net)`; a net on the wrong side of the reference is floored.
    fn nets(&self) -> (f64, f64) {
        let price_per_sqm = if self.price_per_sqm == 0.0 {
            warn!("reference price per sqm is zero, using {DIVISION_FLOOR}");
            DIVISION_FLOOR
        } else {
            self.price_per_sqm
        };

        let b_rate_net = 1.0 - self.min_price_per_sqm / price_per_sqm;
        let t_rate_net = self.max_price_per_sqm / price_per_sqm - 1.0;
        (positive_net(b_rate_net, "b_rate_net"), positive_net(t_rate_net, "t_rate_net"))
    }
}

fn positive_net(net: f64, field: &'static str) -> f64 {
    if net.is_finite() && net > 0.0 {
        return net;
    }
    warn!(field, net, "liquidation bound does not widen the price, using {DIVISION_FLOOR}");
    DIVISION_FLOOR
}

fn missing(field: &'static str) -> StepError {
    StepError::InvalidValue {
        field,
        reason: "missing or not a number".to_string(),
    }
}

/// Asymmetric price multiplier around the median normalized running total.
pub struct CalculateFitCondValues {
    source: FitRateSource,
}

impl CalculateFitCondValues {
    pub fn new(source: FitRateSource) -> Self {
        Self { source }
    }

    fn rate_inputs(&self, context: &PricingContext) -> Result<RateInputs, StepError> {
        match self.source {
            FitRateSource::UnitLiquidationRates => {
                let calculations = context.premises.iter().map(|premise| &premise.calculation);
                let base_prices: Vec<f64> = calculations.clone().map(|c| c.base_price).collect();
                let min_prices: Vec<f64> = calculations.clone().map(|c| c.min_price).collect();
                let max_prices: Vec<f64> = calculations.map(|c| c.max_price).collect();

                Ok(RateInputs {
                    price_per_sqm: max_of(&base_prices)
                        .filter(|price| price.is_finite())
                        .ok_or_else(|| missing("base_price"))?,
                    min_price_per_sqm: min_of(&min_prices)
                        .filter(|price| price.is_finite())
                        .ok_or_else(|| missing("min_price"))?,
                    max_price_per_sqm: max_of(&max_prices)
                        .filter(|price| price.is_finite())
                        .ok_or_else(|| missing("max_price"))?,
                })
            }
            FitRateSource::OnboardingPrice => {
                let config = context
                    .latest_pricing_config()
                    .ok_or(StepError::MissingPricingConfig)?;
                let static_config = StaticConfig::from_content(&config.content)
                    .ok_or(StepError::IncompleteConfig {
                        section: "staticConfig",
                    })?;
                let onboarding = static_config
                    .onboarding_price_per_sqm()
                    .ok_or_else(|| missing("onboarding_current_price_per_sqm"))?;
                let min_ratio = static_config
                    .minimum_liq_refusal_price()
                    .ok_or_else(|| missing("minimum_liq_refusal_price"))?;
                let max_ratio = static_config
                    .maximum_liq_refusal_price()
                    .ok_or_else(|| missing("maximum_liq_refusal_price"))?;

                Ok(RateInputs {
                    price_per_sqm: static_config
                        .lenient_number("current_price_per_sqm")
                        .ok_or_else(|| missing("current_price_per_sqm"))?,
                    min_price_per_sqm: onboarding * min_ratio,
                    max_price_per_sqm: onboarding * max_ratio,
                })
            }
        }
    }
}

impl PricingStep for CalculateFitCondValues {
    fn name(&self) -> &'static str {
        "CalculateFitCondValues"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let (b_rate_net, t_rate_net) = self.rate_inputs(&context)?.nets();

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
        let Some(med) = median(&values) else {
            return Ok(context);
        };
        let scopes: Vec<f64> = values.iter().map(|value| (value - med).abs()).collect();

        let scope_b = nonzero_or_floor(scopes[0]);
        let scope_t = nonzero_or_floor(scopes[scopes.len() - 1]);
        let b_fit_transform = scope_b / b_rate_net;
        let t_fit_transform = scope_t / t_rate_net;

        debug!(
            source = self.source.label(),
            median = med,
            b_rate_net,
            t_rate_net,
            b_fit_transform,
            t_fit_transform,
            "fit transforms"
        );

        for ((premise, value), scope) in context.premises.iter_mut().zip(values).zip(scopes) {
            let fit = if value <= med {
                1.0 - scope / b_fit_transform
            } else {
                1.0 + scope / t_fit_transform
            };
            premise.calculation.fit_conditional_value = finite_or(fit, DIVISION_FLOOR);
            debug!(
                premises_id = premise.unit.id,
                value,
                scope,
                fit_conditional_value = premise.calculation.fit_conditional_value,
                "fit value assigned"
            );
        }

        Ok(context)
    }
}
