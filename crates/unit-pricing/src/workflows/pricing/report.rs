use serde::Serialize;

use super::domain::RealEstateObjectWithCalculations;

const BOUND_TOLERANCE: f64 = 1e-9;

/// Aggregate view over a priced real-estate object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PricingSummary {
    pub reo_id: i64,
    pub priced_units: usize,
    pub total_area_m2: f64,
    /// Sum of `final_price * total_area_m2` over priced units.
    pub estimated_revenue: f64,
    pub average_final_price: f64,
    pub lowest_final_price: Option<f64>,
    pub highest_final_price: Option<f64>,
    pub units_at_min_price: usize,
    pub units_at_max_price: usize,
}

impl PricingSummary {
    pub fn from_context(context: &RealEstateObjectWithCalculations) -> Self {
        let mut summary = Self {
            reo_id: context.id,
            priced_units: context.premises.len(),
            ..Self::default()
        };

        for premise in &context.premises {
            let calculation = &premise.calculation;
            let price = calculation.final_price;

            summary.total_area_m2 += premise.unit.total_area_m2;
            summary.estimated_revenue += price * premise.unit.total_area_m2;
            summary.lowest_final_price = Some(
                summary
                    .lowest_final_price
                    .map_or(price, |lowest| lowest.min(price)),
            );
            summary.highest_final_price = Some(
                summary
                    .highest_final_price
                    .map_or(price, |highest| highest.max(price)),
            );

            if (price - calculation.min_price).abs() <= BOUND_TOLERANCE {
                summary.units_at_min_price += 1;
            } else if (price - calculation.max_price).abs() <= BOUND_TOLERANCE {
                summary.units_at_max_price += 1;
            }
        }

        if summary.priced_units > 0 {
            let total: f64 = context
                .premises
                .iter()
                .map(|premise| premise.calculation.final_price)
                .sum();
            summary.average_final_price = total / summary.priced_units as f64;
        }

        summary
    }

    pub fn units_on_bounds(&self) -> usize {
        self.units_at_min_price + self.units_at_max_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::pricing::domain::{Premises, PremisesWithCalculation};

    fn priced(area: f64, price: f64, bounds: (f64, f64)) -> PremisesWithCalculation {
        let mut premise = PremisesWithCalculation::from(Premises {
            total_area_m2: area,
            ..Premises::default()
        });
        premise.calculation.final_price = price;
        premise.calculation.min_price = bounds.0;
        premise.calculation.max_price = bounds.1;
        premise
    }

    #[test]
    fn summary_aggregates_priced_units() {
        let context = RealEstateObjectWithCalculations {
            id: 4,
            premises: vec![
                priced(50.0, 900.0, (900.0, 1100.0)),
                priced(60.0, 1000.0, (900.0, 1100.0)),
                priced(70.0, 1100.0, (900.0, 1100.0)),
            ],
            ..RealEstateObjectWithCalculations::default()
        };

        let summary = PricingSummary::from_context(&context);

        assert_eq!(summary.priced_units, 3);
        assert_eq!(summary.total_area_m2, 180.0);
        assert_eq!(summary.estimated_revenue, 45_000.0 + 60_000.0 + 77_000.0);
        assert_eq!(summary.average_final_price, 1000.0);
        assert_eq!(summary.lowest_final_price, Some(900.0));
        assert_eq!(summary.highest_final_price, Some(1100.0));
        assert_eq!(summary.units_on_bounds(), 2);
    }

    #[test]
    fn empty_context_has_no_price_range() {
        let summary = PricingSummary::from_context(&RealEstateObjectWithCalculations::default());
        assert_eq!(summary.priced_units, 0);
        assert_eq!(summary.lowest_final_price, None);
        assert_eq!(summary.average_final_price, 0.0);
    }
}
