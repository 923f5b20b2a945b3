use tracing::{debug, error, info, warn};

use super::super::distribution::{preset_index, DistributionCurve};
use super::super::domain::PremisesWithCalculation;
use super::super::numeric::{max_of, DIVISION_FLOOR};
use super::super::pipeline::{PricingContext, PricingStep, StepError};
use super::super::ranking::ScoringEngine;
use super::super::rules::PricingRules;
use super::{checked, has_units};

/// Keeps only available units, scores them and sorts them by ascending score.
///
/// Sold units are read as similarity anchors before they are dropped. Without
/// usable scoring rules the available units keep a zero score and input order.
pub struct FilterAndScoreUnits;

fn scoring_engine(
    context: &PricingContext,
    sold: &[PremisesWithCalculation],
) -> Result<ScoringEngine, StepError> {
    let config = context
        .latest_pricing_config()
        .ok_or(StepError::MissingPricingConfig)?;
    let rules = PricingRules::from_content(&config.content)?;
    Ok(ScoringEngine::new(&rules, sold.iter().map(|premise| &premise.unit)))
}

impl PricingStep for FilterAndScoreUnits {
    fn name(&self) -> &'static str {
        "FilterAndScoreUnits"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        let (available, sold): (Vec<PremisesWithCalculation>, Vec<PremisesWithCalculation>) =
            std::mem::take(&mut context.premises)
                .into_iter()
                .filter(|premise| premise.unit.is_available() || premise.unit.is_sold())
                .partition(|premise| premise.unit.is_available());

        if available.is_empty() {
            warn!(reo_id = context.id, "no available premises found");
            return Ok(context);
        }

        let engine = match scoring_engine(&context, &sold) {
            Ok(engine) => engine,
            Err(err) => {
                error!(
                    step = self.name(),
                    reo_id = context.id,
                    error = %err,
                    "scoring rules unusable, available premises stay unscored"
                );
                context.premises = available
                    .into_iter()
                    .map(|mut premise| {
                        premise.calculation.scoring = 0.0;
                        premise
                    })
                    .collect();
                return Ok(context);
            }
        };

        if engine.fields().is_empty() {
            warn!("no important fields selected, every score is 0");
        }

        let mut scored: Vec<PremisesWithCalculation> = available
            .into_iter()
            .map(|mut premise| {
                premise.calculation.scoring = engine.score(&premise.unit);
                debug!(
                    premises_id = premise.unit.id,
                    scoring = premise.calculation.scoring,
                    "unit scored"
                );
                premise
            })
            .collect();

        scored.sort_by(|a, b| a.calculation.scoring.total_cmp(&b.calculation.scoring));

        info!(
            units = scored.len(),
            anchors = sold.len(),
            mode = ?engine.mode(),
            "available premises scored"
        );
        context.premises = scored;
        Ok(context)
    }
}

/// Normalized positions `1/n, 2/n, ..., 1`; a single unit gets `0.0`.
pub fn normalized_ranks(count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (1..=n)
            .map(|rank| {
                let normalized = rank as f64 / n as f64;
                if normalized == 0.0 {
                    DIVISION_FLOOR
                } else {
                    normalized
                }
            })
            .collect(),
    }
}

pub struct CalculateNormalizedRanks;

impl PricingStep for CalculateNormalizedRanks {
    fn name(&self) -> &'static str {
        "CalculateNormalizedRanks"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let ranks = normalized_ranks(context.premises.len());
        for (premise, rank) in context.premises.iter_mut().zip(ranks) {
            premise.calculation.normalized_rank = rank;
            debug!(
                premises_id = premise.unit.id,
                scoring = premise.calculation.scoring,
                normalized_rank = rank,
                "rank normalized"
            );
        }

        Ok(context)
    }
}

/// Scores divided by the highest score; all zero when the highest score is zero.
pub struct CalculateNormalizedScoring;

impl PricingStep for CalculateNormalizedScoring {
    fn name(&self) -> &'static str {
        "CalculateNormalizedScoring"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let scorings: Vec<f64> = context
            .premises
            .iter()
            .map(|premise| checked(premise.calculation.scoring, 0.0, "scoring", premise.unit.id))
            .collect();
        let max_scoring = max_of(&scorings).unwrap_or(0.0);

        if max_scoring == 0.0 {
            warn!("highest score is zero, normalized scoring set to 0");
            for premise in &mut context.premises {
                premise.calculation.normalized_scoring = 0.0;
            }
            return Ok(context);
        }

        for (premise, scoring) in context.premises.iter_mut().zip(scorings) {
            let normalized = scoring / max_scoring;
            let normalized = if normalized.is_nan() || (normalized == 0.0 && scoring != 0.0) {
                warn!(
                    premises_id = premise.unit.id,
                    "normalized scoring underflowed, using {DIVISION_FLOOR}"
                );
                DIVISION_FLOOR
            } else {
                normalized
            };
            premise.calculation.normalized_scoring = normalized;
        }

        Ok(context)
    }
}

/// Samples the distribution curve and maps each unit's rank position onto it.
pub struct CalculatePresetValues;

impl PricingStep for CalculatePresetValues {
    fn name(&self) -> &'static str {
        "CalculatePresetValues"
    }

    fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
        if !has_units(&context, self.name()) {
            return Ok(context);
        }

        let distribution = context
            .distribution_config
            .as_ref()
            .ok_or(StepError::MissingDistributionConfig)?;
        let content_is_empty = distribution.content.is_null()
            || distribution
                .content
                .as_object()
                .is_some_and(|content| content.is_empty());
        if content_is_empty {
            return Err(StepError::InvalidValue {
                field: "distribution_config.content",
                reason: "content is empty".to_string(),
            });
        }

        let curve = DistributionCurve::from_content(&distribution.content);
        let max_rank = context.premises.len();
        let raw = curve.sample(max_rank);
        let last = raw.last().copied().unwrap_or(0.0);

        for premise in &mut context.premises {
            let rank = premise.calculation.normalized_rank;
            let preset_value = preset_index(rank, max_rank, raw.len())
                .map(|index| raw[index])
                .unwrap_or(last);
            premise.calculation.preset_value = preset_value;
            debug!(
                premises_id = premise.unit.id,
                normalized_rank = rank,
                preset_value,
                "preset value assigned"
            );
        }

        Ok(context)
    }
}
