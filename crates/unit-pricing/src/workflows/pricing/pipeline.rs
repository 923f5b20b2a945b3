use serde::Serialize;
use tracing::{debug, error, info};

use super::domain::RealEstateObjectWithCalculations;
use super::steps::{
    CalculateActualCosts, CalculateActualPricePerSqm, CalculateBasePrice,
    CalculateConditionalCosts, CalculateFinalPrice, CalculateFitCondValues,
    CalculateFitSpreadRate, CalculateMinMaxPrice, CalculateMinMaxRate, CalculateMixedScoring,
    CalculateNormalizedRanks, CalculateNormalizedRunningTotal, CalculateNormalizedScoring,
    CalculatePresetValues, CalculateRunningTotalMixedScoring, CalculateScope, CalculateSpread,
    FilterAndScoreUnits, FitRateSource,
};

/// The value threaded through every pricing step.
pub type PricingContext = RealEstateObjectWithCalculations;

/// Why a step gave up on the whole context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("real-estate object has no pricing config")]
    MissingPricingConfig,
    #[error("pricing config section `{section}` is missing or empty")]
    IncompleteConfig { section: &'static str },
    #[error("pricing config section `{section}` is malformed: {reason}")]
    MalformedConfig {
        section: &'static str,
        reason: String,
    },
    #[error("invalid `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("no distribution config attached to the context")]
    MissingDistributionConfig,
}

/// One transformation over the pricing context.
///
/// Steps take the context by value and hand it back on success. An `Err`
/// discards whatever the step did; the pipeline keeps the context it had before.
pub trait PricingStep: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, context: PricingContext) -> Result<PricingContext, StepError>;
}

/// Knobs that change how the standard step list is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    pub fit_rate_source: FitRateSource,
}

/// A step that failed during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: String,
}

/// Result of a full pipeline run: the final context plus every step that failed.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub context: PricingContext,
    pub failures: Vec<StepFailure>,
}

impl PipelineRun {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Ordered list of steps run fail-open over a single context.
pub struct ScoringPipeline {
    steps: Vec<Box<dyn PricingStep>>,
}

impl ScoringPipeline {
    pub fn new(steps: Vec<Box<dyn PricingStep>>) -> Self {
        Self { steps }
    }

    /// The production step order.
    pub fn standard(settings: PipelineSettings) -> Self {
        Self::new(vec![
            Box::new(CalculateBasePrice),
            Box::new(CalculateMinMaxRate),
            Box::new(CalculateMinMaxPrice),
            Box::new(CalculateSpread),
            Box::new(FilterAndScoreUnits),
            Box::new(CalculateNormalizedRanks),
            Box::new(CalculateNormalizedScoring),
            Box::new(CalculatePresetValues),
            Box::new(CalculateMixedScoring),
            Box::new(CalculateRunningTotalMixedScoring),
            Box::new(CalculateNormalizedRunningTotal),
            Box::new(CalculateScope),
            Box::new(CalculateFitSpreadRate),
            Box::new(CalculateFitCondValues::new(settings.fit_rate_source)),
            Box::new(CalculateConditionalCosts),
            Box::new(CalculateActualCosts),
            Box::new(CalculateActualPricePerSqm),
            Box::new(CalculateFinalPrice),
        ])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs every step in order. A failing step is logged and recorded, and the
    /// next step receives the context as it was before the failure.
    pub fn execute(&self, context: PricingContext) -> PipelineRun {
        let mut context = context;
        let mut failures = Vec::new();

        for step in &self.steps {
            let snapshot = context.clone();
            match step.apply(context) {
                Ok(next) => {
                    debug!(step = step.name(), units = next.premises.len(), "step completed");
                    context = next;
                }
                Err(err) => {
                    error!(step = step.name(), error = %err, "pricing step failed");
                    failures.push(StepFailure {
                        step: step.name(),
                        error: err.to_string(),
                    });
                    context = snapshot;
                }
            }
        }

        info!(
            reo_id = context.id,
            units = context.premises.len(),
            failed_steps = failures.len(),
            "pricing pipeline finished"
        );

        PipelineRun { context, failures }
    }

    pub fn run(&self, context: PricingContext) -> PricingContext {
        self.execute(context).context
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::standard(PipelineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rename(&'static str);

    impl PricingStep for Rename {
        fn name(&self) -> &'static str {
            "Rename"
        }

        fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
            context.name = self.0.to_string();
            Ok(context)
        }
    }

    struct Broken;

    impl PricingStep for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        fn apply(&self, mut context: PricingContext) -> Result<PricingContext, StepError> {
            context.name = "half-written".to_string();
            Err(StepError::MissingPricingConfig)
        }
    }

    #[test]
    fn failing_step_keeps_previous_context_and_continues() {
        let pipeline = ScoringPipeline::new(vec![
            Box::new(Rename("first")),
            Box::new(Broken),
            Box::new(Rename("last")),
        ]);

        let run = pipeline.execute(PricingContext::default());

        assert_eq!(run.context.name, "last");
        assert!(run.is_degraded());
        assert_eq!(
            run.failures,
            vec![StepFailure {
                step: "Broken",
                error: StepError::MissingPricingConfig.to_string(),
            }]
        );
    }

    #[test]
    fn failure_rolls_back_partial_writes() {
        let pipeline = ScoringPipeline::new(vec![Box::new(Rename("kept")), Box::new(Broken)]);
        assert_eq!(pipeline.run(PricingContext::default()).name, "kept");
    }

    #[test]
    fn standard_order_runs_bounds_before_scoring() {
        let names = ScoringPipeline::default().step_names();

        assert_eq!(names.len(), 18);
        assert_eq!(names.first(), Some(&"CalculateBasePrice"));
        assert_eq!(names[4], "FilterAndScoreUnits");
        assert_eq!(names.last(), Some(&"CalculateFinalPrice"));
    }
}
