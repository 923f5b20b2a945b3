use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{DistributionConfigRecord, RealEstateObject, RealEstateObjectWithCalculations};
use super::pipeline::{PipelineRun, PipelineSettings, ScoringPipeline};
use super::repository::{DistributionConfigRepository, RealEstateObjectRepository, RepositoryError};

/// Service loading a real-estate object and a distribution config, then running
/// the pricing pipeline over a fresh context.
pub struct PricingService<R, D> {
    objects: Arc<R>,
    distributions: Arc<D>,
    pipeline: Arc<ScoringPipeline>,
}

impl<R, D> PricingService<R, D>
where
    R: RealEstateObjectRepository + 'static,
    D: DistributionConfigRepository + 'static,
{
    pub fn new(objects: Arc<R>, distributions: Arc<D>, settings: PipelineSettings) -> Self {
        Self::with_pipeline(objects, distributions, ScoringPipeline::standard(settings))
    }

    pub fn with_pipeline(objects: Arc<R>, distributions: Arc<D>, pipeline: ScoringPipeline) -> Self {
        Self {
            objects,
            distributions,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Prices every available unit of `reo_id` using the given distribution config.
    pub fn calculate_scoring(
        &self,
        reo_id: i64,
        distribution_config_id: i64,
    ) -> Result<RealEstateObjectWithCalculations, PricingServiceError> {
        let object = self
            .objects
            .fetch_full(reo_id)?
            .ok_or(PricingServiceError::RealEstateObjectNotFound(reo_id))?;
        let distribution = self
            .distributions
            .fetch(distribution_config_id)?
            .ok_or(PricingServiceError::DistributionConfigNotFound(
                distribution_config_id,
            ))?;

        Ok(self.price_object(object, distribution).context)
    }

    /// Runs the pipeline over already-loaded records.
    pub fn price_object(
        &self,
        object: RealEstateObject,
        distribution: DistributionConfigRecord,
    ) -> PipelineRun {
        let reo_id = object.id;
        let context = RealEstateObjectWithCalculations::new(object, distribution);
        let run = self.pipeline.execute(context);

        if run.is_degraded() {
            let steps: Vec<&str> = run.failures.iter().map(|failure| failure.step).collect();
            warn!(reo_id, failed_steps = ?steps, "pricing finished with degraded results");
        } else {
            info!(reo_id, units = run.context.premises.len(), "pricing finished");
        }

        run
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingServiceError {
    #[error("Real estate object with id {0} not found")]
    RealEstateObjectNotFound(i64),
    #[error("Distribution config with id {0} not found")]
    DistributionConfigNotFound(i64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PricingServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RealEstateObjectNotFound(_)
                | Self::DistributionConfigNotFound(_)
                | Self::Repository(RepositoryError::NotFound)
        )
    }
}
