//! Per-unit pricing for a real-estate object.
//!
//! A fresh [`PricingContext`] is built from the stored object and the chosen
//! distribution config, then threaded through [`ScoringPipeline::standard`]:
//! liquidation bounds first, then scoring of available units against the
//! `ranging` buckets, the distribution-weighted running totals, and finally the
//! conditional costs and clamped final prices.

pub mod distribution;
pub mod domain;
mod numeric;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;
pub mod steps;

#[cfg(test)]
mod tests;

pub use distribution::DistributionCurve;
pub use domain::{
    ConfigStatus, DistributionConfigRecord, IncomePlan, Premises, PremisesWithCalculation,
    PricingConfigRecord, RealEstateObject, RealEstateObjectWithCalculations, StatusMapping,
    UnitCalculation, STATUS_AVAILABLE, STATUS_SOLD,
};
pub use numeric::DIVISION_FLOOR;
pub use pipeline::{
    PipelineRun, PipelineSettings, PricingContext, PricingStep, ScoringPipeline, StepError,
    StepFailure,
};
pub use ranking::{ScoringEngine, ScoringField, ScoringMode};
pub use report::PricingSummary;
pub use repository::{DistributionConfigRepository, RealEstateObjectRepository, RepositoryError};
pub use router::scoring_router;
pub use rules::{ranging_from_suggestions, PricingRules, PriorityBucket, RankedLabel};
pub use service::{PricingService, PricingServiceError};
pub use steps::FitRateSource;
