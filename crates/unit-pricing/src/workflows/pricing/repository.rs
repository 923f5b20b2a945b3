use super::domain::{DistributionConfigRecord, RealEstateObject};

/// Read access to real-estate objects with all their related records loaded.
pub trait RealEstateObjectRepository: Send + Sync {
    fn fetch_full(&self, reo_id: i64) -> Result<Option<RealEstateObject>, RepositoryError>;
}

/// Read access to stored distribution configs.
pub trait DistributionConfigRepository: Send + Sync {
    fn fetch(&self, config_id: i64) -> Result<Option<DistributionConfigRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
