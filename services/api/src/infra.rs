use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use unit_pricing::error::AppError;
use unit_pricing::workflows::pricing::{
    DistributionConfigRecord, DistributionConfigRepository, RealEstateObject,
    RealEstateObjectRepository, RepositoryError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryObjectRepository {
    objects: Arc<Mutex<HashMap<i64, RealEstateObject>>>,
}

impl InMemoryObjectRepository {
    pub(crate) fn insert(&self, object: RealEstateObject) -> Result<(), RepositoryError> {
        let mut guard = self
            .objects
            .lock()
            .map_err(|_| RepositoryError::Unavailable("object store poisoned".to_string()))?;
        guard.insert(object.id, object);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl RealEstateObjectRepository for InMemoryObjectRepository {
    fn fetch_full(&self, reo_id: i64) -> Result<Option<RealEstateObject>, RepositoryError> {
        let guard = self
            .objects
            .lock()
            .map_err(|_| RepositoryError::Unavailable("object store poisoned".to_string()))?;
        Ok(guard.get(&reo_id).filter(|object| !object.is_deleted).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDistributionRepository {
    configs: Arc<Mutex<HashMap<i64, DistributionConfigRecord>>>,
}

impl InMemoryDistributionRepository {
    pub(crate) fn insert(&self, config: DistributionConfigRecord) -> Result<(), RepositoryError> {
        let mut guard = self.configs.lock().map_err(|_| {
            RepositoryError::Unavailable("distribution store poisoned".to_string())
        })?;
        guard.insert(config.id, config);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.configs.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl DistributionConfigRepository for InMemoryDistributionRepository {
    fn fetch(&self, config_id: i64) -> Result<Option<DistributionConfigRecord>, RepositoryError> {
        let guard = self.configs.lock().map_err(|_| {
            RepositoryError::Unavailable("distribution store poisoned".to_string())
        })?;
        Ok(guard.get(&config_id).cloned())
    }
}

/// Contents of the `APP_SEED_PATH` file.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SeedData {
    #[serde(default)]
    pub(crate) objects: Vec<RealEstateObject>,
    #[serde(default)]
    pub(crate) distribution_configs: Vec<DistributionConfigRecord>,
}

impl SeedData {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub(crate) fn into_repositories(
        self,
    ) -> Result<(InMemoryObjectRepository, InMemoryDistributionRepository), AppError> {
        let objects = InMemoryObjectRepository::default();
        let distributions = InMemoryDistributionRepository::default();

        for object in self.objects {
            objects.insert(object).map_err(repository_error)?;
        }
        for config in self.distribution_configs {
            distributions.insert(config).map_err(repository_error)?;
        }

        Ok((objects, distributions))
    }
}

fn repository_error(err: RepositoryError) -> AppError {
    AppError::Pricing(err.into())
}

pub(crate) fn read_json<T>(path: &Path) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned,
{
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Input(format!("{}: {}", path.display(), err)))
}
