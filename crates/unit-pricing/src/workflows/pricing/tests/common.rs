use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::{json, Value};

use crate::workflows::pricing::domain::{
    DistributionConfigRecord, Premises, PricingConfigRecord, RealEstateObject, STATUS_AVAILABLE,
    STATUS_SOLD,
};
use crate::workflows::pricing::repository::{
    DistributionConfigRepository, RealEstateObjectRepository, RepositoryError,
};
use crate::workflows::pricing::{PipelineSettings, PricingService, RealEstateObjectWithCalculations};

pub(super) const REO_ID: i64 = 11;
pub(super) const UNIFORM_ID: i64 = 3;

pub(super) fn pricing_content() -> Value {
    json!({
        "staticConfig": {
            "current_price_per_sqm": 1000,
            "minimum_liq_refusal_price": 0.9,
            "maximum_liq_refusal_price": 1.1,
            "bargainGap": 0
        },
        "dynamicConfig": {
            "importantFields": { "floor": true },
            "weights": { "floor": 1.0 }
        },
        "ranging": {
            "floor": [
                { "priority": 1, "values": ["1"] },
                { "priority": 2, "values": ["2"] }
            ]
        }
    })
}

pub(super) fn unit(id: i64, floor: i64, area: f64, status: &str) -> Premises {
    Premises {
        id,
        reo_id: REO_ID,
        premises_id: format!("U-{id:03}"),
        number_of_unit: id,
        number: id,
        entrance: "1".to_string(),
        floor,
        layout_type: "1k".to_string(),
        property_type: "flat".to_string(),
        total_area_m2: area,
        estimated_area_m2: area,
        number_of_rooms: 1,
        status: status.to_string(),
        ..Premises::default()
    }
}

/// Three available units on floors 1-3 with 50/60/70 m2.
pub(super) fn scenario_object(with_sold: bool) -> RealEstateObject {
    let mut premises = vec![
        unit(1, 1, 50.0, STATUS_AVAILABLE),
        unit(2, 2, 60.0, STATUS_AVAILABLE),
        unit(3, 3, 70.0, STATUS_AVAILABLE),
    ];
    if with_sold {
        premises.push(unit(4, 1, 55.0, STATUS_SOLD));
    }

    RealEstateObject {
        id: REO_ID,
        name: "Riverside".to_string(),
        premises,
        pricing_configs: vec![PricingConfigRecord {
            id: 1,
            is_active: true,
            reo_id: REO_ID,
            content: pricing_content(),
            ..PricingConfigRecord::default()
        }],
        ..RealEstateObject::default()
    }
}

pub(super) fn uniform_distribution() -> DistributionConfigRecord {
    DistributionConfigRecord {
        id: UNIFORM_ID,
        func_name: "Uniform".to_string(),
        content: json!({ "function_type": "Uniform" }),
        is_active: true,
        ..DistributionConfigRecord::default()
    }
}

pub(super) fn scenario_context(with_sold: bool) -> RealEstateObjectWithCalculations {
    RealEstateObjectWithCalculations::new(scenario_object(with_sold), uniform_distribution())
}

#[derive(Default, Clone)]
pub(super) struct MemoryObjects {
    objects: Arc<Mutex<HashMap<i64, RealEstateObject>>>,
}

impl MemoryObjects {
    pub(super) fn insert(&self, object: RealEstateObject) {
        self.objects
            .lock()
            .expect("object mutex poisoned")
            .insert(object.id, object);
    }
}

impl RealEstateObjectRepository for MemoryObjects {
    fn fetch_full(&self, reo_id: i64) -> Result<Option<RealEstateObject>, RepositoryError> {
        let guard = self.objects.lock().expect("object mutex poisoned");
        Ok(guard.get(&reo_id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDistributions {
    configs: Arc<Mutex<HashMap<i64, DistributionConfigRecord>>>,
}

impl MemoryDistributions {
    pub(super) fn insert(&self, config: DistributionConfigRecord) {
        self.configs
            .lock()
            .expect("distribution mutex poisoned")
            .insert(config.id, config);
    }
}

impl DistributionConfigRepository for MemoryDistributions {
    fn fetch(&self, config_id: i64) -> Result<Option<DistributionConfigRecord>, RepositoryError> {
        let guard = self.configs.lock().expect("distribution mutex poisoned");
        Ok(guard.get(&config_id).cloned())
    }
}

pub(super) struct UnavailableObjects;

impl RealEstateObjectRepository for UnavailableObjects {
    fn fetch_full(&self, _reo_id: i64) -> Result<Option<RealEstateObject>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_service() -> (
    PricingService<MemoryObjects, MemoryDistributions>,
    Arc<MemoryObjects>,
    Arc<MemoryDistributions>,
) {
    let objects = Arc::new(MemoryObjects::default());
    let distributions = Arc::new(MemoryDistributions::default());
    objects.insert(scenario_object(false));
    distributions.insert(uniform_distribution());

    let service = PricingService::new(
        objects.clone(),
        distributions.clone(),
        PipelineSettings::default(),
    );
    (service, objects, distributions)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_approx(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} within {tolerance}, got {actual}"
    );
}

pub(super) fn assert_all_finite(context: &RealEstateObjectWithCalculations) {
    for premise in &context.premises {
        for (field, value) in premise.calculation.fields() {
            assert!(
                value.is_finite(),
                "premises {} has non-finite {field}: {value}",
                premise.unit.id
            );
        }
    }
}
