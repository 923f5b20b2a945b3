use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;

use super::repository::{DistributionConfigRepository, RealEstateObjectRepository};
use super::service::PricingService;

/// Router exposing the scoring calculation endpoint.
pub fn scoring_router<R, D>(service: Arc<PricingService<R, D>>) -> Router
where
    R: RealEstateObjectRepository + 'static,
    D: DistributionConfigRepository + 'static,
{
    Router::new()
        .route(
            "/calculate/scoring/:reo_id/:distribution_config_id",
            get(scoring_handler::<R, D>),
        )
        .with_state(service)
}

pub(crate) async fn scoring_handler<R, D>(
    State(service): State<Arc<PricingService<R, D>>>,
    Path((reo_id, distribution_config_id)): Path<(i64, i64)>,
) -> Response
where
    R: RealEstateObjectRepository + 'static,
    D: DistributionConfigRepository + 'static,
{
    match service.calculate_scoring(reo_id, distribution_config_id) {
        Ok(context) => (StatusCode::OK, axum::Json(context)).into_response(),
        Err(err) if err.is_not_found() => {
            let payload = json!({ "message": err.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
