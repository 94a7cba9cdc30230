use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::orchestrator::{AnalysisRequest, RunControl};
use super::service::EligibilityService;
use crate::error::AppError;
use crate::workflows::reference::ReferenceDataSource;

/// Router builder exposing population analysis and single-postcode checks.
pub fn eligibility_router<S>(service: Arc<EligibilityService<S>>) -> Router
where
    S: ReferenceDataSource + 'static,
{
    Router::new()
        .route("/api/v1/eligibility/analysis", post(analysis_handler::<S>))
        .route(
            "/api/v1/eligibility/postcodes/:postcode",
            get(postcode_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn analysis_handler<S>(
    State(service): State<Arc<EligibilityService<S>>>,
    Json(request): Json<AnalysisRequest>,
) -> Response
where
    S: ReferenceDataSource + 'static,
{
    let control = RunControl::default();
    // A dropped request future means the client disconnected; stop the workers too.
    let _cancel_on_disconnect = control.cancellation.drop_guard();

    match service.analyze(request, control).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub(crate) async fn postcode_handler<S>(
    State(service): State<Arc<EligibilityService<S>>>,
    Path(postcode): Path<String>,
) -> Response
where
    S: ReferenceDataSource + 'static,
{
    match service.check_postcode(&postcode).await {
        Ok(check) => (StatusCode::OK, Json(check)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
