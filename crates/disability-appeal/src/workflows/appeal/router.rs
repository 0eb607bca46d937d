use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, warn};

use super::delivery::{LeadWebhook, Mailer};
use super::domain::{AppealId, AppealSubmission};
use super::repository::AppealRepository;
use super::service::{AppealIntakeService, SubmissionError};
use super::validation::ValidationErrors;

/// Router builder exposing the appeal intake and lookup endpoints.
pub fn appeal_router<R, M, W>(service: Arc<AppealIntakeService<R, M, W>>) -> Router
where
    R: AppealRepository + 'static,
    M: Mailer + 'static,
    W: LeadWebhook + 'static,
{
    Router::new()
        .route("/api/disability-appeal", post(submit_handler::<R, M, W>))
        .route(
            "/api/disability-appeal/:appeal_id",
            get(fetch_handler::<R, M, W>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<R, M, W>(
    State(service): State<Arc<AppealIntakeService<R, M, W>>>,
    payload: Result<Json<AppealSubmission>, JsonRejection>,
) -> Response
where
    R: AppealRepository + 'static,
    M: Mailer + 'static,
    W: LeadWebhook + 'static,
{
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            let errors = ValidationErrors::single("body", rejection.body_text());
            return validation_response(errors);
        }
    };

    match service.submit(submission).await {
        Ok(report) => {
            let payload = json!({
                "message": "Disability appeal submitted successfully",
                "data": report.record,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(SubmissionError::Validation(errors)) => validation_response(errors),
        Err(SubmissionError::Persistence(err)) => {
            error!(error = %err, "error saving disability appeal");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn fetch_handler<R, M, W>(
    State(service): State<Arc<AppealIntakeService<R, M, W>>>,
    Path(appeal_id): Path<String>,
) -> Response
where
    R: AppealRepository + 'static,
    M: Mailer + 'static,
    W: LeadWebhook + 'static,
{
    let id = AppealId(appeal_id);
    match service.get(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({ "error": format!("appeal {id} not found") });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => {
            error!(appeal_id = %id, error = %err, "error loading disability appeal");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn validation_response(errors: ValidationErrors) -> Response {
    warn!(violations = errors.errors.len(), "disability appeal rejected");
    (StatusCode::BAD_REQUEST, Json(errors)).into_response()
}
