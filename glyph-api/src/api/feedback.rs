//! Feedback endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::models::{FeedbackRequest, FeedbackResponse};
use crate::AppState;

/// POST /feedback
///
/// Acknowledged even when no ledger row matches `img_name`.
pub async fn submit_feedback(
    State(state): State<AppState>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<Json<FeedbackResponse>> {
    let Json(entry) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if let Err(e) = state
        .pipeline
        .feedback(&entry.img_name, &entry.user_feedback)
        .await
    {
        let err = ApiError::from(e);
        error!(img_name = %entry.img_name, "{}", err);
        state.record_error(err.to_string()).await;
        return Err(err);
    }

    Ok(Json(FeedbackResponse::recorded()))
}
