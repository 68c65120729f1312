//! Inference endpoints
//!
//! `POST /lrinfer`, `/cnninfer` and `/rnninfer` share one handler body; only
//! the backend kind differs.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::{error, info};
use uuid::Uuid;

use glyph_common::BackendKind;

use crate::error::{ApiError, ApiResult};
use crate::models::{InferenceRequest, InferenceResponse, MessageResponse};
use crate::AppState;

/// GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Glyph inference API is running".to_string(),
    })
}

/// POST /lrinfer
pub async fn lr_infer(
    State(state): State<AppState>,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> ApiResult<Json<InferenceResponse>> {
    infer(state, BackendKind::Lr, body).await
}

/// POST /cnninfer
pub async fn cnn_infer(
    State(state): State<AppState>,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> ApiResult<Json<InferenceResponse>> {
    infer(state, BackendKind::Cnn, body).await
}

/// POST /rnninfer
pub async fn rnn_infer(
    State(state): State<AppState>,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> ApiResult<Json<InferenceResponse>> {
    infer(state, BackendKind::Rnn, body).await
}

async fn infer(
    state: AppState,
    kind: BackendKind,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> ApiResult<Json<InferenceResponse>> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let request_id = Uuid::new_v4();
    info!(%request_id, model = %kind, "Inference request");

    match state.pipeline.run(kind, request.pixels).await {
        Ok(outcome) => Ok(Json(InferenceResponse {
            label: outcome.label,
            img_name: outcome.img_name,
        })),
        Err(e) => {
            let err = ApiError::from(e);
            error!(%request_id, model = %kind, "{}", err);
            state.record_error(err.to_string()).await;
            Err(err)
        }
    }
}
