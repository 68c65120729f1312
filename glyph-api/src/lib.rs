//! glyph-api library
//!
//! HTTP front end for handwritten character recognition. Each request is
//! persisted as a 28x28 PNG artifact, classified by an external backend
//! process, and logged to a CSV ledger that users can annotate with feedback.

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod error;
pub mod invoker;
pub mod ledger;
pub mod models;
pub mod pipeline;

pub use error::{ApiError, ApiResult};
pub use invoker::{BackendInvoker, BackendSpec, InvokeError};
pub use ledger::{InferenceResult, LedgerError, ResultLedger};
pub use pipeline::{InferenceOutcome, InferencePipeline, PipelineError};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Most recent request failure, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: InferencePipeline, allowed_origins: Vec<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            allowed_origins,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/", get(api::root))
        .route("/lrinfer", post(api::lr_infer))
        .route("/cnninfer", post(api::cnn_infer))
        .route("/rnninfer", post(api::rnn_infer))
        .route("/feedback", post(api::submit_feedback))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Origin allow-list with credentials; methods and headers are mirrored
/// from the preflight request
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
