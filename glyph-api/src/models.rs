//! Request and response bodies

use serde::{Deserialize, Serialize};

/// Body of `/lrinfer`, `/cnninfer` and `/rnninfer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// 784 values in [0,1], row-major 28x28
    pub pixels: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub label: String,
    pub img_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub img_name: String,
    pub user_feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub status: String,
}

impl FeedbackResponse {
    pub fn recorded() -> Self {
        Self {
            status: "feedback recorded".to_string(),
        }
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
