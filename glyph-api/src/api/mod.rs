//! HTTP API handlers for glyph-api

pub mod buildinfo;
pub mod feedback;
pub mod health;
pub mod inference;

pub use buildinfo::get_build_info;
pub use feedback::submit_feedback;
pub use health::health_routes;
pub use inference::{cnn_infer, lr_infer, rnn_infer, root};
