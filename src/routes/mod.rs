//! HTTP surface. Each module exposes a `router()` whose paths are relative
//! to the prefix it is nested under.

use std::sync::Arc;

use axum::{routing::get, Router};
use serde::Serialize;

use crate::AppState;

pub mod admin;
pub mod auth;
pub mod date_remarks;
pub mod health;
pub mod leave;
pub mod schedule;
pub mod shifts;
pub mod templates;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            success: true,
            message: message.into(),
        }
    }
}

/// Everything served under `/schedule`.
pub fn schedule_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(schedule::router())
        .merge(shifts::router())
        .merge(date_remarks::router())
        .merge(templates::router())
        .merge(leave::router())
}

/// All routes except `/api/auth`, which the caller nests with its own
/// rate limiting layer.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/schedule", schedule_router())
        .nest("/admin/api", admin::router())
}
