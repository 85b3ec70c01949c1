use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::models::LeaveRequest;
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::leave::{LeaveInput, LeaveService, ReviewInput};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leave", get(my_requests).post(submit_request))
        .route("/api/leave/pending", get(pending_requests))
        .route("/api/leave/:id", get(get_request))
        .route("/api/leave/:id/approve", post(approve_request))
        .route("/api/leave/:id/disapprove", post(disapprove_request))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LeaveListResponse {
    pub success: bool,
    pub requests: Vec<LeaveRequest>,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub success: bool,
    pub request: LeaveRequest,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub message: String,
    pub request: LeaveRequest,
    pub shifts_written: usize,
}

// ============================================================================
// Handlers
// ============================================================================

async fn my_requests(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<LeaveListResponse>> {
    let requests = LeaveService::list_mine(&state, &user).await?;
    Ok(Json(LeaveListResponse {
        success: true,
        requests,
    }))
}

async fn submit_request(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<LeaveInput>,
) -> AppResult<Json<LeaveResponse>> {
    let request = LeaveService::submit(&state, &user, &input).await?;
    Ok(Json(LeaveResponse {
        success: true,
        request,
    }))
}

async fn pending_requests(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<LeaveListResponse>> {
    let requests = LeaveService::list_pending(&state, &user).await?;
    Ok(Json(LeaveListResponse {
        success: true,
        requests,
    }))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<LeaveResponse>> {
    let request = LeaveService::get(&state, &user, &id).await?;
    Ok(Json(LeaveResponse {
        success: true,
        request,
    }))
}

async fn approve_request(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<Json<ReviewResponse>> {
    let outcome = LeaveService::approve(&state, &user, &id, &input).await?;
    Ok(Json(ReviewResponse {
        success: true,
        message: format!(
            "Leave approved; {} day(s) added to the schedule",
            outcome.shifts_written
        ),
        request: outcome.request,
        shifts_written: outcome.shifts_written,
    }))
}

async fn disapprove_request(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<Json<ReviewResponse>> {
    let request = LeaveService::disapprove(&state, &user, &id, &input).await?;
    Ok(Json(ReviewResponse {
        success: true,
        message: "Leave request rejected".to_string(),
        request,
        shifts_written: 0,
    }))
}
