use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::DateRemark;
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::routes::MessageResponse;
use crate::services::date_remarks::{
    preset_holidays, DateRemarkService, PresetHoliday, PresetSummary, RemarkInput,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/date-remarks", get(list_remarks).post(save_remark))
        .route("/api/date-remarks/date/:date", get(remark_for_date))
        .route("/api/date-remarks/:id", delete(delete_remark))
        .route("/api/holidays/preset", get(list_preset))
        .route("/api/holidays/apply-preset", post(apply_preset))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RemarkRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemarkListResponse {
    pub success: bool,
    pub remarks: Vec<DateRemark>,
}

#[derive(Debug, Serialize)]
pub struct RemarkResponse {
    pub success: bool,
    pub remark: Option<DateRemark>,
}

#[derive(Debug, Serialize)]
pub struct PresetResponse {
    pub success: bool,
    pub holidays: Vec<PresetHoliday>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyPresetRequest {
    pub year: i32,
    /// Custom holiday list; the built-in preset when absent.
    pub holidays: Option<Vec<PresetHoliday>>,
}

#[derive(Debug, Serialize)]
pub struct ApplyPresetResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: PresetSummary,
}

// ============================================================================
// Date remark handlers
// ============================================================================

async fn list_remarks(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(query): Query<RemarkRangeQuery>,
) -> AppResult<Json<RemarkListResponse>> {
    let remarks = DateRemarkService::list(
        &state,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )
    .await?;

    Ok(Json(RemarkListResponse {
        success: true,
        remarks,
    }))
}

async fn remark_for_date(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(date): Path<String>,
) -> AppResult<Json<RemarkResponse>> {
    let remark = DateRemarkService::get_by_date(&state, &date).await?;
    Ok(Json(RemarkResponse {
        success: true,
        remark,
    }))
}

async fn save_remark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<RemarkInput>,
) -> AppResult<Json<RemarkResponse>> {
    let remark = DateRemarkService::upsert(&state, &user, &input).await?;
    Ok(Json(RemarkResponse {
        success: true,
        remark: Some(remark),
    }))
}

async fn delete_remark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    DateRemarkService::delete(&state, &user, &id).await?;
    Ok(Json(MessageResponse::new("Date remark deleted")))
}

// ============================================================================
// Holiday preset handlers
// ============================================================================

async fn list_preset(AuthUser(_user): AuthUser) -> AppResult<Json<PresetResponse>> {
    Ok(Json(PresetResponse {
        success: true,
        holidays: preset_holidays(),
    }))
}

async fn apply_preset(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ApplyPresetRequest>,
) -> AppResult<Json<ApplyPresetResponse>> {
    let summary =
        DateRemarkService::apply_preset(&state, &user, request.year, request.holidays).await?;

    Ok(Json(ApplyPresetResponse {
        success: true,
        message: format!(
            "Applied {} holiday(s) for {}",
            summary.applied, request.year
        ),
        summary,
    }))
}
