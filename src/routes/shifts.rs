use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{Shift, ShiftStatus, WorkArrangement};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::routes::MessageResponse;
use crate::services::calendar;
use crate::services::shifts::{
    CopyShiftRequest, SaveShiftRequest, ShiftInput, ShiftListQuery, ShiftRangeRequest,
    ShiftRangeSummary, ShiftService,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/shift", get(list_shifts).post(save_shift))
        .route("/api/shift/range", post(create_range))
        .route(
            "/api/shift/:id",
            get(get_shift).put(update_shift).delete(delete_shift),
        )
        .route("/api/shift/:id/copy", post(copy_shift))
        .route("/api/shifts/:employee_id/:date", get(employee_day))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A shift with times rendered as `HH:MM` plus the derived display fields.
#[derive(Debug, Serialize)]
pub struct ShiftResponse {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_display: String,
    pub duration_hours: Option<f64>,
    pub qualifies_for_break: bool,
    pub status: ShiftStatus,
    pub role: Option<String>,
    pub work_arrangement: WorkArrangement,
    pub color: String,
    pub notes: Option<String>,
    pub sequence: i64,
    pub template_id: Option<String>,
}

impl From<Shift> for ShiftResponse {
    fn from(shift: Shift) -> Self {
        let duration_hours = match (shift.start_time, shift.end_time) {
            (Some(start), Some(end)) => Some(calendar::duration_hours(start, end)),
            _ => None,
        };

        ShiftResponse {
            time_display: calendar::time_display(shift.start_time, shift.end_time),
            start_time: shift.start_time.map(calendar::format_time),
            end_time: shift.end_time.map(calendar::format_time),
            qualifies_for_break: duration_hours.is_some_and(calendar::qualifies_for_break),
            duration_hours,
            id: shift.id,
            employee_id: shift.employee_id,
            date: shift.date,
            status: shift.status,
            role: shift.role,
            work_arrangement: shift.work_arrangement,
            color: shift.color,
            notes: shift.notes,
            sequence: shift.sequence,
            template_id: shift.template_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShiftEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub shift: ShiftResponse,
}

#[derive(Debug, Serialize)]
pub struct ShiftListResponse {
    pub success: bool,
    pub shifts: Vec<ShiftResponse>,
}

#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: ShiftRangeSummary,
}

fn shift_list(shifts: Vec<Shift>) -> Json<ShiftListResponse> {
    Json(ShiftListResponse {
        success: true,
        shifts: shifts.into_iter().map(ShiftResponse::from).collect(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_shifts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ShiftListQuery>,
) -> AppResult<Json<ShiftListResponse>> {
    let shifts = ShiftService::list(&state, &user, &query).await?;
    Ok(shift_list(shifts))
}

async fn save_shift(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<SaveShiftRequest>,
) -> AppResult<Json<ShiftEnvelope>> {
    let updating = request
        .shift_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    let shift = ShiftService::save(&state, &user, &request).await?;

    Ok(Json(ShiftEnvelope {
        success: true,
        message: Some(if updating {
            "Shift updated".to_string()
        } else {
            "Shift created".to_string()
        }),
        shift: shift.into(),
    }))
}

async fn create_range(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ShiftRangeRequest>,
) -> AppResult<Json<RangeResponse>> {
    let summary = ShiftService::create_range(&state, &user, &request).await?;

    Ok(Json(RangeResponse {
        success: true,
        message: format!(
            "Created {} shift(s), skipped {}",
            summary.created, summary.skipped
        ),
        summary,
    }))
}

async fn get_shift(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ShiftEnvelope>> {
    let shift = ShiftService::get(&state, &user, &id).await?;
    Ok(Json(ShiftEnvelope {
        success: true,
        message: None,
        shift: shift.into(),
    }))
}

async fn update_shift(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ShiftInput>,
) -> AppResult<Json<ShiftEnvelope>> {
    let shift = ShiftService::update(&state, &user, &id, &input).await?;
    Ok(Json(ShiftEnvelope {
        success: true,
        message: Some("Shift updated".to_string()),
        shift: shift.into(),
    }))
}

async fn delete_shift(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    ShiftService::delete(&state, &user, &id).await?;
    Ok(Json(MessageResponse::new("Shift deleted")))
}

async fn copy_shift(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<CopyShiftRequest>,
) -> AppResult<Json<ShiftEnvelope>> {
    let shift = ShiftService::copy(&state, &user, &id, &request).await?;
    Ok(Json(ShiftEnvelope {
        success: true,
        message: Some("Shift copied".to_string()),
        shift: shift.into(),
    }))
}

#[derive(Debug, Deserialize)]
struct EmployeeDayPath {
    employee_id: String,
    date: String,
}

async fn employee_day(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(path): Path<EmployeeDayPath>,
) -> AppResult<Json<ShiftListResponse>> {
    let shifts =
        ShiftService::list_for_employee_on_date(&state, &user, &path.employee_id, &path.date)
            .await?;
    Ok(shift_list(shifts))
}
