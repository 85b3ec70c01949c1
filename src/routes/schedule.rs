use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::DateRemark;
use crate::error::AppResult;
use crate::routes::auth::{AuthUser, EmployeeResponse};
use crate::routes::shifts::ShiftResponse;
use crate::services::calendar::{self, ViewType};
use crate::services::schedule::{ScheduleService, ViewQuery, WeeklyStats};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/view", get(view))
        .route("/api/stats", get(stats))
        .route("/export", get(export))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub success: bool,
    pub view: ViewType,
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub date_range: String,
    pub dates: Vec<NaiveDate>,
    pub employees: Vec<EmployeeResponse>,
    /// employee id -> ISO date -> shifts
    pub grid: BTreeMap<String, BTreeMap<String, Vec<ShiftResponse>>>,
    pub remarks: BTreeMap<String, DateRemark>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: WeeklyStats,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn view(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ViewQuery>,
) -> AppResult<Json<ViewResponse>> {
    let schedule = ScheduleService::view(&state, &user, &query).await?;

    let grid: BTreeMap<String, BTreeMap<String, Vec<ShiftResponse>>> = schedule
        .grid
        .into_iter()
        .map(|(employee_id, days)| {
            let days: BTreeMap<String, Vec<ShiftResponse>> = days
                .into_iter()
                .map(|(date, shifts)| {
                    (
                        date.to_string(),
                        shifts.into_iter().map(ShiftResponse::from).collect(),
                    )
                })
                .collect();
            (employee_id, days)
        })
        .collect();

    Ok(Json(ViewResponse {
        success: true,
        view: schedule.view,
        date: schedule.date,
        start_date: schedule.start,
        end_date: schedule.end,
        date_range: calendar::format_date_range(schedule.start, schedule.end),
        dates: schedule.dates,
        employees: schedule
            .employees
            .into_iter()
            .map(EmployeeResponse::from)
            .collect(),
        grid,
        remarks: schedule
            .remarks
            .into_iter()
            .map(|(date, remark)| (date.to_string(), remark))
            .collect(),
    }))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<StatsResponse>> {
    let stats = ScheduleService::weekly_stats(&state, &user, query.date.as_deref()).await?;
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

async fn export(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let export = ScheduleService::export_csv(
        &state,
        &user,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.body,
    )
        .into_response())
}
