use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::db::models::{ScheduleTemplate, ScopeType, TemplateData, UpdateScheduleTemplate};
use crate::error::{AppErrorWithDetails, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::MessageResponse;
use crate::services::templates::{
    template_data, ApplyRequest, ApplySummary, CreateTemplateRequest, DuplicateRequest,
    PreviewSummary, SnapshotRequest, TemplateService,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/create-snapshot", post(create_snapshot))
        .route(
            "/api/templates/:id",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route("/api/templates/:id/apply", post(apply_template))
        .route("/api/templates/:id/preview", post(preview_template))
        .route("/api/templates/:id/duplicate", post(duplicate_template))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_days: i64,
    pub source_start_date: Option<NaiveDate>,
    pub source_end_date: Option<NaiveDate>,
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub is_public: bool,
    pub created_by: String,
    pub usage_count: i64,
    pub last_used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub employee_count: usize,
    pub shift_count: usize,
    /// Full roster and shift set; only on single-template responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_data: Option<TemplateData>,
}

impl TemplateResponse {
    fn build(template: ScheduleTemplate, with_data: bool) -> AppResult<Self> {
        let data = template_data(&template)?;
        Ok(TemplateResponse {
            employee_count: data.employees.len(),
            shift_count: data.shifts.len(),
            template_data: with_data.then_some(data),
            id: template.id,
            name: template.name,
            description: template.description,
            duration_days: template.duration_days,
            source_start_date: template.source_start_date,
            source_end_date: template.source_end_date,
            scope_type: template.scope_type,
            scope_id: template.scope_id,
            is_public: template.is_public,
            created_by: template.created_by,
            usage_count: template.usage_count,
            last_used_at: template.last_used_at,
            created_at: template.created_at,
            updated_at: template.updated_at,
        })
    }

    pub fn summary(template: ScheduleTemplate) -> AppResult<Self> {
        Self::build(template, false)
    }

    pub fn detailed(template: ScheduleTemplate) -> AppResult<Self> {
        Self::build(template, true)
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub template: TemplateResponse,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub success: bool,
    pub templates: Vec<TemplateResponse>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: ApplySummary,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub preview: PreviewSummary,
}

fn envelope(
    template: ScheduleTemplate,
    message: Option<&str>,
) -> AppResult<Json<TemplateEnvelope>> {
    Ok(Json(TemplateEnvelope {
        success: true,
        message: message.map(str::to_string),
        template: TemplateResponse::detailed(template)?,
    }))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_templates(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<TemplateListResponse>> {
    let templates = TemplateService::list(&state, &user)
        .await?
        .into_iter()
        .map(TemplateResponse::summary)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(TemplateListResponse {
        success: true,
        templates,
    }))
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateTemplateRequest>,
) -> AppResult<Json<TemplateEnvelope>> {
    let template = TemplateService::create(&state, &user, &request).await?;
    envelope(template, Some("Template created"))
}

async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<SnapshotRequest>,
) -> AppResult<Json<TemplateEnvelope>> {
    let template = TemplateService::create_snapshot(&state, &user, &request).await?;
    envelope(template, Some("Template created from schedule"))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TemplateEnvelope>> {
    let template = TemplateService::get(&state, &user, &id).await?;
    envelope(template, None)
}

async fn update_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(update): Json<UpdateScheduleTemplate>,
) -> AppResult<Json<TemplateEnvelope>> {
    let template = TemplateService::update(&state, &user, &id, &update).await?;
    envelope(template, Some("Template updated"))
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let kept = TemplateService::delete(&state, &user, &id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Template deleted; {} shift(s) created from it were kept",
        kept
    ))))
}

async fn apply_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, AppErrorWithDetails> {
    let summary = TemplateService::apply(&state, &user, &id, &request).await?;

    let mut message = format!(
        "Created {} shift(s) for {}",
        summary.created, summary.date_range
    );
    if summary.failed > 0 {
        message.push_str(&format!(", {} failed", summary.failed));
    }
    if !summary.duration_match {
        message.push_str(" (target range length differs from the template)");
    }

    Ok(Json(ApplyResponse {
        success: true,
        message,
        summary,
    }))
}

async fn preview_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> AppResult<Json<PreviewResponse>> {
    let preview = TemplateService::preview(&state, &user, &id, &request).await?;
    Ok(Json(PreviewResponse {
        success: true,
        preview,
    }))
}

async fn duplicate_template(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<DuplicateRequest>,
) -> AppResult<Json<TemplateEnvelope>> {
    let template = TemplateService::duplicate(&state, &user, &id, &request).await?;
    envelope(template, Some("Template duplicated"))
}
