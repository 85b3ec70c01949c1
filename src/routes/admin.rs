use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{CreateEmployee, CreateOrgUnit, Employee, OrgUnit};
use crate::error::{AppError, AppResult};
use crate::routes::auth::{AuthUser, EmployeeResponse};
use crate::services::directory::DirectoryService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/org-units", get(list_org_units).post(create_org_unit))
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/:id/active", put(set_employee_active))
}

fn require_admin(user: &Employee) -> AppResult<()> {
    if !user.can_admin() {
        tracing::debug!("Employee {} denied admin access", user.id);
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrgUnitListResponse {
    pub success: bool,
    pub org_units: Vec<OrgUnit>,
}

#[derive(Debug, Serialize)]
pub struct OrgUnitResponse {
    pub success: bool,
    pub org_unit: OrgUnit,
}

#[derive(Debug, Serialize)]
pub struct EmployeeListResponse {
    pub success: bool,
    pub employees: Vec<EmployeeResponse>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeEnvelope {
    pub success: bool,
    pub employee: EmployeeResponse,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

// ============================================================================
// Org unit handlers
// ============================================================================

async fn list_org_units(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<OrgUnitListResponse>> {
    require_admin(&user)?;
    let org_units = DirectoryService::list_org_units(&state).await?;
    Ok(Json(OrgUnitListResponse {
        success: true,
        org_units,
    }))
}

async fn create_org_unit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateOrgUnit>,
) -> AppResult<Json<OrgUnitResponse>> {
    require_admin(&user)?;
    let org_unit = DirectoryService::create_org_unit(&state, &request).await?;
    Ok(Json(OrgUnitResponse {
        success: true,
        org_unit,
    }))
}

// ============================================================================
// Employee handlers
// ============================================================================

async fn list_employees(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<EmployeeListResponse>> {
    require_admin(&user)?;
    let employees = DirectoryService::list_employees(&state)
        .await?
        .into_iter()
        .map(EmployeeResponse::from)
        .collect();
    Ok(Json(EmployeeListResponse {
        success: true,
        employees,
    }))
}

async fn create_employee(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateEmployee>,
) -> AppResult<Json<EmployeeEnvelope>> {
    require_admin(&user)?;
    let employee = DirectoryService::create_employee(&state, &request).await?;
    Ok(Json(EmployeeEnvelope {
        success: true,
        employee: employee.into(),
    }))
}

async fn set_employee_active(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<SetActiveRequest>,
) -> AppResult<Json<EmployeeEnvelope>> {
    require_admin(&user)?;
    if id == user.id && !request.is_active {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let employee = DirectoryService::set_active(&state, &id, request.is_active).await?;
    Ok(Json(EmployeeEnvelope {
        success: true,
        employee: employee.into(),
    }))
}
