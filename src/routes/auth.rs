use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Employee;
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Employee as exposed over the API, with the derived display fields.
#[derive(Debug, Serialize)]
pub struct EmployeeResponse {
    #[serde(flatten)]
    pub employee: Employee,
    pub full_name: String,
    pub initials: String,
    pub display_role: String,
    pub break_minutes: u32,
    pub can_edit_schedule: bool,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        EmployeeResponse {
            full_name: employee.full_name(),
            initials: employee.initials(),
            display_role: employee.display_role(),
            break_minutes: employee.schedule_format.break_minutes(),
            can_edit_schedule: employee.can_edit_schedule(),
            employee,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: i64,
    pub employee: EmployeeResponse,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub employee: EmployeeResponse,
}

// ============================================================================
// Handlers
// ============================================================================

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let employee = AuthService::authenticate(&state, &request.username, &request.password).await?;
    let token = AuthService::create_jwt(&state, &employee.id)?;

    tracing::info!("Employee {} logged in", employee.username);

    Ok(Json(LoginResponse {
        success: true,
        token,
        expires_in: state.config.jwt.expiration_hours * 3600,
        employee: employee.into(),
    }))
}

async fn me(AuthUser(employee): AuthUser) -> AppResult<Json<MeResponse>> {
    Ok(Json(MeResponse {
        success: true,
        employee: employee.into(),
    }))
}

// ============================================================================
// Extractor
// ============================================================================

/// The acting employee, resolved from the `Authorization: Bearer` header.
pub struct AuthUser(pub Employee);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let employee = AuthService::get_employee_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to resolve employee from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated employee: {}", employee.id);
        Ok(AuthUser(employee))
    }
}
