use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{models::Employee, EmployeeRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(state: &Arc<AppState>, password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, state.config.security.bcrypt_cost)?)
    }

    /// Check a username/password pair. Unknown users, inactive accounts and
    /// wrong passwords all fail the same way.
    pub async fn authenticate(
        state: &Arc<AppState>,
        username: &str,
        password: &str,
    ) -> AppResult<Employee> {
        let employee = EmployeeRepository::find_by_username(&state.db, username.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !employee.is_active {
            tracing::debug!("Login refused for inactive employee {}", employee.id);
            return Err(AppError::Unauthorized);
        }

        if !bcrypt::verify(password, &employee.password_hash)? {
            tracing::debug!("Invalid password for employee {}", employee.id);
            return Err(AppError::Unauthorized);
        }

        Ok(employee)
    }

    /// Create a signed JWT for an employee id
    pub fn create_jwt(state: &Arc<AppState>, employee_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(state.config.jwt.expiration_hours);
        let claims = Claims {
            sub: employee_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve the acting employee from a bearer token.
    pub async fn get_employee_from_token(
        state: &Arc<AppState>,
        token: &str,
    ) -> AppResult<Employee> {
        let claims = Self::decode_jwt(state, token)?;
        let employee = EmployeeRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .filter(|e| e.is_active)
            .ok_or(AppError::Unauthorized)?;
        Ok(employee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn login_round_trip() {
        let state = test_support::state().await;
        let alice = test_support::employee(&state.db, "alice", None).await;

        let found = AuthService::authenticate(&state, "ALICE", "password")
            .await
            .unwrap();
        assert_eq!(found.id, alice.id);

        let token = AuthService::create_jwt(&state, &alice.id).unwrap();
        let resolved = AuthService::get_employee_from_token(&state, &token)
            .await
            .unwrap();
        assert_eq!(resolved.id, alice.id);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = test_support::state().await;
        test_support::employee(&state.db, "alice", None).await;

        let err = AuthService::authenticate(&state, "alice", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = AuthService::authenticate(&state, "nobody", "password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let state = test_support::state().await;
        let err = AuthService::get_employee_from_token(&state, "not-a-jwt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Jwt(_)));
    }
}
