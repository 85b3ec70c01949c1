//! Shared fixtures for database-backed tests.

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::models::{CreateEmployee, CreateOrgUnit, Employee, EmployeeRole, OrgUnit, ScopeType};
use crate::db::{EmployeeRepository, OrgUnitRepository};
use crate::AppState;

/// Fresh in-memory database with migrations applied. A single connection
/// keeps every query on the same in-memory database.
pub async fn pool() -> SqlitePool {
    let options = "sqlite::memory:"
        .parse::<SqliteConnectOptions>()
        .expect("Invalid in-memory database URL")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to create in-memory pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub async fn state() -> Arc<AppState> {
    let mut config = Config::default();
    config.jwt.secret = "test-secret".to_string();
    config.security.bcrypt_cost = 4;

    Arc::new(AppState {
        db: pool().await,
        config,
    })
}

pub async fn org_unit(
    pool: &SqlitePool,
    name: &str,
    unit_type: ScopeType,
    parent_id: Option<&str>,
) -> OrgUnit {
    OrgUnitRepository::create(
        pool,
        &CreateOrgUnit {
            name: name.to_string(),
            description: None,
            unit_type,
            parent_id: parent_id.map(|p| p.to_string()),
        },
    )
    .await
    .expect("Failed to create org unit")
}

pub async fn employee(pool: &SqlitePool, username: &str, org_unit_id: Option<&str>) -> Employee {
    employee_with_role(pool, username, org_unit_id, EmployeeRole::Employee).await
}

pub async fn employee_with_role(
    pool: &SqlitePool,
    username: &str,
    org_unit_id: Option<&str>,
    role: EmployeeRole,
) -> Employee {
    let create = CreateEmployee {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "password".to_string(),
        first_name: capitalize(username),
        last_name: "Tester".to_string(),
        role,
        job_title: None,
        schedule_format: None,
        org_unit_id: org_unit_id.map(|s| s.to_string()),
    };
    let hash = bcrypt::hash(&create.password, 4).expect("Failed to hash password");
    EmployeeRepository::create(pool, &create, &hash)
        .await
        .expect("Failed to create employee")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
