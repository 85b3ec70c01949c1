use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateOrgUnit, OrgUnit};
use crate::error::{AppError, AppResult};

// ============================================================================
// Org Unit Repository
// ============================================================================

pub struct OrgUnitRepository;

impl OrgUnitRepository {
    pub async fn create(pool: &SqlitePool, create: &CreateOrgUnit) -> AppResult<OrgUnit> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, OrgUnit>(
            r#"
            INSERT INTO org_units (id, name, description, unit_type, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, description, unit_type, parent_id, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(create.name.trim())
        .bind(&create.description)
        .bind(create.unit_type)
        .bind(&create.parent_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<OrgUnit>> {
        sqlx::query_as::<_, OrgUnit>(
            r#"
            SELECT id, name, description, unit_type, parent_id, created_at, updated_at
            FROM org_units
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<OrgUnit>> {
        sqlx::query_as::<_, OrgUnit>(
            r#"
            SELECT id, name, description, unit_type, parent_id, created_at, updated_at
            FROM org_units
            ORDER BY unit_type ASC, name ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
