use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CreateScheduleTemplate, ScheduleTemplate, UpdateScheduleTemplate};
use crate::error::{AppError, AppResult};

const TEMPLATE_COLUMNS: &str = "id, name, description, duration_days, source_start_date, \
     source_end_date, scope_type, scope_id, is_public, template_data, created_by, usage_count, \
     last_used_at, created_at, updated_at";

// ============================================================================
// Schedule Template Repository
// ============================================================================

pub struct ScheduleTemplateRepository;

impl ScheduleTemplateRepository {
    pub async fn create(
        pool: &SqlitePool,
        created_by: &str,
        create: &CreateScheduleTemplate,
    ) -> AppResult<ScheduleTemplate> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let data = serde_json::to_string(&create.data)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode template data: {}", e)))?;

        let sql = format!(
            r#"
            INSERT INTO schedule_templates (
                id, name, description, duration_days, source_start_date, source_end_date,
                scope_type, scope_id, is_public, template_data, created_by, usage_count,
                last_used_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, ScheduleTemplate>(&sql)
            .bind(&id)
            .bind(create.name.trim())
            .bind(&create.description)
            .bind(create.duration_days)
            .bind(create.source_start_date)
            .bind(create.source_end_date)
            .bind(create.scope_type)
            .bind(&create.scope_id)
            .bind(create.is_public)
            .bind(data)
            .bind(created_by)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<ScheduleTemplate>> {
        let sql = format!("SELECT {} FROM schedule_templates WHERE id = ?", TEMPLATE_COLUMNS);
        sqlx::query_as::<_, ScheduleTemplate>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Templates an employee may see: public ones and their own, or every
    /// template when `include_all` is set (administrators).
    pub async fn list_visible(
        pool: &SqlitePool,
        employee_id: &str,
        include_all: bool,
    ) -> AppResult<Vec<ScheduleTemplate>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM schedule_templates
            WHERE ? OR is_public = 1 OR created_by = ?
            ORDER BY last_used_at IS NULL, last_used_at DESC, created_at DESC
            "#,
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, ScheduleTemplate>(&sql)
            .bind(include_all)
            .bind(employee_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        update: &UpdateScheduleTemplate,
    ) -> AppResult<Option<ScheduleTemplate>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE schedule_templates
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                is_public = COALESCE(?, is_public),
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, ScheduleTemplate>(&sql)
            .bind(update.name.as_deref().map(str::trim))
            .bind(&update.description)
            .bind(update.is_public)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Bump `usage_count` and stamp `last_used_at` after a successful apply.
    pub async fn record_usage<'e, E>(executor: E, id: &str) -> AppResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE schedule_templates
            SET usage_count = usage_count + 1,
                last_used_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Delete a template. Shifts created from it keep existing with their
    /// `template_id` cleared by the foreign key.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM schedule_templates WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
