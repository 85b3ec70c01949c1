use chrono::{NaiveDate, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CreateShift, Shift, ShiftFields};
use crate::error::{AppError, AppResult};

const SHIFT_COLUMNS: &str = "id, employee_id, date, start_time, end_time, status, role, \
     work_arrangement, color, notes, sequence, template_id, created_at, updated_at";

// ============================================================================
// Shift Repository
// ============================================================================

/// Write operations are generic over the executor so the template engine can
/// run them inside a transaction; reads go straight to the pool.
pub struct ShiftRepository;

impl ShiftRepository {
    /// Insert a shift. Without an explicit sequence the shift is appended
    /// after the employee's existing shifts on that date.
    pub async fn create<'e, E>(executor: E, create: &CreateShift) -> AppResult<Shift>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let fields = &create.fields;

        let sql = format!(
            r#"
            INSERT INTO shifts (
                id, employee_id, date, start_time, end_time, status, role,
                work_arrangement, color, notes, sequence, template_id, created_at, updated_at
            )
            VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                COALESCE(?, (
                    SELECT COALESCE(MAX(sequence), 0) + 1
                    FROM shifts
                    WHERE employee_id = ? AND date = ?
                )),
                ?, ?, ?
            )
            RETURNING {}
            "#,
            SHIFT_COLUMNS
        );

        sqlx::query_as::<_, Shift>(&sql)
            .bind(&id)
            .bind(&create.employee_id)
            .bind(fields.date)
            .bind(fields.start_time)
            .bind(fields.end_time)
            .bind(fields.status)
            .bind(&fields.role)
            .bind(fields.work_arrangement)
            .bind(&fields.color)
            .bind(&fields.notes)
            .bind(create.sequence)
            .bind(&create.employee_id)
            .bind(fields.date)
            .bind(&create.template_id)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Shift>> {
        let sql = format!("SELECT {} FROM shifts WHERE id = ?", SHIFT_COLUMNS);
        sqlx::query_as::<_, Shift>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Replace the editable attributes of a shift. Returns `None` when the
    /// id is unknown.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        fields: &ShiftFields,
    ) -> AppResult<Option<Shift>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE shifts
            SET date = ?,
                start_time = ?,
                end_time = ?,
                status = ?,
                role = ?,
                work_arrangement = ?,
                color = ?,
                notes = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            SHIFT_COLUMNS
        );

        sqlx::query_as::<_, Shift>(&sql)
            .bind(fields.date)
            .bind(fields.start_time)
            .bind(fields.end_time)
            .bind(fields.status)
            .bind(&fields.role)
            .bind(fields.work_arrangement)
            .bind(&fields.color)
            .bind(&fields.notes)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Delete a shift. Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every shift an employee holds on one date.
    pub async fn delete_slot<'e, E>(
        executor: E,
        employee_id: &str,
        date: NaiveDate,
    ) -> AppResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM shifts WHERE employee_id = ? AND date = ?")
            .bind(employee_id)
            .bind(date)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    /// Shifts with `start <= date <= end`, optionally restricted to a set of
    /// employees. An empty employee slice yields no rows.
    pub async fn list_in_range(
        pool: &SqlitePool,
        start: NaiveDate,
        end: NaiveDate,
        employee_ids: Option<&[String]>,
    ) -> AppResult<Vec<Shift>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM shifts WHERE date >= ",
            SHIFT_COLUMNS
        ));
        qb.push_bind(start);
        qb.push(" AND date <= ");
        qb.push_bind(end);

        if let Some(ids) = employee_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND employee_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
        }

        qb.push(" ORDER BY employee_id ASC, date ASC, sequence ASC");

        qb.build_query_as::<Shift>()
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// An employee's shifts on one date, in display order.
    pub async fn list_for_employee_on_date(
        pool: &SqlitePool,
        employee_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<Shift>> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE employee_id = ? AND date = ? ORDER BY sequence ASC",
            SHIFT_COLUMNS
        );
        sqlx::query_as::<_, Shift>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn count_for_employee_on_date(
        pool: &SqlitePool,
        employee_id: &str,
        date: NaiveDate,
    ) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM shifts WHERE employee_id = ? AND date = ?")
            .bind(employee_id)
            .bind(date)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn count_by_template(pool: &SqlitePool, template_id: &str) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM shifts WHERE template_id = ?")
            .bind(template_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }
}
