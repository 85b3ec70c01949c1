use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CreateEmployee, Employee, ScheduleFormat};
use crate::error::{AppError, AppResult};

const EMPLOYEE_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, \
     job_title, schedule_format, org_unit_id, is_active, created_at, updated_at";

// ============================================================================
// Employee Repository
// ============================================================================

pub struct EmployeeRepository;

impl EmployeeRepository {
    /// Insert a new employee. `password_hash` must already be a bcrypt hash.
    pub async fn create(
        pool: &SqlitePool,
        create: &CreateEmployee,
        password_hash: &str,
    ) -> AppResult<Employee> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO employees (
                id, username, email, password_hash, first_name, last_name, role,
                job_title, schedule_format, org_unit_id, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING {}
            "#,
            EMPLOYEE_COLUMNS
        );

        sqlx::query_as::<_, Employee>(&sql)
            .bind(&id)
            .bind(create.username.trim())
            .bind(create.email.trim())
            .bind(password_hash)
            .bind(create.first_name.trim())
            .bind(create.last_name.trim())
            .bind(create.role)
            .bind(&create.job_title)
            .bind(create.schedule_format.unwrap_or(ScheduleFormat::EightHour))
            .bind(&create.org_unit_id)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.message().contains("UNIQUE") => {
                    AppError::Conflict("Username or email already exists".to_string())
                }
                other => AppError::Database(other),
            })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Employee>> {
        let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<Employee>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE LOWER(username) = LOWER(?)",
            EMPLOYEE_COLUMNS
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(username.trim())
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Fetch several employees at once. Unknown ids are silently absent from
    /// the result.
    pub async fn find_by_ids(pool: &SqlitePool, ids: &[String]) -> AppResult<Vec<Employee>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM employees WHERE id IN (",
            EMPLOYEE_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY last_name ASC, first_name ASC");

        qb.build_query_as::<Employee>()
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_active(pool: &SqlitePool) -> AppResult<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE is_active = 1 ORDER BY last_name ASC, first_name ASC",
            EMPLOYEE_COLUMNS
        );
        sqlx::query_as::<_, Employee>(&sql)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM employees ORDER BY last_name ASC, first_name ASC",
            EMPLOYEE_COLUMNS
        );
        sqlx::query_as::<_, Employee>(&sql)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Active employees assigned to `org_unit_id` or to any unit below it.
    pub async fn list_active_in_scope(
        pool: &SqlitePool,
        org_unit_id: &str,
    ) -> AppResult<Vec<Employee>> {
        let sql = format!(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT id FROM org_units WHERE id = ?
                UNION
                SELECT o.id FROM org_units o JOIN subtree s ON o.parent_id = s.id
            )
            SELECT {}
            FROM employees
            WHERE is_active = 1 AND org_unit_id IN (SELECT id FROM subtree)
            ORDER BY last_name ASC, first_name ASC
            "#,
            EMPLOYEE_COLUMNS
        );

        sqlx::query_as::<_, Employee>(&sql)
            .bind(org_unit_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Activate or deactivate an account. Returns `None` for an unknown id.
    pub async fn set_active(
        pool: &SqlitePool,
        id: &str,
        is_active: bool,
    ) -> AppResult<Option<Employee>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            "UPDATE employees SET is_active = ?, updated_at = ? WHERE id = ? RETURNING {}",
            EMPLOYEE_COLUMNS
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(is_active)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(count)
    }
}
