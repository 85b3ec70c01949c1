use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{DateRemark, UpsertDateRemark};
use crate::error::{AppError, AppResult};

const REMARK_COLUMNS: &str = "id, date, title, description, remark_type, is_work_day, color, \
     created_by, created_at, updated_at";

/// Repository for calendar-day annotations (`date_remarks` table).
pub struct DateRemarkRepository;

impl DateRemarkRepository {
    /// Create the remark for a date, or overwrite the one already there.
    ///
    /// The row keeps its original id and `created_at` on overwrite.
    pub async fn upsert_by_date(
        pool: &SqlitePool,
        remark: &UpsertDateRemark,
        created_by: Option<&str>,
    ) -> AppResult<DateRemark> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO date_remarks (
                id, date, title, description, remark_type, is_work_day, color,
                created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                remark_type = excluded.remark_type,
                is_work_day = excluded.is_work_day,
                color = excluded.color,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            REMARK_COLUMNS
        );

        sqlx::query_as::<_, DateRemark>(&sql)
            .bind(&id)
            .bind(remark.date)
            .bind(&remark.title)
            .bind(&remark.description)
            .bind(remark.remark_type)
            .bind(remark.is_work_day)
            .bind(&remark.color)
            .bind(created_by)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_date(pool: &SqlitePool, date: NaiveDate) -> AppResult<Option<DateRemark>> {
        let sql = format!("SELECT {} FROM date_remarks WHERE date = ?", REMARK_COLUMNS);
        sqlx::query_as::<_, DateRemark>(&sql)
            .bind(date)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_in_range(
        pool: &SqlitePool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DateRemark>> {
        let sql = format!(
            "SELECT {} FROM date_remarks WHERE date >= ? AND date <= ? ORDER BY date ASC",
            REMARK_COLUMNS
        );
        sqlx::query_as::<_, DateRemark>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Delete a remark by id. Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM date_remarks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RemarkType;
    use crate::db::test_support;

    fn christmas(title: &str) -> UpsertDateRemark {
        UpsertDateRemark {
            date: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
            title: title.to_string(),
            description: None,
            remark_type: RemarkType::Holiday,
            is_work_day: false,
            color: "#dc3545".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_remark_per_date() {
        let pool = test_support::pool().await;

        let first = DateRemarkRepository::upsert_by_date(&pool, &christmas("Christmas"), None)
            .await
            .unwrap();
        let second =
            DateRemarkRepository::upsert_by_date(&pool, &christmas("Christmas Day"), None)
                .await
                .unwrap();

        assert_eq!(first.id, second.id);

        let date = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let all = DateRemarkRepository::list_in_range(&pool, date, date)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Christmas Day");
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let pool = test_support::pool().await;
        let remark = DateRemarkRepository::upsert_by_date(&pool, &christmas("Christmas"), None)
            .await
            .unwrap();

        assert!(DateRemarkRepository::delete(&pool, &remark.id).await.unwrap());
        assert!(!DateRemarkRepository::delete(&pool, &remark.id).await.unwrap());
        assert!(DateRemarkRepository::find_by_date(&pool, remark.date)
            .await
            .unwrap()
            .is_none());
    }
}
