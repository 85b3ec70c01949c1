use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CreateLeaveRequest, LeaveRequest, LeaveStatus};
use crate::error::{AppError, AppResult};

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, reason, status, \
     reviewed_by, reviewed_at, review_comments, created_at, updated_at";

/// Repository for the `leave_requests` table.
pub struct LeaveRequestRepository;

impl LeaveRequestRepository {
    pub async fn create(pool: &SqlitePool, create: &CreateLeaveRequest) -> AppResult<LeaveRequest> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO leave_requests (
                id, employee_id, leave_type, start_date, end_date, reason, status,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            LEAVE_COLUMNS
        );

        sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(&id)
            .bind(&create.employee_id)
            .bind(create.leave_type)
            .bind(create.start_date)
            .bind(create.end_date)
            .bind(&create.reason)
            .bind(LeaveStatus::Pending)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
        sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// An employee's own requests, newest first.
    pub async fn list_for_employee(
        pool: &SqlitePool,
        employee_id: &str,
    ) -> AppResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {} FROM leave_requests WHERE employee_id = ? ORDER BY created_at DESC",
            LEAVE_COLUMNS
        );
        sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(employee_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Pending requests, oldest first, optionally restricted to a set of
    /// employees. An empty employee slice yields no rows.
    pub async fn list_pending(
        pool: &SqlitePool,
        employee_ids: Option<&[String]>,
    ) -> AppResult<Vec<LeaveRequest>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM leave_requests WHERE status = ",
            LEAVE_COLUMNS
        ));
        qb.push_bind(LeaveStatus::Pending);

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
        qb.push(" ORDER BY created_at ASC");

        qb.build_query_as::<LeaveRequest>()
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Move a pending request to `status`. Returns `None` when the request
    /// is unknown or was already reviewed.
    pub async fn review<'e, E>(
        executor: E,
        id: &str,
        status: LeaveStatus,
        reviewed_by: &str,
        comments: Option<&str>,
    ) -> AppResult<Option<LeaveRequest>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE leave_requests
            SET status = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                review_comments = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {}
            "#,
            LEAVE_COLUMNS
        );

        sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(status)
            .bind(reviewed_by)
            .bind(now)
            .bind(comments)
            .bind(now)
            .bind(id)
            .bind(LeaveStatus::Pending)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ShiftStatus;
    use crate::db::test_support;
    use chrono::NaiveDate;

    fn request(employee_id: &str) -> CreateLeaveRequest {
        CreateLeaveRequest {
            employee_id: employee_id.to_string(),
            leave_type: ShiftStatus::SickLeave,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            reason: "Flu".to_string(),
        }
    }

    #[tokio::test]
    async fn review_only_moves_pending_requests() {
        let pool = test_support::pool().await;
        let alice = test_support::employee(&pool, "alice", None).await;
        let boss = test_support::employee(&pool, "boss", None).await;

        let created = LeaveRequestRepository::create(&pool, &request(&alice.id))
            .await
            .unwrap();
        assert_eq!(created.status, LeaveStatus::Pending);

        let approved = LeaveRequestRepository::review(
            &pool,
            &created.id,
            LeaveStatus::Approved,
            &boss.id,
            None,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some(boss.id.as_str()));
        assert!(approved.reviewed_at.is_some());

        let again = LeaveRequestRepository::review(
            &pool,
            &created.id,
            LeaveStatus::Rejected,
            &boss.id,
            Some("No"),
        )
        .await
        .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn pending_listing_filters_by_employee() {
        let pool = test_support::pool().await;
        let alice = test_support::employee(&pool, "alice", None).await;
        let bob = test_support::employee(&pool, "bob", None).await;

        LeaveRequestRepository::create(&pool, &request(&alice.id))
            .await
            .unwrap();
        LeaveRequestRepository::create(&pool, &request(&bob.id))
            .await
            .unwrap();

        let all = LeaveRequestRepository::list_pending(&pool, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_bob = LeaveRequestRepository::list_pending(&pool, Some(&[bob.id.clone()][..]))
            .await
            .unwrap();
        assert_eq!(only_bob.len(), 1);
        assert_eq!(only_bob[0].employee_id, bob.id);

        let nobody: Vec<String> = Vec::new();
        let none = LeaveRequestRepository::list_pending(&pool, Some(nobody.as_slice()))
            .await
            .unwrap();
        assert!(none.is_empty());

        let mine = LeaveRequestRepository::list_for_employee(&pool, &alice.id)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
    }
}
