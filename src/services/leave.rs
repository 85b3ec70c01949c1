//! Leave requests: employees file them, a schedule editor above them in the
//! org tree approves or rejects. Approval writes one leave-status shift per
//! day of the request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::{
    CreateLeaveRequest, CreateShift, Employee, LeaveRequest, LeaveStatus, ShiftFields,
    ShiftStatus, WorkArrangement,
};
use crate::db::{LeaveRequestRepository, ShiftRepository};
use crate::error::{AppError, AppResult};
use crate::services::calendar;
use crate::services::directory::DirectoryService;
use crate::services::shifts::ensure_can_edit_schedule;
use crate::AppState;

const MAX_REASON_LEN: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct LeaveInput {
    pub leave_type: String,
    pub start_date: String,
    /// Single-day request when absent.
    pub end_date: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub request: LeaveRequest,
    pub shifts_written: usize,
}

/// Statuses an employee may request leave as.
pub fn is_requestable(status: ShiftStatus) -> bool {
    status.is_leave() || status == ShiftStatus::Other
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub struct LeaveService;

impl LeaveService {
    async fn load(state: &Arc<AppState>, id: &str) -> AppResult<LeaveRequest> {
        LeaveRequestRepository::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Leave request {} not found", id)))
    }

    /// Employees `reviewer` may decide for, or `None` for everyone.
    async fn reviewable_ids(
        state: &Arc<AppState>,
        reviewer: &Employee,
    ) -> AppResult<Option<Vec<String>>> {
        ensure_can_edit_schedule(reviewer)?;
        if reviewer.can_admin() {
            return Ok(None);
        }
        let team = DirectoryService::team_for(state, reviewer).await?;
        Ok(Some(
            team.into_iter()
                .filter(|e| e.id != reviewer.id)
                .map(|e| e.id)
                .collect(),
        ))
    }

    async fn ensure_can_review(
        state: &Arc<AppState>,
        reviewer: &Employee,
        request: &LeaveRequest,
    ) -> AppResult<()> {
        if request.employee_id == reviewer.id {
            return Err(AppError::Forbidden(
                "You cannot review your own leave request".to_string(),
            ));
        }
        match Self::reviewable_ids(state, reviewer).await? {
            Some(ids) if !ids.contains(&request.employee_id) => Err(AppError::Forbidden(
                "This leave request is outside your team".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn ensure_pending(request: &LeaveRequest) -> AppResult<()> {
        if request.status == LeaveStatus::Pending {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "Leave request is already {}",
                request.status.as_str()
            )))
        }
    }

    pub async fn submit(
        state: &Arc<AppState>,
        actor: &Employee,
        input: &LeaveInput,
    ) -> AppResult<LeaveRequest> {
        let leave_type: ShiftStatus = input.leave_type.parse().map_err(AppError::Validation)?;
        if !is_requestable(leave_type) {
            return Err(AppError::Validation(format!(
                "'{}' is not a leave type",
                leave_type.as_str()
            )));
        }

        let start_date = calendar::parse_date(&input.start_date, "start_date")?;
        let end_date = match trimmed(input.end_date.as_deref()) {
            Some(raw) => calendar::parse_date(raw, "end_date")?,
            None => start_date,
        };
        calendar::validate_range(
            start_date,
            end_date,
            Some(state.config.schedule.max_range_days),
        )?;

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("Reason is required".to_string()));
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(AppError::Validation(format!(
                "Reason must be at most {} characters",
                MAX_REASON_LEN
            )));
        }

        let request = LeaveRequestRepository::create(
            &state.db,
            &CreateLeaveRequest {
                employee_id: actor.id.clone(),
                leave_type,
                start_date,
                end_date,
                reason: reason.to_string(),
            },
        )
        .await?;

        tracing::info!(
            "Employee {} requested {} from {} to {}",
            actor.id,
            leave_type.as_str(),
            start_date,
            end_date
        );
        Ok(request)
    }

    pub async fn list_mine(
        state: &Arc<AppState>,
        actor: &Employee,
    ) -> AppResult<Vec<LeaveRequest>> {
        LeaveRequestRepository::list_for_employee(&state.db, &actor.id).await
    }

    /// Pending requests the reviewer may decide, oldest first.
    pub async fn list_pending(
        state: &Arc<AppState>,
        reviewer: &Employee,
    ) -> AppResult<Vec<LeaveRequest>> {
        let ids = Self::reviewable_ids(state, reviewer).await?;
        LeaveRequestRepository::list_pending(&state.db, ids.as_deref()).await
    }

    /// Visible to the requester and to anyone who may review it.
    pub async fn get(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<LeaveRequest> {
        let request = Self::load(state, id).await?;
        if request.employee_id != actor.id {
            Self::ensure_can_review(state, actor, &request).await?;
        }
        Ok(request)
    }

    /// Approve a pending request and replace the employee's shifts on every
    /// day it covers with a leave shift. All or nothing.
    pub async fn approve(
        state: &Arc<AppState>,
        reviewer: &Employee,
        id: &str,
        input: &ReviewInput,
    ) -> AppResult<ApprovalOutcome> {
        let request = Self::load(state, id).await?;
        Self::ensure_can_review(state, reviewer, &request).await?;
        Self::ensure_pending(&request)?;

        let mut tx = state.db.begin().await.map_err(AppError::Database)?;

        let approved = LeaveRequestRepository::review(
            &mut *tx,
            &request.id,
            LeaveStatus::Approved,
            &reviewer.id,
            trimmed(input.comments.as_deref()),
        )
        .await?
        .ok_or_else(|| AppError::Conflict("Leave request is no longer pending".to_string()))?;

        let notes = format!("Leave: {}", approved.reason);
        let mut shifts_written = 0;
        for date in calendar::date_range(approved.start_date, approved.end_date) {
            ShiftRepository::delete_slot(&mut *tx, &approved.employee_id, date).await?;
            ShiftRepository::create(
                &mut *tx,
                &CreateShift {
                    employee_id: approved.employee_id.clone(),
                    fields: ShiftFields {
                        date,
                        start_time: None,
                        end_time: None,
                        status: approved.leave_type,
                        role: None,
                        work_arrangement: WorkArrangement::default(),
                        color: approved.leave_type.color().to_string(),
                        notes: Some(notes.clone()),
                    },
                    sequence: Some(1),
                    template_id: None,
                },
            )
            .await?;
            shifts_written += 1;
        }

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            "Leave request {} approved by {}; {} day(s) scheduled",
            approved.id,
            reviewer.id,
            shifts_written
        );
        Ok(ApprovalOutcome {
            request: approved,
            shifts_written,
        })
    }

    /// Reject a pending request. A comment explaining the decision is required.
    pub async fn disapprove(
        state: &Arc<AppState>,
        reviewer: &Employee,
        id: &str,
        input: &ReviewInput,
    ) -> AppResult<LeaveRequest> {
        let comments = trimmed(input.comments.as_deref()).ok_or_else(|| {
            AppError::Validation("Comments are required to reject a leave request".to_string())
        })?;

        let request = Self::load(state, id).await?;
        Self::ensure_can_review(state, reviewer, &request).await?;
        Self::ensure_pending(&request)?;

        let rejected = LeaveRequestRepository::review(
            &state.db,
            &request.id,
            LeaveStatus::Rejected,
            &reviewer.id,
            Some(comments),
        )
        .await?
        .ok_or_else(|| AppError::Conflict("Leave request is no longer pending".to_string()))?;

        tracing::info!("Leave request {} rejected by {}", rejected.id, reviewer.id);
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{EmployeeRole, ScopeType};
    use crate::db::test_support;
    use chrono::NaiveDate;

    struct Fixture {
        state: Arc<AppState>,
        manager: Employee,
        alice: Employee,
        outsider_manager: Employee,
        admin: Employee,
    }

    async fn fixture() -> Fixture {
        let state = test_support::state().await;
        let dept =
            test_support::org_unit(&state.db, "Operations", ScopeType::Department, None).await;
        let other = test_support::org_unit(&state.db, "Finance", ScopeType::Department, None).await;

        let manager = test_support::employee_with_role(
            &state.db,
            "maria",
            Some(&dept.id),
            EmployeeRole::Manager,
        )
        .await;
        let alice = test_support::employee(&state.db, "alice", Some(&dept.id)).await;
        let outsider_manager = test_support::employee_with_role(
            &state.db,
            "frank",
            Some(&other.id),
            EmployeeRole::Manager,
        )
        .await;
        let admin = test_support::employee_with_role(
            &state.db,
            "root",
            None,
            EmployeeRole::Administrator,
        )
        .await;

        Fixture {
            state,
            manager,
            alice,
            outsider_manager,
            admin,
        }
    }

    fn leave(leave_type: &str, start: &str, end: Option<&str>) -> LeaveInput {
        LeaveInput {
            leave_type: leave_type.to_string(),
            start_date: start.to_string(),
            end_date: end.map(str::to_string),
            reason: "Family trip".to_string(),
        }
    }

    fn comments(text: &str) -> ReviewInput {
        ReviewInput {
            comments: Some(text.to_string()),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn submit_validates_type_range_and_reason() {
        let f = fixture().await;

        let err =
            LeaveService::submit(&f.state, &f.alice, &leave("scheduled", "2025-03-03", None))
                .await
                .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err =
            LeaveService::submit(&f.state, &f.alice, &leave("vacation", "2025-03-03", None))
                .await
                .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = LeaveService::submit(
            &f.state,
            &f.alice,
            &leave("sick_leave", "2025-03-05", Some("2025-03-03")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut blank = leave("sick_leave", "2025-03-03", None);
        blank.reason = "   ".to_string();
        let err = LeaveService::submit(&f.state, &f.alice, &blank).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let request =
            LeaveService::submit(&f.state, &f.alice, &leave("sick_leave", "2025-03-03", None))
                .await
                .unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.start_date, request.end_date);

        let mine = LeaveService::list_mine(&f.state, &f.alice).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn approval_replaces_the_covered_days_with_leave_shifts() {
        let f = fixture().await;

        // An existing working shift on the first day gets replaced.
        ShiftRepository::create(
            &f.state.db,
            &CreateShift {
                employee_id: f.alice.id.clone(),
                fields: ShiftFields {
                    date: d(2025, 3, 3),
                    start_time: calendar::parse_time(Some("08:00"), "start_time").unwrap(),
                    end_time: calendar::parse_time(Some("17:00"), "end_time").unwrap(),
                    status: ShiftStatus::Scheduled,
                    role: None,
                    work_arrangement: WorkArrangement::Onsite,
                    color: "#007bff".to_string(),
                    notes: None,
                },
                sequence: None,
                template_id: None,
            },
        )
        .await
        .unwrap();

        let request = LeaveService::submit(
            &f.state,
            &f.alice,
            &leave("annual_vacation", "2025-03-03", Some("2025-03-05")),
        )
        .await
        .unwrap();

        let pending = LeaveService::list_pending(&f.state, &f.manager).await.unwrap();
        assert_eq!(pending.len(), 1);

        let outcome =
            LeaveService::approve(&f.state, &f.manager, &request.id, &ReviewInput::default())
                .await
                .unwrap();
        assert_eq!(outcome.shifts_written, 3);
        assert_eq!(outcome.request.status, LeaveStatus::Approved);
        assert_eq!(outcome.request.reviewed_by.as_deref(), Some(f.manager.id.as_str()));

        let shifts = ShiftRepository::list_in_range(
            &f.state.db,
            d(2025, 3, 3),
            d(2025, 3, 5),
            Some(&[f.alice.id.clone()][..]),
        )
        .await
        .unwrap();
        assert_eq!(shifts.len(), 3);
        assert!(shifts.iter().all(|s| s.status == ShiftStatus::AnnualVacation));
        assert!(shifts.iter().all(|s| s.start_time.is_none() && s.end_time.is_none()));
        assert!(shifts
            .iter()
            .all(|s| s.color == ShiftStatus::AnnualVacation.color()));

        let pending = LeaveService::list_pending(&f.state, &f.manager).await.unwrap();
        assert!(pending.is_empty());

        let err = LeaveService::approve(&f.state, &f.manager, &request.id, &ReviewInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejection_needs_comments_and_writes_no_shifts() {
        let f = fixture().await;
        let request =
            LeaveService::submit(&f.state, &f.alice, &leave("sick_leave", "2025-03-03", None))
                .await
                .unwrap();

        let err = LeaveService::disapprove(&f.state, &f.manager, &request.id, &comments("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let rejected =
            LeaveService::disapprove(&f.state, &f.manager, &request.id, &comments("Peak week"))
                .await
                .unwrap();
        assert_eq!(rejected.status, LeaveStatus::Rejected);
        assert_eq!(rejected.review_comments.as_deref(), Some("Peak week"));

        let shifts =
            ShiftRepository::list_in_range(&f.state.db, d(2025, 3, 3), d(2025, 3, 3), None)
                .await
                .unwrap();
        assert!(shifts.is_empty());
    }

    #[tokio::test]
    async fn only_reviewers_over_the_requester_may_decide() {
        let f = fixture().await;
        let request =
            LeaveService::submit(&f.state, &f.alice, &leave("sick_leave", "2025-03-03", None))
                .await
                .unwrap();

        let err = LeaveService::list_pending(&f.state, &f.alice).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = LeaveService::approve(
            &f.state,
            &f.outsider_manager,
            &request.id,
            &ReviewInput::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(LeaveService::list_pending(&f.state, &f.outsider_manager)
            .await
            .unwrap()
            .is_empty());

        let err = LeaveService::get(&f.state, &f.outsider_manager, &request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(
            LeaveService::get(&f.state, &f.alice, &request.id).await.unwrap().id,
            request.id
        );

        // Administrators review anyone's requests.
        let outcome =
            LeaveService::approve(&f.state, &f.admin, &request.id, &ReviewInput::default())
                .await
                .unwrap();
        assert_eq!(outcome.shifts_written, 1);
    }

    #[tokio::test]
    async fn reviewers_cannot_decide_their_own_requests() {
        let f = fixture().await;
        let request =
            LeaveService::submit(&f.state, &f.manager, &leave("personal_leave", "2025-03-03", None))
                .await
                .unwrap();

        let err = LeaveService::approve(&f.state, &f.manager, &request.id, &ReviewInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let pending = LeaveService::list_pending(&f.state, &f.manager).await.unwrap();
        assert!(pending.iter().all(|r| r.employee_id != f.manager.id));
    }
}
