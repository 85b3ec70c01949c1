use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{
    CreateShift, Employee, ScopeType, Shift, ShiftFields, ShiftStatus, WorkArrangement,
};
use crate::db::{EmployeeRepository, ShiftRepository};
use crate::error::{AppError, AppResult};
use crate::services::calendar;
use crate::services::directory::DirectoryService;
use crate::AppState;

// ============================================================================
// Input types
// ============================================================================

/// Shift attributes as they arrive over the wire. Blank strings mean "unset".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftInput {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
    pub work_arrangement: Option<WorkArrangement>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveShiftRequest {
    /// Present when the call edits an existing shift.
    pub shift_id: Option<String>,
    pub employee_id: String,
    #[serde(flatten)]
    pub shift: ShiftInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopyShiftRequest {
    /// Target employee; defaults to the source shift's employee.
    pub employee_id: Option<String>,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShiftRangeRequest {
    pub employee_ids: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    /// 0 = Monday … 6 = Sunday. Every day when absent.
    pub days_of_week: Option<Vec<u8>>,
    pub skip_existing: Option<bool>,
    #[serde(flatten)]
    pub shift: ShiftInput,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShiftRangeSummary {
    pub created: usize,
    pub skipped: usize,
    pub days_matched: usize,
    pub employees: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftListQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub employee_id: Option<String>,
    pub scope_type: Option<ScopeType>,
    pub scope_id: Option<String>,
}

// ============================================================================
// Normalization
// ============================================================================

pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Turn wire input into storable fields for `date`.
///
/// Non-scheduled statuses drop their times; a scheduled shift must carry
/// both times or neither. The color falls back to the status color, and
/// scheduled shifts use `default_color`.
pub fn normalize(input: &ShiftInput, date: NaiveDate, default_color: &str) -> AppResult<ShiftFields> {
    let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw.parse::<ShiftStatus>().map_err(AppError::Validation)?,
        None => ShiftStatus::Scheduled,
    };

    let (start_time, end_time) = if status.has_times() {
        let start = calendar::parse_time(input.start_time.as_deref(), "start_time")?;
        let end = calendar::parse_time(input.end_time.as_deref(), "end_time")?;
        if start.is_some() != end.is_some() {
            return Err(AppError::Validation(
                "A scheduled shift needs both start_time and end_time, or neither".to_string(),
            ));
        }
        (start, end)
    } else {
        (None, None)
    };

    let color = match blank_to_none(input.color.as_deref()) {
        Some(color) if is_valid_color(&color) => color,
        Some(color) => {
            return Err(AppError::Validation(format!(
                "Invalid color '{}': expected #RRGGBB",
                color
            )))
        }
        None if status == ShiftStatus::Scheduled => default_color.to_string(),
        None => status.color().to_string(),
    };

    Ok(ShiftFields {
        date,
        start_time,
        end_time,
        status,
        role: blank_to_none(input.role.as_deref()),
        work_arrangement: input.work_arrangement.unwrap_or_default(),
        color,
        notes: blank_to_none(input.notes.as_deref()),
    })
}

/// Schedule editors may touch any shift; everyone else only their own.
pub fn ensure_can_touch(actor: &Employee, employee_id: &str) -> AppResult<()> {
    if actor.can_edit_schedule() || actor.id == employee_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only manage your own shifts".to_string(),
        ))
    }
}

pub fn ensure_can_edit_schedule(actor: &Employee) -> AppResult<()> {
    if actor.can_edit_schedule() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Schedule editing requires a manager or administrator".to_string(),
        ))
    }
}

// ============================================================================
// Shift Service
// ============================================================================

pub struct ShiftService;

impl ShiftService {
    async fn load(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<Shift> {
        let shift = ShiftRepository::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shift {} not found", id)))?;
        ensure_can_touch(actor, &shift.employee_id)?;
        Ok(shift)
    }

    async fn require_active_employee(state: &Arc<AppState>, id: &str) -> AppResult<Employee> {
        EmployeeRepository::find_by_id(&state.db, id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))
    }

    pub async fn get(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<Shift> {
        Self::load(state, actor, id).await
    }

    /// Create a shift, or update it when `shift_id` is present.
    pub async fn save(
        state: &Arc<AppState>,
        actor: &Employee,
        request: &SaveShiftRequest,
    ) -> AppResult<Shift> {
        ensure_can_touch(actor, &request.employee_id)?;

        match request.shift_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::update(state, actor, id, &request.shift).await,
            None => {
                Self::require_active_employee(state, &request.employee_id).await?;
                let date = calendar::require_date(request.shift.date.as_deref(), "date")?;
                let fields =
                    normalize(&request.shift, date, &state.config.schedule.default_shift_color)?;

                let shift = ShiftRepository::create(
                    &state.db,
                    &CreateShift {
                        employee_id: request.employee_id.clone(),
                        fields,
                        sequence: None,
                        template_id: None,
                    },
                )
                .await?;

                tracing::info!(
                    "Created shift {} for employee {} on {}",
                    shift.id,
                    shift.employee_id,
                    shift.date
                );
                Ok(shift)
            }
        }
    }

    pub async fn update(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        input: &ShiftInput,
    ) -> AppResult<Shift> {
        let existing = Self::load(state, actor, id).await?;
        let date = match input.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => calendar::parse_date(raw, "date")?,
            None => existing.date,
        };
        let fields = normalize(input, date, &state.config.schedule.default_shift_color)?;

        let shift = ShiftRepository::update(&state.db, id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shift {} not found", id)))?;
        tracing::info!("Updated shift {}", shift.id);
        Ok(shift)
    }

    pub async fn delete(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<()> {
        Self::load(state, actor, id).await?;
        if !ShiftRepository::delete(&state.db, id).await? {
            return Err(AppError::NotFound(format!("Shift {} not found", id)));
        }
        tracing::info!("Deleted shift {}", id);
        Ok(())
    }

    /// Copy a shift's attributes into another (employee, date) slot. The copy
    /// is appended after whatever the slot already holds.
    pub async fn copy(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        request: &CopyShiftRequest,
    ) -> AppResult<Shift> {
        let source = Self::load(state, actor, id).await?;
        let employee_id = request
            .employee_id
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| source.employee_id.clone());
        ensure_can_touch(actor, &employee_id)?;
        Self::require_active_employee(state, &employee_id).await?;

        let date = calendar::parse_date(&request.date, "date")?;
        let fields = ShiftFields {
            date,
            start_time: source.start_time,
            end_time: source.end_time,
            status: source.status,
            role: source.role.clone(),
            work_arrangement: source.work_arrangement,
            color: source.color.clone(),
            notes: source.notes.clone(),
        };

        let shift = ShiftRepository::create(
            &state.db,
            &CreateShift {
                employee_id,
                fields,
                sequence: None,
                template_id: None,
            },
        )
        .await?;
        tracing::info!("Copied shift {} to {}", source.id, shift.id);
        Ok(shift)
    }

    /// Shifts in a date range. Non-editors only ever see their own.
    pub async fn list(
        state: &Arc<AppState>,
        actor: &Employee,
        query: &ShiftListQuery,
    ) -> AppResult<Vec<Shift>> {
        let start = calendar::require_date(query.start_date.as_deref(), "start_date")?;
        let end = calendar::require_date(query.end_date.as_deref(), "end_date")?;
        calendar::validate_range(start, end, Some(state.config.schedule.max_range_days))?;

        let mut employee_ids: Option<Vec<String>> = None;

        if let Some(scope_id) = query.scope_id.as_deref().filter(|s| !s.is_empty()) {
            let scope = DirectoryService::resolve_scope(state, query.scope_type, scope_id).await?;
            employee_ids = Some(scope.employee_ids());
        }

        if let Some(employee_id) = query.employee_id.as_deref().filter(|s| !s.is_empty()) {
            employee_ids = Some(match employee_ids {
                Some(ids) => ids.into_iter().filter(|id| id == employee_id).collect(),
                None => vec![employee_id.to_string()],
            });
        }

        if !actor.can_edit_schedule() {
            employee_ids = Some(match employee_ids {
                Some(ids) => ids.into_iter().filter(|id| *id == actor.id).collect(),
                None => vec![actor.id.clone()],
            });
        }

        ShiftRepository::list_in_range(&state.db, start, end, employee_ids.as_deref()).await
    }

    pub async fn list_for_employee_on_date(
        state: &Arc<AppState>,
        actor: &Employee,
        employee_id: &str,
        date: &str,
    ) -> AppResult<Vec<Shift>> {
        ensure_can_touch(actor, employee_id)?;
        let date = calendar::parse_date(date, "date")?;
        ShiftRepository::list_for_employee_on_date(&state.db, employee_id, date).await
    }

    /// Create one shift per selected (employee, date) pair in the range.
    pub async fn create_range(
        state: &Arc<AppState>,
        actor: &Employee,
        request: &ShiftRangeRequest,
    ) -> AppResult<ShiftRangeSummary> {
        if request.employee_ids.is_empty() {
            return Err(AppError::Validation(
                "At least one employee is required".to_string(),
            ));
        }
        for employee_id in &request.employee_ids {
            ensure_can_touch(actor, employee_id)?;
        }

        let start = calendar::parse_date(&request.start_date, "start_date")?;
        let end = calendar::parse_date(&request.end_date, "end_date")?;
        calendar::validate_range(start, end, Some(state.config.schedule.max_range_days))?;

        if let Some(days) = &request.days_of_week {
            if let Some(bad) = days.iter().find(|d| **d > 6) {
                return Err(AppError::Validation(format!(
                    "Invalid day of week {}: expected 0 (Monday) to 6 (Sunday)",
                    bad
                )));
            }
        }

        let employees = EmployeeRepository::find_by_ids(&state.db, &request.employee_ids).await?;
        for employee_id in &request.employee_ids {
            if !employees.iter().any(|e| &e.id == employee_id && e.is_active) {
                return Err(AppError::NotFound(format!("Employee {} not found", employee_id)));
            }
        }

        let dates: Vec<NaiveDate> = calendar::date_range(start, end)
            .into_iter()
            .filter(|d| calendar::matches_weekdays(*d, request.days_of_week.as_deref()))
            .collect();

        // Validate once up front so a bad attribute fails before any write.
        let template_fields = normalize(
            &request.shift,
            start,
            &state.config.schedule.default_shift_color,
        )?;

        let skip_existing = request.skip_existing.unwrap_or(true);
        let mut summary = ShiftRangeSummary {
            days_matched: dates.len(),
            employees: request.employee_ids.len(),
            ..Default::default()
        };

        for employee_id in &request.employee_ids {
            for date in &dates {
                if skip_existing
                    && ShiftRepository::count_for_employee_on_date(&state.db, employee_id, *date)
                        .await?
                        > 0
                {
                    summary.skipped += 1;
                    continue;
                }

                let fields = ShiftFields {
                    date: *date,
                    ..template_fields.clone()
                };
                ShiftRepository::create(
                    &state.db,
                    &CreateShift {
                        employee_id: employee_id.clone(),
                        fields,
                        sequence: None,
                        template_id: None,
                    },
                )
                .await?;
                summary.created += 1;
            }
        }

        tracing::info!(
            "Bulk range {}..{}: created {}, skipped {}",
            start,
            end,
            summary.created,
            summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::EmployeeRole;
    use crate::db::test_support;
    use chrono::{Datelike, NaiveTime, Weekday};

    fn input(status: &str, start: &str, end: &str) -> ShiftInput {
        ShiftInput {
            date: Some("2025-03-10".to_string()),
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn non_scheduled_statuses_never_carry_times() {
        let fields = normalize(&input("sick_leave", "09:00", "17:00"), d(2025, 3, 10), "#007bff")
            .unwrap();
        assert_eq!(fields.status, ShiftStatus::SickLeave);
        assert_eq!(fields.start_time, None);
        assert_eq!(fields.end_time, None);
        assert_eq!(fields.color, "#dc3545");
    }

    #[test]
    fn scheduled_shifts_need_both_times_or_neither() {
        let fields = normalize(&input("scheduled", "09:00", "17:00"), d(2025, 3, 10), "#123456")
            .unwrap();
        assert_eq!(fields.start_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(fields.color, "#123456");

        let none = normalize(&input("scheduled", "", ""), d(2025, 3, 10), "#007bff").unwrap();
        assert_eq!(none.start_time, None);

        let err = normalize(&input("scheduled", "09:00", ""), d(2025, 3, 10), "#007bff")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_status_and_bad_color() {
        assert!(normalize(&input("napping", "", ""), d(2025, 3, 10), "#007bff").is_err());

        let mut bad_color = input("scheduled", "", "");
        bad_color.color = Some("blue".to_string());
        assert!(normalize(&bad_color, d(2025, 3, 10), "#007bff").is_err());

        assert!(is_valid_color("#A1b2C3"));
        assert!(!is_valid_color("#12345"));
    }

    #[tokio::test]
    async fn employees_cannot_touch_other_peoples_shifts() {
        let state = test_support::state().await;
        let alice = test_support::employee(&state.db, "alice", None).await;
        let bob = test_support::employee(&state.db, "bob", None).await;

        let request = SaveShiftRequest {
            shift_id: None,
            employee_id: bob.id.clone(),
            shift: input("scheduled", "09:00", "17:00"),
        };
        let err = ShiftService::save(&state, &alice, &request).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let own = SaveShiftRequest {
            employee_id: alice.id.clone(),
            ..request
        };
        let shift = ShiftService::save(&state, &alice, &own).await.unwrap();
        assert_eq!(shift.employee_id, alice.id);

        let err = ShiftService::delete(&state, &bob, &shift.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn save_with_shift_id_updates_in_place() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;

        let created = ShiftService::save(
            &state,
            &manager,
            &SaveShiftRequest {
                shift_id: None,
                employee_id: alice.id.clone(),
                shift: input("scheduled", "09:00", "17:00"),
            },
        )
        .await
        .unwrap();

        let updated = ShiftService::save(
            &state,
            &manager,
            &SaveShiftRequest {
                shift_id: Some(created.id.clone()),
                employee_id: alice.id.clone(),
                shift: input("rest_day", "09:00", "17:00"),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.status, ShiftStatus::RestDay);
        assert_eq!(updated.start_time, None);
        assert_eq!(updated.sequence, 1);
    }

    #[tokio::test]
    async fn copy_appends_to_target_slot() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;
        let bob = test_support::employee(&state.db, "bob", None).await;

        let source = ShiftService::save(
            &state,
            &manager,
            &SaveShiftRequest {
                shift_id: None,
                employee_id: alice.id.clone(),
                shift: input("scheduled", "08:00", "16:00"),
            },
        )
        .await
        .unwrap();

        let copy = ShiftService::copy(
            &state,
            &manager,
            &source.id,
            &CopyShiftRequest {
                employee_id: Some(bob.id.clone()),
                date: "2025-03-12".to_string(),
            },
        )
        .await
        .unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.employee_id, bob.id);
        assert_eq!(copy.date, d(2025, 3, 12));
        assert_eq!(copy.start_time, source.start_time);
        assert_eq!(copy.sequence, 1);
    }

    #[tokio::test]
    async fn bulk_range_only_touches_selected_weekdays() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;
        let bob = test_support::employee(&state.db, "bob", None).await;

        // 2025-03-03 is a Monday; two full weeks, Mon/Wed/Fri only.
        let request = ShiftRangeRequest {
            employee_ids: vec![alice.id.clone(), bob.id.clone()],
            start_date: "2025-03-03".to_string(),
            end_date: "2025-03-16".to_string(),
            days_of_week: Some(vec![0, 2, 4]),
            skip_existing: None,
            shift: input("scheduled", "09:00", "17:00"),
        };

        let summary = ShiftService::create_range(&state, &manager, &request)
            .await
            .unwrap();
        assert_eq!(summary.days_matched, 6);
        assert_eq!(summary.created, 12);
        assert_eq!(summary.skipped, 0);

        let shifts = ShiftRepository::list_in_range(&state.db, d(2025, 3, 3), d(2025, 3, 16), None)
            .await
            .unwrap();
        assert_eq!(shifts.len(), 12);
        assert!(shifts.iter().all(|s| matches!(
            s.date.weekday(),
            Weekday::Mon | Weekday::Wed | Weekday::Fri
        )));

        // Re-running skips every occupied slot.
        let again = ShiftService::create_range(&state, &manager, &request)
            .await
            .unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.skipped, 12);
    }

    #[tokio::test]
    async fn bulk_range_respects_max_range_days() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;

        let request = ShiftRangeRequest {
            employee_ids: vec![manager.id.clone()],
            start_date: "2024-01-01".to_string(),
            end_date: "2025-12-31".to_string(),
            days_of_week: None,
            skip_existing: Some(false),
            shift: ShiftInput::default(),
        };
        let err = ShiftService::create_range(&state, &manager, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn listing_is_limited_to_self_for_employees() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;
        let bob = test_support::employee(&state.db, "bob", None).await;

        for who in [&alice, &bob] {
            ShiftService::save(
                &state,
                &manager,
                &SaveShiftRequest {
                    shift_id: None,
                    employee_id: who.id.clone(),
                    shift: input("scheduled", "09:00", "17:00"),
                },
            )
            .await
            .unwrap();
        }

        let query = ShiftListQuery {
            start_date: Some("2025-03-01".to_string()),
            end_date: Some("2025-03-31".to_string()),
            ..Default::default()
        };
        assert_eq!(ShiftService::list(&state, &manager, &query).await.unwrap().len(), 2);

        let own = ShiftService::list(&state, &alice, &query).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].employee_id, alice.id);
    }
}
