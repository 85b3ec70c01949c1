use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{DateRemark, Employee, RemarkType, UpsertDateRemark};
use crate::db::DateRemarkRepository;
use crate::error::{AppError, AppResult};
use crate::services::calendar;
use crate::services::shifts::{ensure_can_edit_schedule, is_valid_color};
use crate::AppState;

const HOLIDAY_COLOR: &str = "#dc3545";
const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct RemarkInput {
    pub date: String,
    pub title: String,
    pub description: Option<String>,
    pub remark_type: Option<RemarkType>,
    pub is_work_day: Option<bool>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetHoliday {
    pub month: u32,
    pub day: u32,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PresetSummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Fixed-date public holidays offered as a preset.
pub fn preset_holidays() -> Vec<PresetHoliday> {
    [
        (1, 1, "New Year's Day"),
        (4, 9, "Day of Valor"),
        (5, 1, "Labor Day"),
        (6, 12, "Independence Day"),
        (8, 21, "Ninoy Aquino Day"),
        (11, 1, "All Saints' Day"),
        (11, 30, "Bonifacio Day"),
        (12, 8, "Feast of the Immaculate Conception"),
        (12, 25, "Christmas Day"),
        (12, 30, "Rizal Day"),
        (12, 31, "New Year's Eve"),
    ]
    .into_iter()
    .map(|(month, day, title)| PresetHoliday {
        month,
        day,
        title: title.to_string(),
    })
    .collect()
}

pub struct DateRemarkService;

impl DateRemarkService {
    pub async fn list(
        state: &Arc<AppState>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> AppResult<Vec<DateRemark>> {
        let start = calendar::require_date(start_date, "start_date")?;
        let end = calendar::require_date(end_date, "end_date")?;
        calendar::validate_range(start, end, Some(state.config.schedule.max_range_days))?;
        DateRemarkRepository::list_in_range(&state.db, start, end).await
    }

    pub async fn get_by_date(state: &Arc<AppState>, date: &str) -> AppResult<Option<DateRemark>> {
        let date = calendar::parse_date(date, "date")?;
        DateRemarkRepository::find_by_date(&state.db, date).await
    }

    /// Create the remark for a date, or overwrite the one already there.
    pub async fn upsert(
        state: &Arc<AppState>,
        actor: &Employee,
        input: &RemarkInput,
    ) -> AppResult<DateRemark> {
        ensure_can_edit_schedule(actor)?;

        let date = calendar::parse_date(&input.date, "date")?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }

        let color = match input.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) if is_valid_color(c) => c.to_string(),
            Some(c) => {
                return Err(AppError::Validation(format!(
                    "Invalid color '{}': expected #RRGGBB",
                    c
                )))
            }
            None => HOLIDAY_COLOR.to_string(),
        };

        let remark = DateRemarkRepository::upsert_by_date(
            &state.db,
            &UpsertDateRemark {
                date,
                title: title.to_string(),
                description: input
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
                remark_type: input.remark_type.unwrap_or_default(),
                is_work_day: input.is_work_day.unwrap_or(false),
                color,
            },
            Some(&actor.id),
        )
        .await?;

        tracing::info!("Saved remark '{}' for {}", remark.title, remark.date);
        Ok(remark)
    }

    pub async fn delete(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<()> {
        ensure_can_edit_schedule(actor)?;
        if !DateRemarkRepository::delete(&state.db, id).await? {
            return Err(AppError::NotFound(format!("Date remark {} not found", id)));
        }
        tracing::info!("Deleted date remark {}", id);
        Ok(())
    }

    /// Upsert one holiday remark per preset entry for `year`. Entries that
    /// name an impossible date (Feb 30, …) or carry a blank or over-long
    /// title are skipped.
    pub async fn apply_preset(
        state: &Arc<AppState>,
        actor: &Employee,
        year: i32,
        holidays: Option<Vec<PresetHoliday>>,
    ) -> AppResult<PresetSummary> {
        ensure_can_edit_schedule(actor)?;
        if !(1900..=2100).contains(&year) {
            return Err(AppError::Validation(format!("Invalid year {}", year)));
        }

        let holidays = holidays.unwrap_or_else(preset_holidays);
        let mut summary = PresetSummary::default();

        for holiday in holidays {
            let title = holiday.title.trim();
            let title_ok = !title.is_empty() && title.chars().count() <= MAX_TITLE_LEN;
            let date = match NaiveDate::from_ymd_opt(year, holiday.month, holiday.day) {
                Some(date) if title_ok => date,
                _ => {
                    tracing::debug!(
                        "Skipping preset holiday {}-{} '{}'",
                        holiday.month,
                        holiday.day,
                        holiday.title
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            DateRemarkRepository::upsert_by_date(
                &state.db,
                &UpsertDateRemark {
                    date,
                    title: title.to_string(),
                    description: None,
                    remark_type: RemarkType::Holiday,
                    is_work_day: false,
                    color: HOLIDAY_COLOR.to_string(),
                },
                Some(&actor.id),
            )
            .await?;
            summary.applied += 1;
        }

        tracing::info!(
            "Applied holiday preset for {}: {} applied, {} skipped",
            year,
            summary.applied,
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

    fn remark(date: &str, title: &str) -> RemarkInput {
        RemarkInput {
            date: date.to_string(),
            title: title.to_string(),
            description: None,
            remark_type: None,
            is_work_day: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn posting_twice_for_one_date_keeps_the_second_title() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;

        DateRemarkService::upsert(&state, &manager, &remark("2025-12-25", "Christmas"))
            .await
            .unwrap();
        DateRemarkService::upsert(&state, &manager, &remark("2025-12-25", "Christmas Day"))
            .await
            .unwrap();

        let remarks =
            DateRemarkService::list(&state, Some("2025-12-01"), Some("2025-12-31"))
                .await
                .unwrap();
        assert_eq!(remarks.len(), 1);
        assert_eq!(remarks[0].title, "Christmas Day");
        assert_eq!(remarks[0].color, HOLIDAY_COLOR);
    }

    #[tokio::test]
    async fn employees_cannot_edit_remarks() {
        let state = test_support::state().await;
        let alice = test_support::employee(&state.db, "alice", None).await;

        let err = DateRemarkService::upsert(&state, &alice, &remark("2025-12-25", "Christmas"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn preset_skips_impossible_dates() {
        let state = test_support::state().await;
        let admin = test_support::employee_with_role(
            &state.db,
            "root",
            None,
            EmployeeRole::Administrator,
        )
        .await;

        let custom = vec![
            PresetHoliday {
                month: 2,
                day: 30,
                title: "Impossible".to_string(),
            },
            PresetHoliday {
                month: 2,
                day: 29,
                title: "Leap Day".to_string(),
            },
        ];
        let summary = DateRemarkService::apply_preset(&state, &admin, 2025, Some(custom.clone()))
            .await
            .unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped, 2);

        let summary = DateRemarkService::apply_preset(&state, &admin, 2024, Some(custom))
            .await
            .unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn preset_skips_blank_and_over_long_titles() {
        let state = test_support::state().await;
        let admin = test_support::employee_with_role(
            &state.db,
            "root",
            None,
            EmployeeRole::Administrator,
        )
        .await;

        let custom = vec![
            PresetHoliday {
                month: 3,
                day: 1,
                title: "x".repeat(MAX_TITLE_LEN + 1),
            },
            PresetHoliday {
                month: 3,
                day: 2,
                title: "  ".to_string(),
            },
            PresetHoliday {
                month: 3,
                day: 3,
                title: "y".repeat(MAX_TITLE_LEN),
            },
        ];
        let summary = DateRemarkService::apply_preset(&state, &admin, 2025, Some(custom))
            .await
            .unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 2);

        assert!(DateRemarkService::get_by_date(&state, "2025-03-01")
            .await
            .unwrap()
            .is_none());
        let kept = DateRemarkService::get_by_date(&state, "2025-03-03")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.title.chars().count(), MAX_TITLE_LEN);
    }

    #[tokio::test]
    async fn builtin_preset_marks_non_working_holidays() {
        let state = test_support::state().await;
        let admin = test_support::employee_with_role(
            &state.db,
            "root",
            None,
            EmployeeRole::Administrator,
        )
        .await;

        let summary = DateRemarkService::apply_preset(&state, &admin, 2025, None)
            .await
            .unwrap();
        assert_eq!(summary.applied, preset_holidays().len());

        let christmas = DateRemarkService::get_by_date(&state, "2025-12-25")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(christmas.remark_type, RemarkType::Holiday);
        assert!(!christmas.is_work_day);
    }
}
