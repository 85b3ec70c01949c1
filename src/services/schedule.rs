use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{DateRemark, Employee, Shift, ShiftStatus};
use crate::db::{DateRemarkRepository, EmployeeRepository, ShiftRepository};
use crate::error::AppResult;
use crate::services::calendar::{self, ViewType};
use crate::services::directory::DirectoryService;
use crate::services::shifts::ensure_can_edit_schedule;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<ViewType>,
    pub date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleView {
    pub view: ViewType,
    pub date: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub employees: Vec<Employee>,
    /// employee id -> date -> shifts in sequence order
    pub grid: BTreeMap<String, BTreeMap<NaiveDate, Vec<Shift>>>,
    pub remarks: BTreeMap<NaiveDate, DateRemark>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyStats {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub employees: usize,
    pub total_shifts: usize,
    pub scheduled: usize,
    pub leave: usize,
    pub rest_days: usize,
}

#[derive(Debug)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

const CSV_HEADER: [&str; 9] = [
    "Employee",
    "Date",
    "Start Time",
    "End Time",
    "Role",
    "Status",
    "Work Arrangement",
    "Notes",
    "Color",
];

/// Cells a spreadsheet would evaluate as a formula get a leading quote.
fn neutralize_formula(value: &str) -> String {
    if value.starts_with(&['=', '+', '-', '@'][..]) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

fn csv_field(value: &str) -> String {
    let safe = neutralize_formula(value);
    if safe.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn csv_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut row = fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

pub fn tally(shifts: &[Shift]) -> WeeklyStats {
    let mut stats = WeeklyStats {
        total_shifts: shifts.len(),
        ..Default::default()
    };
    for shift in shifts {
        match shift.status {
            ShiftStatus::Scheduled => stats.scheduled += 1,
            ShiftStatus::RestDay => stats.rest_days += 1,
            status if status.is_leave() => stats.leave += 1,
            _ => {}
        }
    }
    stats
}

pub struct ScheduleService;

impl ScheduleService {
    pub async fn view(
        state: &Arc<AppState>,
        actor: &Employee,
        query: &ViewQuery,
    ) -> AppResult<ScheduleView> {
        let view = query.view.unwrap_or_default();
        let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => calendar::parse_date(raw, "date")?,
            None => chrono::Local::now().date_naive(),
        };
        let (start, end) = view.bounds(date);

        let employees = DirectoryService::team_for(state, actor).await?;
        let ids: Vec<String> = employees.iter().map(|e| e.id.clone()).collect();
        let shifts =
            ShiftRepository::list_in_range(&state.db, start, end, Some(ids.as_slice())).await?;

        let mut grid: BTreeMap<String, BTreeMap<NaiveDate, Vec<Shift>>> = employees
            .iter()
            .map(|e| (e.id.clone(), BTreeMap::new()))
            .collect();
        for shift in shifts {
            grid.entry(shift.employee_id.clone())
                .or_default()
                .entry(shift.date)
                .or_default()
                .push(shift);
        }

        let remarks = DateRemarkRepository::list_in_range(&state.db, start, end)
            .await?
            .into_iter()
            .map(|r| (r.date, r))
            .collect();

        Ok(ScheduleView {
            view,
            date,
            start,
            end,
            dates: calendar::date_range(start, end),
            employees,
            grid,
            remarks,
        })
    }

    /// Counts for the Monday-to-Sunday week containing `date`.
    pub async fn weekly_stats(
        state: &Arc<AppState>,
        actor: &Employee,
        date: Option<&str>,
    ) -> AppResult<WeeklyStats> {
        let date = match date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => calendar::parse_date(raw, "date")?,
            None => chrono::Local::now().date_naive(),
        };
        let (start, end) = calendar::week_bounds(date);

        let employees = DirectoryService::team_for(state, actor).await?;
        let ids: Vec<String> = employees.iter().map(|e| e.id.clone()).collect();
        let shifts =
            ShiftRepository::list_in_range(&state.db, start, end, Some(ids.as_slice())).await?;

        Ok(WeeklyStats {
            start_date: Some(start),
            end_date: Some(end),
            employees: employees.len(),
            ..tally(&shifts)
        })
    }

    pub async fn export_csv(
        state: &Arc<AppState>,
        actor: &Employee,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> AppResult<CsvExport> {
        ensure_can_edit_schedule(actor)?;
        let start = calendar::require_date(start_date, "start_date")?;
        let end = calendar::require_date(end_date, "end_date")?;
        calendar::validate_range(start, end, Some(state.config.schedule.max_range_days))?;

        let names: HashMap<String, String> = EmployeeRepository::list_all(&state.db)
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e.full_name()))
            .collect();
        let mut shifts = ShiftRepository::list_in_range(&state.db, start, end, None).await?;
        shifts.sort_by(|a, b| {
            let name_a = names.get(&a.employee_id);
            let name_b = names.get(&b.employee_id);
            (a.date, name_a, a.sequence).cmp(&(b.date, name_b, b.sequence))
        });

        let mut body = csv_row(CSV_HEADER);
        for shift in &shifts {
            let name = names.get(&shift.employee_id).map(String::as_str).unwrap_or("");
            body.push_str(&csv_row([
                name.to_string(),
                shift.date.format("%Y-%m-%d").to_string(),
                shift.start_time.map(calendar::format_time).unwrap_or_default(),
                shift.end_time.map(calendar::format_time).unwrap_or_default(),
                shift.role.clone().unwrap_or_default(),
                shift.status.as_str().to_string(),
                shift.work_arrangement.as_str().to_string(),
                shift.notes.clone().unwrap_or_default(),
                shift.color.clone(),
            ]));
        }

        tracing::info!("Exported {} shifts for {}..{}", shifts.len(), start, end);
        Ok(CsvExport {
            filename: format!("schedule_{}_{}.csv", start, end),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{EmployeeRole, ScopeType};
    use crate::db::test_support;
    use crate::error::AppError;
    use crate::services::shifts::{SaveShiftRequest, ShiftInput, ShiftService};

    async fn add(
        state: &Arc<AppState>,
        actor: &Employee,
        who: &Employee,
        date: &str,
        status: &str,
        notes: Option<&str>,
    ) {
        ShiftService::save(
            state,
            actor,
            &SaveShiftRequest {
                shift_id: None,
                employee_id: who.id.clone(),
                shift: ShiftInput {
                    date: Some(date.to_string()),
                    start_time: Some("09:00".to_string()),
                    end_time: Some("17:00".to_string()),
                    status: Some(status.to_string()),
                    notes: notes.map(str::to_string),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
    }

    #[test]
    fn csv_fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_row(["a", "b,c"]), "a,\"b,c\"\r\n");
        assert_eq!(csv_field("=SUM(A1:A2)"), "'=SUM(A1:A2)");
        assert_eq!(csv_field("@cmd,x"), "\"'@cmd,x\"");
    }

    #[tokio::test]
    async fn week_view_groups_shifts_by_employee_and_date() {
        let state = test_support::state().await;
        let dept =
            test_support::org_unit(&state.db, "Operations", ScopeType::Department, None).await;
        let manager = test_support::employee_with_role(
            &state.db,
            "maria",
            Some(&dept.id),
            EmployeeRole::Manager,
        )
        .await;
        let alice = test_support::employee(&state.db, "alice", Some(&dept.id)).await;

        add(&state, &manager, &alice, "2025-01-08", "scheduled", None).await;
        add(&state, &manager, &alice, "2025-01-08", "scheduled", None).await;
        add(&state, &manager, &alice, "2025-01-13", "scheduled", None).await;

        let view = ScheduleService::view(
            &state,
            &manager,
            &ViewQuery {
                view: Some(ViewType::Week),
                date: Some("2025-01-09".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(view.dates.len(), 7);
        assert_eq!(view.start, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(view.employees.len(), 2);

        let alice_week = &view.grid[&alice.id];
        let wednesday = &alice_week[&NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()];
        assert_eq!(wednesday.len(), 2);
        assert_eq!(wednesday[0].sequence, 1);
        assert_eq!(wednesday[1].sequence, 2);
        assert_eq!(alice_week.len(), 1);
        assert!(view.grid[&manager.id].is_empty());
    }

    #[tokio::test]
    async fn weekly_stats_count_statuses() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;

        add(&state, &manager, &alice, "2025-01-06", "scheduled", None).await;
        add(&state, &manager, &alice, "2025-01-07", "sick_leave", None).await;
        add(&state, &manager, &alice, "2025-01-08", "rest_day", None).await;
        add(&state, &manager, &alice, "2025-01-09", "offset", None).await;
        add(&state, &manager, &alice, "2025-01-14", "scheduled", None).await;

        let stats = ScheduleService::weekly_stats(&state, &manager, Some("2025-01-10"))
            .await
            .unwrap();
        assert_eq!(stats.total_shifts, 4);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.leave, 1);
        assert_eq!(stats.rest_days, 1);
        assert_eq!(stats.employees, 2);
    }

    #[tokio::test]
    async fn export_writes_header_and_escaped_rows() {
        let state = test_support::state().await;
        let manager =
            test_support::employee_with_role(&state.db, "maria", None, EmployeeRole::Manager).await;
        let alice = test_support::employee(&state.db, "alice", None).await;
        let notes = Some("Opening, then inventory");
        add(&state, &manager, &alice, "2025-01-06", "scheduled", notes).await;

        let export =
            ScheduleService::export_csv(&state, &manager, Some("2025-01-01"), Some("2025-01-31"))
                .await
                .unwrap();
        assert_eq!(export.filename, "schedule_2025-01-01_2025-01-31.csv");

        let lines: Vec<&str> = export.body.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Employee,Date,Start Time,End Time,Role,Status,Work Arrangement,Notes,Color"
        );
        assert_eq!(
            lines[1],
            "Alice Tester,2025-01-06,09:00,17:00,,scheduled,onsite,\"Opening, then inventory\",#007bff"
        );

        let err = ScheduleService::export_csv(&state, &alice, Some("2025-01-01"), Some("2025-01-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
