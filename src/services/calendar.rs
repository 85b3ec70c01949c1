//! Calendar arithmetic shared by the shift store, the schedule view and the
//! template engine. Everything here is pure.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Years a request date may fall in.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

/// Parse an ISO `YYYY-MM-DD` date, naming the offending field on failure.
/// Years outside `MIN_YEAR..=MAX_YEAR` are rejected.
pub fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("Invalid {}: expected YYYY-MM-DD, got '{}'", field, value))
    })?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(AppError::Validation(format!(
            "Invalid {}: year must be between {} and {}",
            field, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(date)
}

/// Parse a required date that may be absent from the request.
pub fn require_date(value: Option<&str>, field: &str) -> AppResult<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(v, field),
        None => Err(AppError::Validation(format!("{} is required", field))),
    }
}

/// Parse `HH:MM` (seconds optional). Blank input means "no time".
pub fn parse_time(value: Option<&str>, field: &str) -> AppResult<Option<NaiveTime>> {
    let value = match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => return Ok(None),
    };

    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map(Some)
        .map_err(|_| AppError::Validation(format!("Invalid {}: expected HH:MM, got '{}'", field, value)))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Inclusive day count of `[start, end]`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Every date in `[start, end]`; empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .collect()
}

/// Validate a `[start, end]` pair and return its inclusive length.
pub fn validate_range(start: NaiveDate, end: NaiveDate, max_days: Option<i64>) -> AppResult<i64> {
    if start > end {
        return Err(AppError::Validation(
            "start_date must not be after end_date".to_string(),
        ));
    }
    let days = inclusive_days(start, end);
    if let Some(max) = max_days {
        if days > max {
            return Err(AppError::Validation(format!(
                "Date range spans {} days; at most {} are allowed",
                days, max
            )));
        }
    }
    Ok(days)
}

/// Weekday as 0 = Monday … 6 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Whether `date` falls on one of `days` (0 = Monday). `None` selects every day.
pub fn matches_weekdays(date: NaiveDate, days: Option<&[u8]>) -> bool {
    match days {
        Some(days) => days.contains(&weekday_index(date)),
        None => true,
    }
}

/// Monday-to-Sunday week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date
        .checked_sub_signed(Duration::days(weekday_index(date) as i64))
        .unwrap_or(NaiveDate::MIN);
    let end = start
        .checked_add_signed(Duration::days(6))
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let next_month = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(date);
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Day,
    #[default]
    Week,
    Month,
}

impl ViewType {
    pub fn bounds(self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            ViewType::Day => (date, date),
            ViewType::Week => week_bounds(date),
            ViewType::Month => month_bounds(date),
        }
    }
}

/// Human-readable label such as `Jan 06, 2025 - Jan 12, 2025`.
pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %d, %Y"), end.format("%b %d, %Y"))
}

/// Hours between two times; an end before the start crosses midnight.
pub fn duration_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    let mut minutes = (end - start).num_minutes();
    if minutes < 0 {
        minutes += 24 * 60;
    }
    minutes as f64 / 60.0
}

/// Shifts of four hours or more include an unpaid break.
pub fn qualifies_for_break(hours: f64) -> bool {
    hours >= 4.0
}

/// `09:00am-05:30pm`, or `No time set` when either end is missing.
pub fn time_display(start: Option<NaiveTime>, end: Option<NaiveTime>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!(
            "{}-{}",
            s.format("%I:%M%p").to_string().to_lowercase(),
            e.format("%I:%M%p").to_string().to_lowercase()
        ),
        _ => "No time set".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn inclusive_days_counts_both_ends() {
        assert_eq!(inclusive_days(d(2025, 1, 6), d(2025, 1, 6)), 1);
        assert_eq!(inclusive_days(d(2025, 1, 6), d(2025, 1, 12)), 7);
        assert_eq!(inclusive_days(d(2024, 2, 1), d(2024, 2, 29)), 29);
        assert_eq!(inclusive_days(d(2024, 12, 31), d(2025, 1, 1)), 2);
    }

    #[test]
    fn date_range_matches_inclusive_days() {
        let range = date_range(d(2025, 1, 30), d(2025, 2, 2));
        assert_eq!(
            range,
            vec![d(2025, 1, 30), d(2025, 1, 31), d(2025, 2, 1), d(2025, 2, 2)]
        );
        assert_eq!(range.len() as i64, inclusive_days(d(2025, 1, 30), d(2025, 2, 2)));
        assert!(date_range(d(2025, 2, 2), d(2025, 1, 30)).is_empty());
    }

    #[test]
    fn validate_range_rejects_reversed_and_oversized_ranges() {
        assert!(validate_range(d(2025, 1, 2), d(2025, 1, 1), None).is_err());
        assert!(validate_range(d(2025, 1, 1), d(2025, 12, 31), Some(30)).is_err());
        assert_eq!(validate_range(d(2025, 1, 1), d(2025, 1, 31), Some(31)).unwrap(), 31);
    }

    #[test]
    fn weekday_membership_uses_monday_zero() {
        // 2025-01-08 is a Wednesday
        let wednesday = d(2025, 1, 8);
        assert_eq!(weekday_index(wednesday), 2);
        assert!(matches_weekdays(wednesday, Some(&[0, 2, 4])));
        assert!(!matches_weekdays(wednesday, Some(&[5, 6])));
        assert!(matches_weekdays(wednesday, None));
    }

    #[test]
    fn week_and_month_bounds() {
        assert_eq!(week_bounds(d(2025, 1, 8)), (d(2025, 1, 6), d(2025, 1, 12)));
        assert_eq!(week_bounds(d(2025, 1, 12)), (d(2025, 1, 6), d(2025, 1, 12)));
        assert_eq!(month_bounds(d(2024, 2, 14)), (d(2024, 2, 1), d(2024, 2, 29)));
        assert_eq!(month_bounds(d(2025, 12, 25)), (d(2025, 12, 1), d(2025, 12, 31)));
        assert_eq!(ViewType::Day.bounds(d(2025, 3, 3)), (d(2025, 3, 3), d(2025, 3, 3)));
    }

    #[test]
    fn bounds_saturate_at_the_calendar_edges() {
        let (start, end) = week_bounds(NaiveDate::MIN);
        assert_eq!(start, NaiveDate::MIN);
        assert!(end > start);
        let (_, end) = week_bounds(NaiveDate::MAX);
        assert_eq!(end, NaiveDate::MAX);
        assert_eq!(month_bounds(NaiveDate::MAX).1, NaiveDate::MAX);
    }

    #[test]
    fn extended_and_far_years_are_rejected() {
        for raw in ["+262142-12-31", "-262143-01-01", "1899-12-31", "2101-01-01"] {
            assert!(
                matches!(parse_date(raw, "date"), Err(AppError::Validation(_))),
                "{} was accepted",
                raw
            );
        }
        assert_eq!(parse_date("1900-01-01", "date").unwrap(), d(1900, 1, 1));
        assert_eq!(parse_date("2100-12-31", "date").unwrap(), d(2100, 12, 31));
    }

    #[test]
    fn parses_dates_and_times() {
        assert_eq!(parse_date("2025-12-25", "date").unwrap(), d(2025, 12, 25));
        assert!(parse_date("25/12/2025", "date").is_err());
        assert!(require_date(None, "target_start_date").is_err());
        assert!(require_date(Some("  "), "target_start_date").is_err());

        assert_eq!(
            parse_time(Some("09:30"), "start_time").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0)
        );
        assert_eq!(
            parse_time(Some("17:00:00"), "end_time").unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0)
        );
        assert_eq!(parse_time(Some(""), "start_time").unwrap(), None);
        assert!(parse_time(Some("25:00"), "start_time").is_err());
    }

    #[test]
    fn durations_cross_midnight() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(duration_hours(t(9, 0), t(17, 30)), 8.5);
        assert_eq!(duration_hours(t(22, 0), t(6, 0)), 8.0);
        assert!(qualifies_for_break(duration_hours(t(9, 0), t(13, 0))));
        assert!(!qualifies_for_break(duration_hours(t(9, 0), t(12, 30))));
    }

    #[test]
    fn labels() {
        assert_eq!(
            format_date_range(d(2025, 1, 6), d(2025, 1, 12)),
            "Jan 06, 2025 - Jan 12, 2025"
        );
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(time_display(t(9, 0), t(17, 30)), "09:00am-05:30pm");
        assert_eq!(time_display(t(9, 0), None), "No time set");
    }
}
