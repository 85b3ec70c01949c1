use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Shift Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    RestDay,
    SickLeave,
    PersonalLeave,
    EmergencyLeave,
    AnnualVacation,
    HolidayOff,
    Offset,
    BereavementLeave,
    PaternityLeave,
    MaternityLeave,
    UnionLeave,
    FireCalamityLeave,
    SoloParentLeave,
    SpecialLeaveWomen,
    VawcLeave,
    Other,
}

impl ShiftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::RestDay => "rest_day",
            ShiftStatus::SickLeave => "sick_leave",
            ShiftStatus::PersonalLeave => "personal_leave",
            ShiftStatus::EmergencyLeave => "emergency_leave",
            ShiftStatus::AnnualVacation => "annual_vacation",
            ShiftStatus::HolidayOff => "holiday_off",
            ShiftStatus::Offset => "offset",
            ShiftStatus::BereavementLeave => "bereavement_leave",
            ShiftStatus::PaternityLeave => "paternity_leave",
            ShiftStatus::MaternityLeave => "maternity_leave",
            ShiftStatus::UnionLeave => "union_leave",
            ShiftStatus::FireCalamityLeave => "fire_calamity_leave",
            ShiftStatus::SoloParentLeave => "solo_parent_leave",
            ShiftStatus::SpecialLeaveWomen => "special_leave_women",
            ShiftStatus::VawcLeave => "vawc_leave",
            ShiftStatus::Other => "other",
        }
    }

    /// Default calendar color for the status.
    pub fn color(self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "#007bff",
            ShiftStatus::RestDay => "#6c757d",
            ShiftStatus::SickLeave => "#dc3545",
            ShiftStatus::PersonalLeave => "#ffc107",
            ShiftStatus::EmergencyLeave => "#fd7e14",
            ShiftStatus::AnnualVacation => "#20c997",
            ShiftStatus::HolidayOff => "#6f42c1",
            ShiftStatus::Offset => "#e83e8c",
            ShiftStatus::BereavementLeave => "#495057",
            ShiftStatus::PaternityLeave => "#0dcaf0",
            ShiftStatus::MaternityLeave => "#f8d7da",
            ShiftStatus::UnionLeave => "#d1ecf1",
            ShiftStatus::FireCalamityLeave => "#ff6b6b",
            ShiftStatus::SoloParentLeave => "#4ecdc4",
            ShiftStatus::SpecialLeaveWomen => "#ff9ff3",
            ShiftStatus::VawcLeave => "#a8e6cf",
            ShiftStatus::Other => "#dee2e6",
        }
    }

    pub fn is_leave(self) -> bool {
        self.as_str().contains("leave")
    }

    /// Only scheduled shifts carry a start and end time.
    pub fn has_times(self) -> bool {
        self == ShiftStatus::Scheduled
    }
}

impl std::str::FromStr for ShiftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .map_err(|_| format!("Invalid shift status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WorkArrangement {
    #[default]
    Onsite,
    Wfh,
    Hybrid,
    /// Official business
    Ob,
}

impl WorkArrangement {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkArrangement::Onsite => "onsite",
            WorkArrangement::Wfh => "wfh",
            WorkArrangement::Hybrid => "hybrid",
            WorkArrangement::Ob => "ob",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: ShiftStatus,
    pub role: Option<String>,
    pub work_arrangement: WorkArrangement,
    pub color: String,
    pub notes: Option<String>,
    pub sequence: i64,
    /// Template the shift was materialized from. Cleared, not cascaded, when
    /// the template is deleted.
    pub template_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Attributes a caller may set on a shift. Shared by create, update and the
/// bulk paths so normalization happens in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftFields {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: ShiftStatus,
    pub role: Option<String>,
    pub work_arrangement: WorkArrangement,
    pub color: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateShift {
    pub employee_id: String,
    pub fields: ShiftFields,
    /// Explicit sequence; the repository appends after existing shifts when `None`.
    pub sequence: Option<i64>,
    pub template_id: Option<String>,
}
