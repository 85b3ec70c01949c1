use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ScopeType, ShiftStatus, WorkArrangement};

// ============================================================================
// Schedule Template Models
// ============================================================================

/// A reusable, day-offset-relative snapshot of a shift set.
///
/// The captured roster and shifts live in `template_data` as serialized
/// [`TemplateData`] so a template can be duplicated or re-applied without
/// touching any other table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Inclusive day count of the captured range.
    pub duration_days: i64,
    pub source_start_date: Option<NaiveDate>,
    pub source_end_date: Option<NaiveDate>,
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub is_public: bool,
    pub template_data: String,
    pub created_by: String,
    pub usage_count: i64,
    pub last_used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ScheduleTemplate {
    pub fn data(&self) -> Result<TemplateData, serde_json::Error> {
        serde_json::from_str(&self.template_data)
    }

    /// Public templates are visible to everyone; private ones to their
    /// creator and administrators.
    pub fn is_visible_to(&self, employee: &super::Employee) -> bool {
        self.is_public || self.created_by == employee.id || employee.can_admin()
    }

    pub fn can_be_managed_by(&self, employee: &super::Employee) -> bool {
        self.created_by == employee.id || employee.can_admin()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    pub employees: Vec<TemplateEmployee>,
    pub shifts: Vec<TemplateShift>,
}

/// Roster entry captured with the template, kept for display even after the
/// employee record changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEmployee {
    pub employee_id: String,
    pub name: String,
    pub role: String,
    pub initials: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateShift {
    pub employee_id: String,
    /// Days after the template's first day (0-based).
    pub day_offset: i64,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: ShiftStatus,
    pub role: Option<String>,
    pub work_arrangement: WorkArrangement,
    pub color: String,
    pub notes: Option<String>,
    pub sequence: i64,
}

#[derive(Debug, Clone)]
pub struct CreateScheduleTemplate {
    pub name: String,
    pub description: Option<String>,
    pub duration_days: i64,
    pub source_start_date: Option<NaiveDate>,
    pub source_end_date: Option<NaiveDate>,
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub is_public: bool,
    pub data: TemplateData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}
