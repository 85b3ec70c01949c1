use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EmployeeRole {
    Employee,
    Manager,
    Administrator,
}

/// Contracted shift length; decides the unpaid break taken during a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ScheduleFormat {
    #[serde(rename = "8_hour_shift")]
    #[sqlx(rename = "8_hour_shift")]
    EightHour,
    #[serde(rename = "9_hour_shift")]
    #[sqlx(rename = "9_hour_shift")]
    NineHour,
    #[serde(rename = "others")]
    #[sqlx(rename = "others")]
    Others,
}

impl ScheduleFormat {
    pub fn break_minutes(self) -> u32 {
        match self {
            ScheduleFormat::EightHour => 30,
            ScheduleFormat::NineHour => 60,
            ScheduleFormat::Others => 30,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: EmployeeRole,
    pub job_title: Option<String>,
    pub schedule_format: ScheduleFormat,
    pub org_unit_id: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase()
    }

    pub fn can_edit_schedule(&self) -> bool {
        matches!(
            self.role,
            EmployeeRole::Manager | EmployeeRole::Administrator
        )
    }

    pub fn can_admin(&self) -> bool {
        self.role == EmployeeRole::Administrator
    }

    /// Display role: the job title when set, otherwise the account role.
    pub fn display_role(&self) -> String {
        match &self.job_title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => match self.role {
                EmployeeRole::Employee => "Employee".to_string(),
                EmployeeRole::Manager => "Manager".to_string(),
                EmployeeRole::Administrator => "Administrator".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployee {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: EmployeeRole,
    pub job_title: Option<String>,
    pub schedule_format: Option<ScheduleFormat>,
    pub org_unit_id: Option<String>,
}
