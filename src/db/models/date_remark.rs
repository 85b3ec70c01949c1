use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RemarkType {
    #[default]
    Holiday,
    SpecialWorkDay,
    SpecialNonWorkingDay,
    Event,
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DateRemark {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub remark_type: RemarkType,
    pub is_work_day: bool,
    pub color: String,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertDateRemark {
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub remark_type: RemarkType,
    pub is_work_day: bool,
    pub color: String,
}
