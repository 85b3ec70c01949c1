use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Organizational Unit Models
// ============================================================================

/// Level of an organizational unit. Units nest department > division >
/// section > unit, but the tree does not enforce the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ScopeType {
    Department,
    Division,
    Section,
    Unit,
}

impl ScopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::Department => "department",
            ScopeType::Division => "division",
            ScopeType::Section => "section",
            ScopeType::Unit => "unit",
        }
    }
}

impl std::str::FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "department" => Ok(ScopeType::Department),
            "division" => Ok(ScopeType::Division),
            "section" => Ok(ScopeType::Section),
            "unit" => Ok(ScopeType::Unit),
            _ => Err(format!("Invalid scope type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_type: ScopeType,
    pub parent_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrgUnit {
    pub name: String,
    pub description: Option<String>,
    pub unit_type: ScopeType,
    pub parent_id: Option<String>,
}
