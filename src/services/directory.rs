use std::sync::Arc;

use crate::db::models::{CreateEmployee, CreateOrgUnit, Employee, OrgUnit, ScopeType};
use crate::db::{EmployeeRepository, OrgUnitRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

/// A scope selector resolved against the org tree.
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    pub unit: OrgUnit,
    pub employees: Vec<Employee>,
}

impl ResolvedScope {
    pub fn contains(&self, employee_id: &str) -> bool {
        self.employees.iter().any(|e| e.id == employee_id)
    }

    pub fn employee_ids(&self) -> Vec<String> {
        self.employees.iter().map(|e| e.id.clone()).collect()
    }
}

pub struct DirectoryService;

impl DirectoryService {
    /// Resolve an org unit to the active employees of its subtree. When a
    /// scope type is given it must match the unit's type.
    pub async fn resolve_scope(
        state: &Arc<AppState>,
        scope_type: Option<ScopeType>,
        scope_id: &str,
    ) -> AppResult<ResolvedScope> {
        let unit = OrgUnitRepository::find_by_id(&state.db, scope_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organizational unit {} not found", scope_id)))?;

        if let Some(expected) = scope_type {
            if unit.unit_type != expected {
                return Err(AppError::Validation(format!(
                    "Unit '{}' is a {}, not a {}",
                    unit.name,
                    unit.unit_type.as_str(),
                    expected.as_str()
                )));
            }
        }

        let employees = EmployeeRepository::list_active_in_scope(&state.db, &unit.id).await?;
        Ok(ResolvedScope { unit, employees })
    }

    /// Employees whose schedule `actor` sees by default: a schedule editor
    /// sees their org subtree (everyone when unassigned), anyone else only
    /// themselves.
    pub async fn team_for(state: &Arc<AppState>, actor: &Employee) -> AppResult<Vec<Employee>> {
        if !actor.can_edit_schedule() {
            return Ok(vec![actor.clone()]);
        }

        match &actor.org_unit_id {
            Some(unit_id) => {
                let mut team = EmployeeRepository::list_active_in_scope(&state.db, unit_id).await?;
                if !team.iter().any(|e| e.id == actor.id) {
                    team.push(actor.clone());
                }
                Ok(team)
            }
            None => EmployeeRepository::list_active(&state.db).await,
        }
    }

    pub async fn create_org_unit(
        state: &Arc<AppState>,
        create: &CreateOrgUnit,
    ) -> AppResult<OrgUnit> {
        if create.name.trim().is_empty() {
            return Err(AppError::Validation("Unit name is required".to_string()));
        }

        if let Some(parent_id) = &create.parent_id {
            OrgUnitRepository::find_by_id(&state.db, parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Parent unit {} not found", parent_id)))?;
        }

        let unit = OrgUnitRepository::create(&state.db, create).await?;
        tracing::info!("Created {} '{}' ({})", unit.unit_type.as_str(), unit.name, unit.id);
        Ok(unit)
    }

    pub async fn create_employee(
        state: &Arc<AppState>,
        create: &CreateEmployee,
    ) -> AppResult<Employee> {
        if create.username.trim().is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if !create.email.contains('@') {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if create.password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if create.first_name.trim().is_empty() || create.last_name.trim().is_empty() {
            return Err(AppError::Validation(
                "First and last name are required".to_string(),
            ));
        }

        if let Some(unit_id) = &create.org_unit_id {
            OrgUnitRepository::find_by_id(&state.db, unit_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Organizational unit {} not found", unit_id)))?;
        }

        let hash = AuthService::hash_password(state, &create.password)?;
        let employee = EmployeeRepository::create(&state.db, create, &hash).await?;
        tracing::info!("Created employee {} ({})", employee.username, employee.id);
        Ok(employee)
    }

    pub async fn list_org_units(state: &Arc<AppState>) -> AppResult<Vec<OrgUnit>> {
        OrgUnitRepository::list_all(&state.db).await
    }

    pub async fn list_employees(state: &Arc<AppState>) -> AppResult<Vec<Employee>> {
        EmployeeRepository::list_all(&state.db).await
    }

    pub async fn set_active(
        state: &Arc<AppState>,
        employee_id: &str,
        is_active: bool,
    ) -> AppResult<Employee> {
        let employee = EmployeeRepository::set_active(&state.db, employee_id, is_active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;
        tracing::info!("Employee {} active = {}", employee.id, is_active);
        Ok(employee)
    }
}
