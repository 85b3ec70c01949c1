//! Schedule templates: capture a range of shifts as day offsets, then replay
//! them onto another range and roster.
//!
//! Apply and preview share one planning step. Planning is pure: it takes the
//! template data plus what the store already knows (target employees and the
//! occupancy of each target slot) and decides, per (employee, date) slot,
//! whether to create, replace or skip. Execution then only writes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::db::models::{
    CreateScheduleTemplate, CreateShift, Employee, ScheduleTemplate, ScopeType, ShiftFields,
    TemplateData, TemplateEmployee, TemplateShift, UpdateScheduleTemplate,
};
use crate::db::{EmployeeRepository, ScheduleTemplateRepository, ShiftRepository};
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::services::calendar;
use crate::services::directory::{DirectoryService, ResolvedScope};
use crate::services::shifts::{ensure_can_edit_schedule, normalize, ShiftInput};
use crate::AppState;

const MAX_NAME_LEN: usize = 100;

// ============================================================================
// Request / Result types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub scope_type: ScopeType,
    pub scope_id: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualTemplateShift {
    pub employee_id: String,
    pub day_offset: i64,
    #[serde(flatten)]
    pub shift: ShiftInput,
}

/// A template built from an explicit shift set rather than from the store.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration_days: i64,
    pub scope_type: ScopeType,
    pub scope_id: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub shifts: Vec<ManualTemplateShift>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyRequest {
    pub target_start_date: Option<String>,
    /// Defaults to `target_start_date + duration_days - 1`.
    pub target_end_date: Option<String>,
    pub target_scope_type: Option<ScopeType>,
    pub target_scope_id: Option<String>,
    /// Shorthand for a section-typed target scope.
    pub target_section_id: Option<String>,
    #[serde(default)]
    pub replace_existing: bool,
    /// Source employee id -> target employee id.
    pub employee_mappings: Option<HashMap<String, String>>,
    /// Overrides the configured apply mode for this call.
    pub atomic: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub created: usize,
    pub replaced_slots: usize,
    pub skipped: usize,
    pub unmapped: usize,
    pub out_of_range: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub duration_match: bool,
    pub date_range: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub atomic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub date_range: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_match: bool,
    pub template_duration_days: i64,
    pub target_duration_days: i64,
    pub shifts_to_create: usize,
    pub existing_shifts: usize,
    pub slots_to_skip: usize,
    pub slots_to_replace: usize,
    pub target_employees: Vec<TemplateEmployee>,
    pub unmapped: usize,
    pub out_of_range: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// ============================================================================
// Planning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Create,
    Replace,
    Skip,
}

#[derive(Debug, Clone)]
pub struct PlannedSlot {
    pub employee_id: String,
    pub date: NaiveDate,
    pub shifts: Vec<TemplateShift>,
    /// Shifts already stored in the slot.
    pub existing: usize,
    pub action: SlotAction,
}

#[derive(Debug, Clone)]
pub struct ApplyPlan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub template_duration_days: i64,
    pub target_duration_days: i64,
    pub duration_match: bool,
    pub slots: Vec<PlannedSlot>,
    pub unmapped: usize,
    pub out_of_range: usize,
    /// Template rows whose target employee is unknown or inactive.
    pub failures: Vec<String>,
    pub target_employees: Vec<TemplateEmployee>,
}

impl ApplyPlan {
    pub fn date_range(&self) -> String {
        calendar::format_date_range(self.start, self.end)
    }

    fn slots_with(&self, action: SlotAction) -> impl Iterator<Item = &PlannedSlot> {
        self.slots.iter().filter(move |s| s.action == action)
    }

    pub fn shifts_to_create(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.action != SlotAction::Skip)
            .map(|s| s.shifts.len())
            .sum()
    }

    pub fn existing_in_conflicts(&self) -> usize {
        self.slots.iter().map(|s| s.existing).sum()
    }

    fn summary(&self, atomic: bool) -> ApplySummary {
        ApplySummary {
            skipped: self.slots_with(SlotAction::Skip).count(),
            unmapped: self.unmapped,
            out_of_range: self.out_of_range,
            failed: self.failures.len(),
            errors: self.failures.clone(),
            duration_match: self.duration_match,
            date_range: self.date_range(),
            start_date: Some(self.start),
            end_date: Some(self.end),
            atomic,
            ..Default::default()
        }
    }
}

/// What planning needs to know about the target side.
pub struct PlanContext<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration_days: i64,
    pub mappings: Option<&'a HashMap<String, String>>,
    pub target_scope: Option<&'a HashSet<String>>,
    /// Active employees that may receive shifts, by id.
    pub employees: &'a HashMap<String, Employee>,
    /// Stored shift count per (employee, date).
    pub existing: &'a HashMap<(String, NaiveDate), usize>,
    pub replace_existing: bool,
}

impl PlanContext<'_> {
    /// Target employee for a source employee, or `None` when unmapped.
    fn map_employee(&self, source: &str) -> Option<String> {
        let target = match self.mappings {
            Some(mappings) => mappings.get(source)?.trim().to_string(),
            None => source.to_string(),
        };
        if target.is_empty() {
            return None;
        }
        match self.target_scope {
            Some(scope) if !scope.contains(&target) => None,
            _ => Some(target),
        }
    }
}

/// Default the end date from the template length and validate the range.
pub fn resolve_target_range(
    duration_days: i64,
    start: Option<&str>,
    end: Option<&str>,
    max_days: i64,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = calendar::require_date(start, "target_start_date")?;
    let end = match end.map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => calendar::parse_date(raw, "target_end_date")?,
        None => {
            if duration_days < 1 || duration_days > max_days {
                return Err(AppError::Validation(format!(
                    "Template spans {} days; at most {} are allowed",
                    duration_days, max_days
                )));
            }
            start
                .checked_add_signed(Duration::days(duration_days - 1))
                .ok_or_else(|| {
                    AppError::Validation("target_start_date is out of range".to_string())
                })?
        }
    };
    calendar::validate_range(start, end, Some(max_days))?;
    Ok((start, end))
}

pub fn build_plan(data: &TemplateData, ctx: &PlanContext<'_>) -> ApplyPlan {
    let target_duration_days = calendar::inclusive_days(ctx.start, ctx.end);
    let mut plan = ApplyPlan {
        start: ctx.start,
        end: ctx.end,
        template_duration_days: ctx.duration_days,
        target_duration_days,
        duration_match: target_duration_days == ctx.duration_days,
        slots: Vec::new(),
        unmapped: 0,
        out_of_range: 0,
        failures: Vec::new(),
        target_employees: Vec::new(),
    };

    let mut shifts: Vec<&TemplateShift> = data.shifts.iter().collect();
    shifts.sort_by(|a, b| {
        (&a.employee_id, a.day_offset, a.sequence).cmp(&(&b.employee_id, b.day_offset, b.sequence))
    });

    let mut grouped: BTreeMap<(String, NaiveDate), Vec<TemplateShift>> = BTreeMap::new();

    for shift in shifts {
        if shift.day_offset < 0 || shift.day_offset >= target_duration_days {
            plan.out_of_range += 1;
            continue;
        }
        let date = ctx.start + Duration::days(shift.day_offset);

        let target = match ctx.map_employee(&shift.employee_id) {
            Some(target) => target,
            None => {
                plan.unmapped += 1;
                continue;
            }
        };

        if !ctx.employees.contains_key(&target) {
            plan.failures.push(format!(
                "{}: employee {} not found or inactive",
                date, target
            ));
            continue;
        }

        grouped.entry((target, date)).or_default().push(shift.clone());
    }

    for ((employee_id, date), shifts) in grouped {
        let existing = ctx
            .existing
            .get(&(employee_id.clone(), date))
            .copied()
            .unwrap_or(0);
        let action = match (existing, ctx.replace_existing) {
            (0, _) => SlotAction::Create,
            (_, true) => SlotAction::Replace,
            (_, false) => SlotAction::Skip,
        };
        plan.slots.push(PlannedSlot {
            employee_id,
            date,
            shifts,
            existing,
            action,
        });
    }

    let mut seen = HashSet::new();
    for entry in &data.employees {
        if let Some(employee) = ctx
            .map_employee(&entry.employee_id)
            .and_then(|id| ctx.employees.get(&id))
        {
            if seen.insert(employee.id.clone()) {
                plan.target_employees.push(roster_entry(employee));
            }
        }
    }

    plan
}

fn roster_entry(employee: &Employee) -> TemplateEmployee {
    TemplateEmployee {
        employee_id: employee.id.clone(),
        name: employee.full_name(),
        role: employee.display_role(),
        initials: employee.initials(),
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Template name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Template name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

pub fn template_data(template: &ScheduleTemplate) -> AppResult<TemplateData> {
    template.data().map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "Template {} has unreadable data: {}",
            template.id,
            e
        ))
    })
}

// ============================================================================
// Template Service
// ============================================================================

pub struct TemplateService;

impl TemplateService {
    async fn resolve_non_empty_scope(
        state: &Arc<AppState>,
        scope_type: ScopeType,
        scope_id: &str,
    ) -> AppResult<ResolvedScope> {
        let scope = DirectoryService::resolve_scope(state, Some(scope_type), scope_id).await?;
        if scope.employees.is_empty() {
            return Err(AppError::Validation(format!(
                "No active employees found in {} '{}'",
                scope_type.as_str(),
                scope.unit.name
            )));
        }
        Ok(scope)
    }

    async fn load_visible(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
    ) -> AppResult<ScheduleTemplate> {
        let template = ScheduleTemplateRepository::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))?;
        if !template.is_visible_to(actor) {
            return Err(AppError::Forbidden(
                "You do not have access to this template".to_string(),
            ));
        }
        Ok(template)
    }

    async fn load_managed(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
    ) -> AppResult<ScheduleTemplate> {
        let template = Self::load_visible(state, actor, id).await?;
        if !template.can_be_managed_by(actor) {
            return Err(AppError::Forbidden(
                "Only the creator or an administrator can change this template".to_string(),
            ));
        }
        Ok(template)
    }

    /// Capture the shifts of a scope over `[start_date, end_date]`.
    pub async fn create_snapshot(
        state: &Arc<AppState>,
        actor: &Employee,
        request: &SnapshotRequest,
    ) -> AppResult<ScheduleTemplate> {
        ensure_can_edit_schedule(actor)?;
        let name = validate_name(&request.name)?;
        let start = calendar::parse_date(&request.start_date, "start_date")?;
        let end = calendar::parse_date(&request.end_date, "end_date")?;
        let duration_days =
            calendar::validate_range(start, end, Some(state.config.schedule.max_range_days))?;

        let scope =
            Self::resolve_non_empty_scope(state, request.scope_type, &request.scope_id).await?;
        let employee_ids = scope.employee_ids();
        let stored =
            ShiftRepository::list_in_range(&state.db, start, end, Some(employee_ids.as_slice()))
                .await?;

        let data = TemplateData {
            employees: scope.employees.iter().map(roster_entry).collect(),
            shifts: stored
                .into_iter()
                .map(|s| TemplateShift {
                    day_offset: (s.date - start).num_days(),
                    employee_id: s.employee_id,
                    start_time: s.start_time,
                    end_time: s.end_time,
                    status: s.status,
                    role: s.role,
                    work_arrangement: s.work_arrangement,
                    color: s.color,
                    notes: s.notes,
                    sequence: s.sequence,
                })
                .collect(),
        };

        let template = ScheduleTemplateRepository::create(
            &state.db,
            &actor.id,
            &CreateScheduleTemplate {
                name,
                description: clean_description(request.description.as_deref()),
                duration_days,
                source_start_date: Some(start),
                source_end_date: Some(end),
                scope_type: request.scope_type,
                scope_id: scope.unit.id.clone(),
                is_public: request.is_public,
                data,
            },
        )
        .await?;

        tracing::info!(
            "Snapshot template {} '{}' captured {} days for {} employees",
            template.id,
            template.name,
            template.duration_days,
            scope.employees.len()
        );
        Ok(template)
    }

    /// Build a template from an explicit shift set.
    pub async fn create(
        state: &Arc<AppState>,
        actor: &Employee,
        request: &CreateTemplateRequest,
    ) -> AppResult<ScheduleTemplate> {
        ensure_can_edit_schedule(actor)?;
        let name = validate_name(&request.name)?;
        if request.duration_days < 1 || request.duration_days > state.config.schedule.max_range_days {
            return Err(AppError::Validation(format!(
                "duration_days must be between 1 and {}",
                state.config.schedule.max_range_days
            )));
        }

        let scope =
            Self::resolve_non_empty_scope(state, request.scope_type, &request.scope_id).await?;

        let mut next_sequence: HashMap<(String, i64), i64> = HashMap::new();
        let mut shifts = Vec::with_capacity(request.shifts.len());
        for entry in &request.shifts {
            if !scope.contains(&entry.employee_id) {
                return Err(AppError::Validation(format!(
                    "Employee {} is not in the template scope",
                    entry.employee_id
                )));
            }
            if entry.day_offset < 0 || entry.day_offset >= request.duration_days {
                return Err(AppError::Validation(format!(
                    "day_offset {} is outside 0..{}",
                    entry.day_offset, request.duration_days
                )));
            }

            let fields = normalize(
                &entry.shift,
                NaiveDate::MIN,
                &state.config.schedule.default_shift_color,
            )?;
            let sequence = next_sequence
                .entry((entry.employee_id.clone(), entry.day_offset))
                .or_insert(0);
            *sequence += 1;

            shifts.push(TemplateShift {
                employee_id: entry.employee_id.clone(),
                day_offset: entry.day_offset,
                start_time: fields.start_time,
                end_time: fields.end_time,
                status: fields.status,
                role: fields.role,
                work_arrangement: fields.work_arrangement,
                color: fields.color,
                notes: fields.notes,
                sequence: *sequence,
            });
        }

        let template = ScheduleTemplateRepository::create(
            &state.db,
            &actor.id,
            &CreateScheduleTemplate {
                name,
                description: clean_description(request.description.as_deref()),
                duration_days: request.duration_days,
                source_start_date: None,
                source_end_date: None,
                scope_type: request.scope_type,
                scope_id: scope.unit.id.clone(),
                is_public: request.is_public,
                data: TemplateData {
                    employees: scope.employees.iter().map(roster_entry).collect(),
                    shifts,
                },
            },
        )
        .await?;

        tracing::info!("Created template {} '{}'", template.id, template.name);
        Ok(template)
    }

    pub async fn list(state: &Arc<AppState>, actor: &Employee) -> AppResult<Vec<ScheduleTemplate>> {
        ScheduleTemplateRepository::list_visible(&state.db, &actor.id, actor.can_admin()).await
    }

    pub async fn get(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
    ) -> AppResult<ScheduleTemplate> {
        Self::load_visible(state, actor, id).await
    }

    pub async fn update(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        update: &UpdateScheduleTemplate,
    ) -> AppResult<ScheduleTemplate> {
        Self::load_managed(state, actor, id).await?;

        let update = UpdateScheduleTemplate {
            name: match update.name.as_deref() {
                Some(name) => Some(validate_name(name)?),
                None => None,
            },
            description: update.description.as_deref().map(|d| d.trim().to_string()),
            is_public: update.is_public,
        };

        let template = ScheduleTemplateRepository::update(&state.db, id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))?;
        tracing::info!("Updated template {}", template.id);
        Ok(template)
    }

    /// Private copy owned by the caller, with usage statistics reset.
    pub async fn duplicate(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        request: &DuplicateRequest,
    ) -> AppResult<ScheduleTemplate> {
        ensure_can_edit_schedule(actor)?;
        let source = Self::load_visible(state, actor, id).await?;
        let name = validate_name(&request.name)?;

        let copy = ScheduleTemplateRepository::create(
            &state.db,
            &actor.id,
            &CreateScheduleTemplate {
                name,
                description: source.description.clone(),
                duration_days: source.duration_days,
                source_start_date: source.source_start_date,
                source_end_date: source.source_end_date,
                scope_type: source.scope_type,
                scope_id: source.scope_id.clone(),
                is_public: false,
                data: template_data(&source)?,
            },
        )
        .await?;

        tracing::info!("Duplicated template {} as {}", source.id, copy.id);
        Ok(copy)
    }

    /// Delete a template. Shifts it created stay, detached from it; returns
    /// how many were kept.
    pub async fn delete(state: &Arc<AppState>, actor: &Employee, id: &str) -> AppResult<i64> {
        Self::load_managed(state, actor, id).await?;
        let kept = ShiftRepository::count_by_template(&state.db, id).await?;
        if !ScheduleTemplateRepository::delete(&state.db, id).await? {
            return Err(AppError::NotFound(format!("Template {} not found", id)));
        }
        tracing::info!("Deleted template {}, keeping {} shift(s)", id, kept);
        Ok(kept)
    }

    /// Load everything planning needs and build the plan.
    async fn plan(
        state: &Arc<AppState>,
        template: &ScheduleTemplate,
        request: &ApplyRequest,
    ) -> AppResult<ApplyPlan> {
        let data = template_data(template)?;
        let (start, end) = resolve_target_range(
            template.duration_days,
            request.target_start_date.as_deref(),
            request.target_end_date.as_deref(),
            state.config.schedule.max_range_days,
        )?;

        let scope_id = request.target_scope_id.as_deref().filter(|s| !s.trim().is_empty());
        let section_id = request.target_section_id.as_deref().filter(|s| !s.trim().is_empty());
        let target_scope = match (scope_id, section_id) {
            (Some(id), _) => {
                Some(DirectoryService::resolve_scope(state, request.target_scope_type, id).await?)
            }
            (None, Some(id)) => {
                Some(DirectoryService::resolve_scope(state, Some(ScopeType::Section), id).await?)
            }
            (None, None) => None,
        };
        let target_scope: Option<HashSet<String>> =
            target_scope.map(|s| s.employees.into_iter().map(|e| e.id).collect());

        let mappings = request.employee_mappings.as_ref().filter(|m| !m.is_empty());

        let mut candidates: Vec<String> = data
            .employees
            .iter()
            .map(|e| &e.employee_id)
            .chain(data.shifts.iter().map(|s| &s.employee_id))
            .filter_map(|source| match mappings {
                Some(m) => m.get(source).map(|t| t.trim().to_string()),
                None => Some(source.clone()),
            })
            .collect();
        candidates.sort();
        candidates.dedup();

        let employees: HashMap<String, Employee> =
            EmployeeRepository::find_by_ids(&state.db, &candidates)
                .await?
                .into_iter()
                .filter(|e| e.is_active)
                .map(|e| (e.id.clone(), e))
                .collect();

        let mut existing: HashMap<(String, NaiveDate), usize> = HashMap::new();
        for shift in ShiftRepository::list_in_range(&state.db, start, end, Some(candidates.as_slice()))
            .await? {
            *existing.entry((shift.employee_id, shift.date)).or_insert(0) += 1;
        }

        Ok(build_plan(
            &data,
            &PlanContext {
                start,
                end,
                duration_days: template.duration_days,
                mappings,
                target_scope: target_scope.as_ref(),
                employees: &employees,
                existing: &existing,
                replace_existing: request.replace_existing,
            },
        ))
    }

    /// Dry run of [`TemplateService::apply`].
    pub async fn preview(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        request: &ApplyRequest,
    ) -> AppResult<PreviewSummary> {
        ensure_can_edit_schedule(actor)?;
        let template = Self::load_visible(state, actor, id).await?;
        let plan = Self::plan(state, &template, request).await?;

        Ok(PreviewSummary {
            date_range: plan.date_range(),
            start_date: plan.start,
            end_date: plan.end,
            duration_match: plan.duration_match,
            template_duration_days: plan.template_duration_days,
            target_duration_days: plan.target_duration_days,
            shifts_to_create: plan.shifts_to_create(),
            existing_shifts: plan.existing_in_conflicts(),
            slots_to_skip: plan.slots_with(SlotAction::Skip).count(),
            slots_to_replace: plan.slots_with(SlotAction::Replace).count(),
            unmapped: plan.unmapped,
            out_of_range: plan.out_of_range,
            failed: plan.failures.len(),
            errors: plan.failures.clone(),
            target_employees: plan.target_employees,
        })
    }

    /// Materialize a template onto a target range.
    ///
    /// Non-atomic applies write each slot in its own transaction and report
    /// failures in the summary. Atomic applies write everything in one
    /// transaction and fail the whole call on the first problem, returning
    /// the partial summary as error details.
    pub async fn apply(
        state: &Arc<AppState>,
        actor: &Employee,
        id: &str,
        request: &ApplyRequest,
    ) -> Result<ApplySummary, AppErrorWithDetails> {
        ensure_can_edit_schedule(actor)?;
        let template = Self::load_visible(state, actor, id).await?;
        let plan = Self::plan(state, &template, request).await?;
        let atomic = request
            .atomic
            .unwrap_or(state.config.schedule.template_apply_atomic);

        let summary = if atomic {
            Self::apply_atomic(state, &template, &plan).await?
        } else {
            Self::apply_per_slot(state, &template, &plan).await?
        };

        tracing::info!(
            "Applied template {} to {}: created {}, replaced {}, skipped {}, failed {}",
            template.id,
            summary.date_range,
            summary.created,
            summary.replaced_slots,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    async fn write_slot(
        conn: &mut SqliteConnection,
        template_id: &str,
        slot: &PlannedSlot,
    ) -> AppResult<usize> {
        if slot.action == SlotAction::Replace {
            ShiftRepository::delete_slot(&mut *conn, &slot.employee_id, slot.date).await?;
        }

        for shift in &slot.shifts {
            ShiftRepository::create(
                &mut *conn,
                &CreateShift {
                    employee_id: slot.employee_id.clone(),
                    fields: ShiftFields {
                        date: slot.date,
                        start_time: shift.start_time,
                        end_time: shift.end_time,
                        status: shift.status,
                        role: shift.role.clone(),
                        work_arrangement: shift.work_arrangement,
                        color: shift.color.clone(),
                        notes: shift.notes.clone(),
                    },
                    sequence: None,
                    template_id: Some(template_id.to_string()),
                },
            )
            .await?;
        }

        Ok(slot.shifts.len())
    }

    async fn apply_per_slot(
        state: &Arc<AppState>,
        template: &ScheduleTemplate,
        plan: &ApplyPlan,
    ) -> AppResult<ApplySummary> {
        let mut summary = plan.summary(false);

        for slot in plan.slots.iter().filter(|s| s.action != SlotAction::Skip) {
            let result = async {
                let mut tx = state.db.begin().await?;
                let written = Self::write_slot(&mut *tx, &template.id, slot).await?;
                tx.commit().await?;
                Ok::<usize, AppError>(written)
            }
            .await;

            match result {
                Ok(written) => {
                    summary.created += written;
                    if slot.action == SlotAction::Replace {
                        summary.replaced_slots += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Template {} slot {} / {} failed: {}",
                        template.id,
                        slot.employee_id,
                        slot.date,
                        e
                    );
                    summary.failed += slot.shifts.len();
                    summary
                        .errors
                        .push(format!("{}: employee {}: {}", slot.date, slot.employee_id, e));
                }
            }
        }

        // A run where every row failed does not count as a use.
        if summary.created > 0 || summary.failed == 0 {
            ScheduleTemplateRepository::record_usage(&state.db, &template.id).await?;
        }
        Ok(summary)
    }

    async fn apply_atomic(
        state: &Arc<AppState>,
        template: &ScheduleTemplate,
        plan: &ApplyPlan,
    ) -> Result<ApplySummary, AppErrorWithDetails> {
        let mut summary = plan.summary(true);

        if !plan.failures.is_empty() {
            return Err(rolled_back(&summary));
        }

        let mut tx = state.db.begin().await.map_err(AppError::Database)?;

        for slot in plan.slots.iter().filter(|s| s.action != SlotAction::Skip) {
            match Self::write_slot(&mut *tx, &template.id, slot).await {
                Ok(written) => {
                    summary.created += written;
                    if slot.action == SlotAction::Replace {
                        summary.replaced_slots += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Template {} atomic apply failed at {} / {}: {}",
                        template.id,
                        slot.employee_id,
                        slot.date,
                        e
                    );
                    summary.failed += slot.shifts.len();
                    summary
                        .errors
                        .push(format!("{}: employee {}: {}", slot.date, slot.employee_id, e));
                    // Dropping the transaction rolls back every slot written so far.
                    return Err(rolled_back(&summary));
                }
            }
        }

        ScheduleTemplateRepository::record_usage(&mut *tx, &template.id).await?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(summary)
    }
}

fn rolled_back(summary: &ApplySummary) -> AppErrorWithDetails {
    let mut details = summary.clone();
    details.created = 0;
    details.replaced_slots = 0;
    AppError::Conflict(format!(
        "Template apply rolled back: {} row(s) failed",
        summary.failed
    ))
    .with_details(serde_json::to_value(&details).unwrap_or_default())
}
