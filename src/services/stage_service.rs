//! Per-project stage instances materialized from templates.
//!
//! Status and deadline changes are written to the history ledger inside the
//! same transaction as the stage update, ledger row first.

use std::collections::{BTreeSet, HashSet};

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::database::entities::{
    products, projects, stage_files, stage_templates, stages, StageStatus,
};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{load_project, load_stage, Actor};
use crate::services::history_service::{
    record_deadline_change, record_status_change, INITIAL_DEADLINE_REASON,
};
use crate::services::template_service::active_templates;
use crate::services::validation::{patch_field, ValidationService};
use crate::stage_data::{
    check_known_keys, validate_custom_field_values, validate_distribution, validate_quantities,
    DistributionData, FlagMap, QuantityMap, TextMap,
};

/// Partial stage update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchStageRequest {
    pub status: Option<StageStatus>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<String>, example = "2026-02-01")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<String>, example = "2026-03-15")]
    pub deadline: Option<Option<String>>,
    /// Needed when `deadline` replaces an existing one
    pub deadline_reason: Option<String>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<FlagMap>)]
    pub checklist_data: Option<Option<FlagMap>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<TextMap>)]
    pub checklist_input_data: Option<Option<TextMap>>,
    pub conditional_enabled: Option<bool>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<FlagMap>)]
    pub conditional_substages_data: Option<Option<FlagMap>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<TextMap>)]
    pub custom_fields_data: Option<Option<TextMap>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<DistributionData>)]
    pub distribution_data: Option<Option<DistributionData>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<QuantityMap>)]
    pub product_quantities_data: Option<Option<QuantityMap>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineRequest {
    #[schema(value_type = Option<String>, example = "2026-03-15")]
    pub deadline: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStagesRequest {
    pub template_ids: Vec<i32>,
}

/// Fresh stage row for `template` at `position`
fn stage_from_template(
    project_id: i32,
    template: &stage_templates::Model,
    position: i32,
) -> stages::ActiveModel {
    let now = Utc::now();
    let checklist = template.checklist_keys();
    let substages = template.substage_keys();

    stages::ActiveModel {
        project_id: Set(project_id),
        template_id: Set(Some(template.id)),
        name: Set(template.name.clone()),
        kind: Set(template.kind),
        position: Set(position),
        status: Set(StageStatus::Waiting),
        start_date: Set(None),
        deadline: Set(None),
        checklist_data: Set(template
            .has_checklist
            .then(|| FlagMap::unchecked(checklist.iter().map(String::as_str)))),
        checklist_input_data: Set(None),
        conditional_enabled: Set(true),
        conditional_substages_data: Set(template
            .has_conditional_substages
            .then(|| FlagMap::unchecked(substages.iter().map(String::as_str)))),
        custom_fields_data: Set(None),
        distribution_data: Set(None),
        product_quantities_data: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Keep the first template per position, by `(position, id)`
pub fn dedupe_by_position(
    mut templates: Vec<stage_templates::Model>,
) -> Vec<stage_templates::Model> {
    templates.sort_by_key(|t| (t.position, t.id));
    let mut seen = HashSet::new();
    templates.retain(|t| {
        let first = seen.insert(t.position);
        if !first {
            warn!(
                "Skipping template {} '{}': position {} already taken",
                t.id, t.name, t.position
            );
        }
        first
    });
    templates
}

/// One waiting stage per template, at the template's own position
pub async fn materialize_for_project<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    templates: &[stage_templates::Model],
) -> CoreResult<Vec<stages::Model>> {
    let mut created = Vec::with_capacity(templates.len());
    for template in templates {
        let stage = stage_from_template(project_id, template, template.position)
            .insert(db)
            .await?;
        created.push(stage);
    }
    Ok(created)
}

/// Stages of a project in pipeline order
pub async fn project_stages<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
) -> CoreResult<Vec<stages::Model>> {
    Ok(stages::Entity::find()
        .filter(stages::Column::ProjectId.eq(project_id))
        .order_by_asc(stages::Column::Position)
        .all(db)
        .await?)
}

/// Reason stored with a deadline change; required once a deadline exists
fn deadline_reason(
    field: &str,
    existing: Option<NaiveDate>,
    reason: Option<&str>,
) -> CoreResult<String> {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    match (existing, reason) {
        (_, Some(reason)) => Ok(reason.to_string()),
        (None, None) => Ok(INITIAL_DEADLINE_REASON.to_string()),
        (Some(_), None) => Err(CoreError::invalid_field(
            field,
            "A reason is required when changing an existing deadline",
        )),
    }
}

fn allowed_keys(template_keys: Vec<String>, stored: Option<&FlagMap>) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = template_keys.into_iter().collect();
    if let Some(stored) = stored {
        keys.extend(stored.0.keys().cloned());
    }
    keys
}

#[derive(Clone)]
pub struct StageService {
    db: DatabaseConnection,
}

impl StageService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Backfill for projects created without stages. No-op when any stage exists.
    pub async fn generate_stages(
        &self,
        actor: &Actor,
        project_id: i32,
    ) -> CoreResult<Vec<stages::Model>> {
        let project = load_project(&self.db, actor, project_id).await?;

        let txn = self.db.begin().await?;
        if !project_stages(&txn, project.id).await?.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let templates = dedupe_by_position(active_templates(&txn, project.company_id).await?);
        let created = materialize_for_project(&txn, project.id, &templates).await?;
        txn.commit().await?;

        info!("Generated {} stages for project {}", created.len(), project.id);
        Ok(created)
    }

    /// Append stages for templates not yet represented in the project
    pub async fn add_stages(
        &self,
        actor: &Actor,
        project_id: i32,
        template_ids: Vec<i32>,
    ) -> CoreResult<Vec<stages::Model>> {
        if template_ids.is_empty() {
            return Err(CoreError::invalid_field(
                "templateIds",
                "Select at least one template",
            ));
        }
        let project = load_project(&self.db, actor, project_id).await?;

        let requested: BTreeSet<i32> = template_ids.into_iter().collect();

        let txn = self.db.begin().await?;
        let existing = project_stages(&txn, project.id).await?;
        let represented: HashSet<i32> = existing.iter().filter_map(|s| s.template_id).collect();

        // Templates already in the project are skipped, even if since deactivated
        let missing: BTreeSet<i32> = requested
            .into_iter()
            .filter(|id| !represented.contains(id))
            .collect();
        if missing.is_empty() {
            return Err(CoreError::invalid_field(
                "templateIds",
                "All selected stages already exist in this project",
            ));
        }

        let new_templates = stage_templates::Entity::find()
            .filter(stage_templates::Column::Id.is_in(missing.iter().copied()))
            .filter(stage_templates::Column::CompanyId.eq(project.company_id))
            .filter(stage_templates::Column::IsActive.eq(true))
            .order_by_asc(stage_templates::Column::Position)
            .order_by_asc(stage_templates::Column::Id)
            .all(&txn)
            .await?;

        if let Some(unknown) = missing
            .iter()
            .find(|id| !new_templates.iter().any(|t| t.id == **id))
        {
            return Err(CoreError::invalid_field(
                "templateIds",
                format!("Template {} is not an active template of this company", unknown),
            ));
        }

        let start = existing.iter().map(|s| s.position).max().unwrap_or(0) + 1;
        let mut created = Vec::with_capacity(new_templates.len());
        for (offset, template) in new_templates.iter().enumerate() {
            let stage = stage_from_template(project.id, template, start + offset as i32)
                .insert(&txn)
                .await?;
            created.push(stage);
        }
        txn.commit().await?;

        info!(
            "Added {} stages to project {} starting at position {}",
            created.len(),
            project.id,
            start
        );
        Ok(created)
    }

    pub async fn patch(
        &self,
        actor: &Actor,
        stage_id: i32,
        request: PatchStageRequest,
    ) -> CoreResult<stages::Model> {
        let (stage, project) = load_stage(&self.db, actor, stage_id).await?;
        let template = match stage.template_id {
            Some(id) => stage_templates::Entity::find_by_id(id).one(&self.db).await?,
            None => None,
        };

        let mut active: stages::ActiveModel = stage.clone().into();

        if let Some(data) = request.checklist_data {
            if let Some(map) = &data {
                let allowed = allowed_keys(
                    template.as_ref().map(|t| t.checklist_keys()).unwrap_or_default(),
                    stage.checklist_data.as_ref(),
                );
                check_known_keys("checklistData", map.0.keys(), &allowed)?;
            }
            active.checklist_data = Set(data);
        }

        if let Some(data) = request.checklist_input_data {
            if let Some(map) = &data {
                let allowed = allowed_keys(
                    template.as_ref().map(|t| t.checklist_keys()).unwrap_or_default(),
                    stage.checklist_data.as_ref(),
                );
                check_known_keys("checklistInputData", map.0.keys(), &allowed)?;
            }
            active.checklist_input_data = Set(data);
        }

        if let Some(data) = request.conditional_substages_data {
            if let Some(map) = &data {
                let allowed = allowed_keys(
                    template.as_ref().map(|t| t.substage_keys()).unwrap_or_default(),
                    stage.conditional_substages_data.as_ref(),
                );
                check_known_keys("conditionalSubstagesData", map.0.keys(), &allowed)?;
            }
            active.conditional_substages_data = Set(data);
        }

        if let Some(data) = request.custom_fields_data {
            if let Some(values) = &data {
                match template.as_ref() {
                    Some(template) => validate_custom_field_values(
                        values,
                        &template.custom_fields.clone().unwrap_or_default(),
                    )?,
                    None => {
                        let stored: BTreeSet<String> = stage
                            .custom_fields_data
                            .as_ref()
                            .map(|m| m.0.keys().cloned().collect())
                            .unwrap_or_default();
                        check_known_keys("customFieldsData", values.0.keys(), &stored)?;
                    }
                }
            }
            active.custom_fields_data = Set(data);
        }

        let needs_products =
            request.distribution_data.is_some() || request.product_quantities_data.is_some();
        if needs_products {
            let product_ids = self.product_ids(project.id).await?;
            if let Some(data) = request.distribution_data {
                if let Some(distribution) = &data {
                    validate_distribution(distribution, &product_ids)?;
                }
                active.distribution_data = Set(data);
            }
            if let Some(data) = request.product_quantities_data {
                if let Some(quantities) = &data {
                    validate_quantities(quantities, &product_ids)?;
                }
                active.product_quantities_data = Set(data);
            }
        }

        if let Some(start_date) = request.start_date {
            active.start_date = Set(ValidationService::parse_optional_date(
                "startDate",
                start_date.as_deref(),
            )?);
        }

        let mut deadline_change = None;
        if let Some(deadline) = request.deadline {
            let new_deadline =
                ValidationService::parse_optional_date("deadline", deadline.as_deref())?;
            if new_deadline != stage.deadline {
                let reason = deadline_reason(
                    "deadlineReason",
                    stage.deadline,
                    request.deadline_reason.as_deref(),
                )?;
                deadline_change = Some((new_deadline, reason));
                active.deadline = Set(new_deadline);
            }
        }

        let mut new_status = request.status.unwrap_or(stage.status);
        if let Some(enabled) = request.conditional_enabled {
            if enabled != stage.conditional_enabled {
                new_status = coupled_status(enabled);
            }
            active.conditional_enabled = Set(enabled);
        }
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());

        let txn = self.db.begin().await?;
        if new_status != stage.status {
            record_status_change(&txn, stage.id, stage.status, new_status, actor.id()).await?;
        }
        if let Some((new_deadline, reason)) = &deadline_change {
            record_deadline_change(
                &txn,
                stage.id,
                stage.deadline,
                *new_deadline,
                reason,
                actor.id(),
            )
            .await?;
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if new_status != stage.status {
            info!(
                "Stage {} status {} -> {} by user {}",
                stage.id,
                stage.status.as_str(),
                new_status.as_str(),
                actor.id()
            );
        }
        Ok(updated)
    }

    pub async fn patch_deadline(
        &self,
        actor: &Actor,
        stage_id: i32,
        request: DeadlineRequest,
    ) -> CoreResult<stages::Model> {
        let (stage, _) = load_stage(&self.db, actor, stage_id).await?;

        let new_deadline =
            ValidationService::parse_optional_date("deadline", request.deadline.as_deref())?;
        let reason = deadline_reason("reason", stage.deadline, request.reason.as_deref())?;

        let txn = self.db.begin().await?;
        record_deadline_change(
            &txn,
            stage.id,
            stage.deadline,
            new_deadline,
            &reason,
            actor.id(),
        )
        .await?;

        let old_deadline = stage.deadline;
        let mut active: stages::ActiveModel = stage.into();
        active.deadline = Set(new_deadline);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Stage {} deadline {:?} -> {:?} by user {}",
            updated.id,
            old_deadline,
            new_deadline,
            actor.id()
        );
        Ok(updated)
    }

    /// Enabling resets the stage to waiting, disabling skips it
    pub async fn toggle_conditional(
        &self,
        actor: &Actor,
        stage_id: i32,
        enabled: bool,
    ) -> CoreResult<stages::Model> {
        let (stage, _) = load_stage(&self.db, actor, stage_id).await?;
        let new_status = coupled_status(enabled);
        let old_status = stage.status;

        let txn = self.db.begin().await?;
        if new_status != old_status {
            record_status_change(&txn, stage.id, old_status, new_status, actor.id()).await?;
        }

        let mut active: stages::ActiveModel = stage.into();
        active.conditional_enabled = Set(enabled);
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Stage {} conditional {} (status {})",
            updated.id,
            if enabled { "enabled" } else { "disabled" },
            new_status.as_str()
        );
        Ok(updated)
    }

    /// Admins, the project creator and the responsible user may delete stages
    pub async fn delete(&self, actor: &Actor, stage_id: i32) -> CoreResult<()> {
        let (stage, project) = load_stage(&self.db, actor, stage_id).await?;

        let permitted = actor.is_admin()
            || project.created_by == actor.id()
            || project.responsible_user_id == Some(actor.id());
        if !permitted {
            return Err(CoreError::forbidden(
                "Only admins, the project creator or the responsible user can delete stages",
            ));
        }

        let txn = self.db.begin().await?;
        if let Some(cover_id) = project.cover_image_id {
            let cover_on_stage = stage_files::Entity::find_by_id(cover_id)
                .filter(stage_files::Column::StageId.eq(stage.id))
                .one(&txn)
                .await?
                .is_some();
            if cover_on_stage {
                let mut active: projects::ActiveModel = project.clone().into();
                active.cover_image_id = Set(None);
                active.update(&txn).await?;
            }
        }
        stages::Entity::delete_by_id(stage.id).exec(&txn).await?;
        txn.commit().await?;

        info!("Deleted stage {} from project {}", stage.id, project.id);
        Ok(())
    }

    async fn product_ids(&self, project_id: i32) -> CoreResult<BTreeSet<String>> {
        Ok(products::Entity::find()
            .filter(products::Column::ProjectId.eq(project_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| p.id.to_string())
            .collect())
    }
}

fn coupled_status(enabled: bool) -> StageStatus {
    if enabled {
        StageStatus::Waiting
    } else {
        StageStatus::Skip
    }
}
