use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::stage_templates::StageKind;
use crate::stage_data::{DistributionData, FlagMap, QuantityMap, TextMap};

/// Pipeline step status. Any status may follow any other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    #[sea_orm(string_value = "waiting")]
    Waiting,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "skip")]
    Skip,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Waiting => "waiting",
            StageStatus::InProgress => "in_progress",
            StageStatus::Skip => "skip",
            StageStatus::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stages")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i32,
    pub template_id: Option<i32>,
    pub name: String,
    pub kind: StageKind,
    pub position: i32,
    pub status: StageStatus,
    pub start_date: Option<ChronoDate>,
    pub deadline: Option<ChronoDate>,
    pub checklist_data: Option<FlagMap>,
    pub checklist_input_data: Option<TextMap>,
    pub conditional_enabled: bool,
    pub conditional_substages_data: Option<FlagMap>,
    pub custom_fields_data: Option<TextMap>,
    pub distribution_data: Option<DistributionData>,
    pub product_quantities_data: Option<QuantityMap>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id",
        on_delete = "Cascade"
    )]
    Projects,
    #[sea_orm(
        belongs_to = "super::stage_templates::Entity",
        from = "Column::TemplateId",
        to = "super::stage_templates::Column::Id",
        on_delete = "SetNull"
    )]
    StageTemplates,
    #[sea_orm(has_many = "super::stage_files::Entity")]
    StageFiles,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::tasks::Entity")]
    Tasks,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::stage_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageTemplates.def()
    }
}

impl Related<super::stage_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageFiles.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Checklist keys recorded on this stage
    pub fn checklist_keys(&self) -> Vec<String> {
        self.checklist_data
            .as_ref()
            .map(|data| data.0.keys().cloned().collect())
            .unwrap_or_default()
    }
}
