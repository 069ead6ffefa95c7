use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::stage_data::{CustomFieldDefs, KeyList, LocalizedNames};

/// Behaviour attached to a pipeline step, fixed when the template is defined.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    #[default]
    #[sea_orm(string_value = "generic")]
    Generic,
    #[sea_orm(string_value = "render")]
    Render,
    #[sea_orm(string_value = "model_3d")]
    #[serde(rename = "model_3d")]
    Model3d,
    #[sea_orm(string_value = "factory_proposal")]
    FactoryProposal,
    #[sea_orm(string_value = "quotation")]
    Quotation,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Generic => "generic",
            StageKind::Render => "render",
            StageKind::Model3d => "model_3d",
            StageKind::FactoryProposal => "factory_proposal",
            StageKind::Quotation => "quotation",
        }
    }

    /// Kind implied by one of the catalogue stage names
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Render" => StageKind::Render,
            "3D Model" => StageKind::Model3d,
            "Factory Proposal" => StageKind::FactoryProposal,
            "Quotation" => StageKind::Quotation,
            _ => StageKind::Generic,
        }
    }

    /// Files on these stages must name the users allowed to see them
    pub fn requires_access_list(&self) -> bool {
        matches!(self, StageKind::FactoryProposal | StageKind::Quotation)
    }

    /// Allowed upload extensions, `None` when any extension is accepted
    pub fn allowed_extensions(&self) -> Option<&'static [&'static str]> {
        match self {
            StageKind::Render => Some(&["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"]),
            StageKind::Model3d => Some(&["step", "stp", "stl"]),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_templates")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub company_id: i32,
    pub name: String,
    pub name_translations: Option<LocalizedNames>,
    pub kind: StageKind,
    pub position: i32,
    pub has_checklist: bool,
    pub checklist_items: Option<KeyList>,
    pub has_conditional_substages: bool,
    pub conditional_substages: Option<KeyList>,
    pub custom_fields: Option<CustomFieldDefs>,
    pub is_active: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_delete = "Cascade"
    )]
    Companies,
    #[sea_orm(has_many = "super::stages::Entity")]
    Stages,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::stages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Checklist keys, empty when the template carries no checklist
    pub fn checklist_keys(&self) -> Vec<String> {
        match (&self.checklist_items, self.has_checklist) {
            (Some(items), true) => items.0.clone(),
            _ => Vec::new(),
        }
    }

    /// Conditional substage keys, empty when the template has none
    pub fn substage_keys(&self) -> Vec<String> {
        match (&self.conditional_substages, self.has_conditional_substages) {
            (Some(items), true) => items.0.clone(),
            _ => Vec::new(),
        }
    }
}
