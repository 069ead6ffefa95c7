use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::stage_data::UserIdList;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_files")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub stage_id: i32,
    pub checklist_item_key: Option<String>,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by: i32,
    pub version: i32,
    pub is_latest: bool,
    pub allowed_user_ids: Option<UserIdList>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stages::Entity",
        from = "Column::StageId",
        to = "super::stages::Column::Id",
        on_delete = "Cascade"
    )]
    Stages,
}

impl Related<super::stages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Files without an allow-list are visible to the whole company
    pub fn is_visible_to(&self, viewer_id: Option<i32>) -> bool {
        match &self.allowed_user_ids {
            None => true,
            Some(list) if list.is_empty() => true,
            Some(list) => viewer_id.map(|id| list.contains(id)).unwrap_or(false),
        }
    }
}
