//! Append-only status and deadline ledger for stages.
//!
//! Rows are written by the stage mutations in the same transaction as the
//! change they describe and are never updated or deleted afterwards.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::database::entities::{deadline_history, status_history, users, StageStatus, UserSummary};
use crate::errors::CoreResult;
use crate::services::authorization::{load_stage, Actor};

pub const INITIAL_DEADLINE_REASON: &str = "Initial deadline set";

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: i32,
    pub stage_id: i32,
    pub old_status: StageStatus,
    pub new_status: StageStatus,
    pub changed_by: UserSummary,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineHistoryEntry {
    pub id: i32,
    pub stage_id: i32,
    #[schema(value_type = Option<String>)]
    pub old_deadline: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub new_deadline: Option<NaiveDate>,
    pub reason: String,
    pub changed_by: UserSummary,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageHistory {
    pub status_history: Vec<StatusHistoryEntry>,
    pub deadline_history: Vec<DeadlineHistoryEntry>,
}

pub async fn record_status_change<C: ConnectionTrait>(
    db: &C,
    stage_id: i32,
    old_status: StageStatus,
    new_status: StageStatus,
    changed_by_id: i32,
) -> CoreResult<status_history::Model> {
    let row = status_history::ActiveModel {
        stage_id: Set(stage_id),
        old_status: Set(old_status),
        new_status: Set(new_status),
        changed_by_id: Set(changed_by_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

pub async fn record_deadline_change<C: ConnectionTrait>(
    db: &C,
    stage_id: i32,
    old_deadline: Option<NaiveDate>,
    new_deadline: Option<NaiveDate>,
    reason: &str,
    changed_by_id: i32,
) -> CoreResult<deadline_history::Model> {
    let row = deadline_history::ActiveModel {
        stage_id: Set(stage_id),
        old_deadline: Set(old_deadline),
        new_deadline: Set(new_deadline),
        reason: Set(reason.to_string()),
        changed_by_id: Set(changed_by_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Placeholder identity for ledger rows whose author no longer exists
fn unknown_user(id: i32) -> UserSummary {
    UserSummary {
        id,
        name: "Unknown".to_string(),
        email: String::new(),
    }
}

fn summarize(user: Option<users::Model>, id: i32) -> UserSummary {
    user.as_ref().map(UserSummary::from).unwrap_or_else(|| unknown_user(id))
}

#[derive(Clone)]
pub struct HistoryService {
    db: DatabaseConnection,
}

impl HistoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Both ledgers of a stage, newest first
    pub async fn list_for_stage(&self, actor: &Actor, stage_id: i32) -> CoreResult<StageHistory> {
        load_stage(&self.db, actor, stage_id).await?;

        let status_rows = status_history::Entity::find()
            .filter(status_history::Column::StageId.eq(stage_id))
            .order_by_desc(status_history::Column::CreatedAt)
            .order_by_desc(status_history::Column::Id)
            .find_also_related(users::Entity)
            .all(&self.db)
            .await?;

        let deadline_rows = deadline_history::Entity::find()
            .filter(deadline_history::Column::StageId.eq(stage_id))
            .order_by_desc(deadline_history::Column::CreatedAt)
            .order_by_desc(deadline_history::Column::Id)
            .find_also_related(users::Entity)
            .all(&self.db)
            .await?;

        debug!(
            "Stage {} history: {} status rows, {} deadline rows",
            stage_id,
            status_rows.len(),
            deadline_rows.len()
        );

        Ok(StageHistory {
            status_history: status_rows
                .into_iter()
                .map(|(row, user)| StatusHistoryEntry {
                    changed_by: summarize(user, row.changed_by_id),
                    id: row.id,
                    stage_id: row.stage_id,
                    old_status: row.old_status,
                    new_status: row.new_status,
                    created_at: row.created_at,
                })
                .collect(),
            deadline_history: deadline_rows
                .into_iter()
                .map(|(row, user)| DeadlineHistoryEntry {
                    changed_by: summarize(user, row.changed_by_id),
                    id: row.id,
                    stage_id: row.stage_id,
                    old_deadline: row.old_deadline,
                    new_deadline: row.new_deadline,
                    reason: row.reason,
                    created_at: row.created_at,
                })
                .collect(),
        })
    }
}

/// Display identities for a set of user ids
pub(crate) async fn user_summaries<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = i32>,
) -> CoreResult<HashMap<i32, UserSummary>> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(db)
        .await?;

    Ok(users.iter().map(|u| (u.id, UserSummary::from(u))).collect())
}

pub(crate) fn summary_or_unknown(map: &HashMap<i32, UserSummary>, id: i32) -> UserSummary {
    map.get(&id).cloned().unwrap_or_else(|| unknown_user(id))
}
