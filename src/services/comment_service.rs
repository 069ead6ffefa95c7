use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::database::entities::{comments, users, UserSummary};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{load_stage, Actor};
use crate::services::history_service::{summary_or_unknown, user_summaries};
use crate::services::mailer::{notify, MailMessage, Mailer};
use crate::stage_data::{parse_mentions, UserIdList};

pub const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    /// Mentions use the `@[Display Name](userId)` markup
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comments::Model,
    pub user: UserSummary,
}

/// Comments of the given stages with their authors, oldest first
pub async fn comments_for_stages<C: ConnectionTrait>(
    db: &C,
    stage_ids: &[i32],
) -> CoreResult<HashMap<i32, Vec<CommentView>>> {
    let mut grouped: HashMap<i32, Vec<CommentView>> = HashMap::new();
    if stage_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = comments::Entity::find()
        .filter(comments::Column::StageId.is_in(stage_ids.iter().copied()))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .all(db)
        .await?;
    let authors = user_summaries(db, rows.iter().map(|c| c.user_id)).await?;

    for comment in rows {
        let user = summary_or_unknown(&authors, comment.user_id);
        grouped
            .entry(comment.stage_id)
            .or_default()
            .push(CommentView { comment, user });
    }
    Ok(grouped)
}

#[derive(Clone)]
pub struct CommentService {
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
}

impl CommentService {
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    pub async fn list(&self, actor: &Actor, stage_id: i32) -> CoreResult<Vec<CommentView>> {
        let (stage, _) = load_stage(&self.db, actor, stage_id).await?;
        Ok(comments_for_stages(&self.db, &[stage.id])
            .await?
            .remove(&stage.id)
            .unwrap_or_default())
    }

    pub async fn add(
        &self,
        actor: &Actor,
        stage_id: i32,
        request: CreateCommentRequest,
    ) -> CoreResult<CommentView> {
        let (stage, project) = load_stage(&self.db, actor, stage_id).await?;

        let content = request.content.trim().to_string();
        let length = content.chars().count();
        if length == 0 || length > MAX_COMMENT_LEN {
            return Err(CoreError::invalid_field(
                "content",
                format!("Comment must be between 1 and {} characters", MAX_COMMENT_LEN),
            ));
        }

        let parsed = parse_mentions(&content);
        let mentioned = if parsed.is_empty() {
            Vec::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(parsed.0.iter().copied()))
                .filter(users::Column::CompanyId.eq(project.company_id))
                .filter(users::Column::IsActive.eq(true))
                .all(&self.db)
                .await?
        };
        let mentions = UserIdList(
            parsed
                .0
                .into_iter()
                .filter(|id| mentioned.iter().any(|u| u.id == *id))
                .collect(),
        );

        let comment = comments::ActiveModel {
            stage_id: Set(stage.id),
            user_id: Set(actor.id()),
            content: Set(content),
            mentions: Set((!mentions.is_empty()).then_some(mentions)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            "User {} commented on stage {} ({} mentions)",
            actor.id(),
            stage.id,
            mentioned.len()
        );

        let author = actor.user.display_name();
        for user in mentioned.iter().filter(|u| u.id != actor.id()) {
            notify(
                self.mailer.as_ref(),
                MailMessage {
                    to: user.email.clone(),
                    subject: format!("{} mentioned you in {}", author, project.name),
                    text: format!(
                        "{} mentioned you on the \"{}\" stage of {}:\n\n{}",
                        author, stage.name, project.name, comment.content
                    ),
                },
            )
            .await;
        }

        Ok(CommentView {
            user: UserSummary::from(&actor.user),
            comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::mailer::LogMailer;
    use crate::services::project_service::{CreateProjectRequest, ProjectService};
    use crate::services::template_service::{CreateTemplateRequest, TemplateService};
    use crate::services::test_support::{seed_company, seed_company_with_admin, seed_member};

    #[tokio::test]
    async fn mentions_are_limited_to_company_members() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        let colleague = seed_member(&db, company.id, "c@acme.test").await;
        let other = seed_company(&db, "Other").await;
        let stranger = seed_member(&db, other.id, "s@other.test").await;
        TemplateService::new(db.clone())
            .create(
                &admin,
                CreateTemplateRequest {
                    name: "Render".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let project = ProjectService::new(db.clone())
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Lamp".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let stage_id = project.stages[0].stage.id;
        let service = CommentService::new(db.clone(), Arc::new(LogMailer));

        let view = service
            .add(
                &admin,
                stage_id,
                CreateCommentRequest {
                    content: format!(
                        "  @[C]({}) please check, @[S]({}) too ",
                        colleague.id(),
                        stranger.id()
                    ),
                },
            )
            .await
            .unwrap();

        assert_eq!(view.comment.mentions, Some(UserIdList(vec![colleague.id()])));
        assert!(!view.comment.content.starts_with(' '));
        assert_eq!(view.user.id, admin.id());

        let listed = service.list(&colleague, stage_id).await.unwrap();
        assert_eq!(listed.len(), 1);

        let err = service
            .add(
                &admin,
                stage_id,
                CreateCommentRequest {
                    content: "x".repeat(MAX_COMMENT_LEN + 1),
                },
            )
            .await
            .unwrap_err();
        assert!(err.fields().unwrap().contains_key("content"));
        assert!(service
            .add(&admin, stage_id, CreateCommentRequest { content: "  ".into() })
            .await
            .is_err());
    }
}
