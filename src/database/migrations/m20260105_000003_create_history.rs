use sea_orm_migration::prelude::*;

use super::m20260105_000001_create_tenancy::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StatusHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StatusHistory::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(StatusHistory::StageId).integer().not_null())
                    .col(ColumnDef::new(StatusHistory::OldStatus).string().not_null())
                    .col(ColumnDef::new(StatusHistory::NewStatus).string().not_null())
                    .col(ColumnDef::new(StatusHistory::ChangedById).integer().not_null())
                    .col(ColumnDef::new(StatusHistory::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_stage_id")
                            .from(StatusHistory::Table, StatusHistory::StageId)
                            .to(Stages::Table, Stages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_changed_by_id")
                            .from(StatusHistory::Table, StatusHistory::ChangedById)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeadlineHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DeadlineHistory::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(DeadlineHistory::StageId).integer().not_null())
                    .col(ColumnDef::new(DeadlineHistory::OldDeadline).date().null())
                    .col(ColumnDef::new(DeadlineHistory::NewDeadline).date().null())
                    .col(ColumnDef::new(DeadlineHistory::Reason).text().not_null())
                    .col(ColumnDef::new(DeadlineHistory::ChangedById).integer().not_null())
                    .col(ColumnDef::new(DeadlineHistory::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deadline_history_stage_id")
                            .from(DeadlineHistory::Table, DeadlineHistory::StageId)
                            .to(Stages::Table, Stages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deadline_history_changed_by_id")
                            .from(DeadlineHistory::Table, DeadlineHistory::ChangedById)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_history_stage_id")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::StageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deadline_history_stage_id")
                    .table(DeadlineHistory::Table)
                    .col(DeadlineHistory::StageId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadlineHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum StatusHistory {
    Table,
    Id,
    StageId,
    OldStatus,
    NewStatus,
    ChangedById,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DeadlineHistory {
    Table,
    Id,
    StageId,
    OldDeadline,
    NewDeadline,
    Reason,
    ChangedById,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Stages {
    Table,
    Id,
}
