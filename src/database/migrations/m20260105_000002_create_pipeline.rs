use sea_orm_migration::prelude::*;

use super::m20260105_000001_create_tenancy::{Companies, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StageTemplates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StageTemplates::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(StageTemplates::CompanyId).integer().not_null())
                    .col(ColumnDef::new(StageTemplates::Name).string().not_null())
                    .col(ColumnDef::new(StageTemplates::NameTranslations).json().null())
                    .col(ColumnDef::new(StageTemplates::Kind).string().not_null().default("generic"))
                    .col(ColumnDef::new(StageTemplates::Position).integer().not_null())
                    .col(ColumnDef::new(StageTemplates::HasChecklist).boolean().not_null().default(false))
                    .col(ColumnDef::new(StageTemplates::ChecklistItems).json().null())
                    .col(ColumnDef::new(StageTemplates::HasConditionalSubstages).boolean().not_null().default(false))
                    .col(ColumnDef::new(StageTemplates::ConditionalSubstages).json().null())
                    .col(ColumnDef::new(StageTemplates::CustomFields).json().null())
                    .col(ColumnDef::new(StageTemplates::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(StageTemplates::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(StageTemplates::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_templates_company_id")
                            .from(StageTemplates::Table, StageTemplates::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (table, name) in [
            (CatalogTable::Factories, "fk_factories_company_id"),
            (CatalogTable::ProductTypes, "fk_product_types_company_id"),
        ] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(ColumnDef::new(Catalog::Id).integer().not_null().auto_increment().primary_key())
                        .col(ColumnDef::new(Catalog::CompanyId).integer().not_null())
                        .col(ColumnDef::new(Catalog::Name).string().not_null())
                        .col(ColumnDef::new(Catalog::CreatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name(name)
                                .from(table, Catalog::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Projects::CompanyId).integer().not_null())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text().null())
                    .col(ColumnDef::new(Projects::ResponsibleUserId).integer().null())
                    .col(ColumnDef::new(Projects::FactoryId).integer().null())
                    .col(ColumnDef::new(Projects::ProductTypeId).integer().null())
                    .col(ColumnDef::new(Projects::Deadline).date().null())
                    .col(ColumnDef::new(Projects::CoverImageId).integer().null())
                    .col(ColumnDef::new(Projects::CreatedBy).integer().not_null())
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Projects::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_company_id")
                            .from(Projects::Table, Projects::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_responsible_user_id")
                            .from(Projects::Table, Projects::ResponsibleUserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_factory_id")
                            .from(Projects::Table, Projects::FactoryId)
                            .to(CatalogTable::Factories, Catalog::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_product_type_id")
                            .from(Projects::Table, Projects::ProductTypeId)
                            .to(CatalogTable::ProductTypes, Catalog::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Products::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Products::Article).string().null())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Barcode).string().null())
                    .col(ColumnDef::new(Products::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_project_id")
                            .from(Products::Table, Products::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Stages::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Stages::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Stages::TemplateId).integer().null())
                    .col(ColumnDef::new(Stages::Name).string().not_null())
                    .col(ColumnDef::new(Stages::Kind).string().not_null().default("generic"))
                    .col(ColumnDef::new(Stages::Position).integer().not_null())
                    .col(ColumnDef::new(Stages::Status).string().not_null().default("waiting"))
                    .col(ColumnDef::new(Stages::StartDate).date().null())
                    .col(ColumnDef::new(Stages::Deadline).date().null())
                    .col(ColumnDef::new(Stages::ChecklistData).json().null())
                    .col(ColumnDef::new(Stages::ChecklistInputData).json().null())
                    .col(ColumnDef::new(Stages::ConditionalEnabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Stages::ConditionalSubstagesData).json().null())
                    .col(ColumnDef::new(Stages::CustomFieldsData).json().null())
                    .col(ColumnDef::new(Stages::DistributionData).json().null())
                    .col(ColumnDef::new(Stages::ProductQuantitiesData).json().null())
                    .col(ColumnDef::new(Stages::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Stages::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stages_project_id")
                            .from(Stages::Table, Stages::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stages_template_id")
                            .from(Stages::Table, Stages::TemplateId)
                            .to(StageTemplates::Table, StageTemplates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .index(
                        Index::create()
                            .name("idx_stages_project_position")
                            .col(Stages::ProjectId)
                            .col(Stages::Position)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageFiles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StageFiles::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(StageFiles::StageId).integer().not_null())
                    .col(ColumnDef::new(StageFiles::ChecklistItemKey).string().null())
                    .col(ColumnDef::new(StageFiles::FileName).string().not_null())
                    .col(ColumnDef::new(StageFiles::FileUrl).string().not_null())
                    .col(ColumnDef::new(StageFiles::FileType).string().not_null())
                    .col(ColumnDef::new(StageFiles::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(StageFiles::UploadedBy).integer().not_null())
                    .col(ColumnDef::new(StageFiles::Version).integer().not_null().default(1))
                    .col(ColumnDef::new(StageFiles::IsLatest).boolean().not_null().default(true))
                    .col(ColumnDef::new(StageFiles::AllowedUserIds).json().null())
                    .col(ColumnDef::new(StageFiles::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_files_stage_id")
                            .from(StageFiles::Table, StageFiles::StageId)
                            .to(Stages::Table, Stages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_files_uploaded_by")
                            .from(StageFiles::Table, StageFiles::UploadedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Comments::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Comments::StageId).integer().not_null())
                    .col(ColumnDef::new(Comments::UserId).integer().not_null())
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(ColumnDef::new(Comments::Mentions).json().null())
                    .col(ColumnDef::new(Comments::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_stage_id")
                            .from(Comments::Table, Comments::StageId)
                            .to(Stages::Table, Stages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_user_id")
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tasks::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Tasks::StageId).integer().not_null())
                    .col(ColumnDef::new(Tasks::AssignedBy).integer().not_null())
                    .col(ColumnDef::new(Tasks::AssignedTo).integer().not_null())
                    .col(ColumnDef::new(Tasks::Description).text().not_null())
                    .col(ColumnDef::new(Tasks::Completed).boolean().not_null().default(false))
                    .col(ColumnDef::new(Tasks::Status).string().not_null().default("pending"))
                    .col(ColumnDef::new(Tasks::RevisionNote).text().null())
                    .col(ColumnDef::new(Tasks::RevisionResponse).text().null())
                    .col(ColumnDef::new(Tasks::CompletedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Tasks::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Tasks::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_stage_id")
                            .from(Tasks::Table, Tasks::StageId)
                            .to(Stages::Table, Stages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assigned_by")
                            .from(Tasks::Table, Tasks::AssignedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assigned_to")
                            .from(Tasks::Table, Tasks::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Tasks::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Comments::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(StageFiles::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Stages::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Products::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Projects::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(CatalogTable::ProductTypes).to_owned()).await?;
        manager.drop_table(Table::drop().table(CatalogTable::Factories).to_owned()).await?;
        manager.drop_table(Table::drop().table(StageTemplates::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum StageTemplates {
    Table,
    Id,
    CompanyId,
    Name,
    NameTranslations,
    Kind,
    Position,
    HasChecklist,
    ChecklistItems,
    HasConditionalSubstages,
    ConditionalSubstages,
    CustomFields,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

/// Company-scoped name catalogues share one column layout
#[derive(DeriveIden, Clone, Copy)]
enum CatalogTable {
    Factories,
    ProductTypes,
}

#[derive(DeriveIden)]
enum Catalog {
    Id,
    CompanyId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    ResponsibleUserId,
    FactoryId,
    ProductTypeId,
    Deadline,
    CoverImageId,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    ProjectId,
    Article,
    Name,
    Barcode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Stages {
    Table,
    Id,
    ProjectId,
    TemplateId,
    Name,
    Kind,
    Position,
    Status,
    StartDate,
    Deadline,
    ChecklistData,
    ChecklistInputData,
    ConditionalEnabled,
    ConditionalSubstagesData,
    CustomFieldsData,
    DistributionData,
    ProductQuantitiesData,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StageFiles {
    Table,
    Id,
    StageId,
    ChecklistItemKey,
    FileName,
    FileUrl,
    FileType,
    FileSize,
    UploadedBy,
    Version,
    IsLatest,
    AllowedUserIds,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    StageId,
    UserId,
    Content,
    Mentions,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    StageId,
    AssignedBy,
    AssignedTo,
    Description,
    Completed,
    Status,
    RevisionNote,
    RevisionResponse,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}
