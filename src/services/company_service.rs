use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::database::entities::{companies, factories, product_types, users, UserRole};
use crate::database::seed_data::seed_default_templates;
use crate::errors::{CoreError, CoreResult};
use crate::services::auth_service::{create_user, NewUser};
use crate::services::authorization::Actor;
use crate::services::validation::ValidationService;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Defaults to `member`
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyView {
    #[serde(flatten)]
    pub company: companies::Model,
    pub members: Vec<users::Model>,
}

/// Tenant onboarding, membership and the small per-company catalogs
#[derive(Clone)]
pub struct CompanyService {
    db: DatabaseConnection,
    config: AppConfig,
}

impl CompanyService {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Create a company for a caller without one; the caller becomes its admin
    pub async fn onboard(&self, actor: &Actor, request: CreateCompanyRequest) -> CoreResult<CompanyView> {
        if actor.user.company_id.is_some() {
            return Err(CoreError::conflict("You already belong to a company"));
        }
        let name = ValidationService::validate_name("name", &request.name)?;

        let txn = self.db.begin().await?;
        let company = companies::ActiveModel {
            name: Set(name),
            logo_url: Set(ValidationService::optional_text(request.logo_url)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut user: users::ActiveModel = actor.user.clone().into();
        user.company_id = Set(Some(company.id));
        if !actor.is_superadmin() {
            user.role = Set(UserRole::Admin);
        }
        user.updated_at = Set(Utc::now());
        user.update(&txn).await?;

        let seeded = seed_default_templates(&txn, company.id).await?;
        txn.commit().await?;

        info!(
            "User {} created company {} '{}' ({} templates seeded)",
            actor.id(),
            company.id,
            company.name,
            seeded
        );
        self.load(company.id).await
    }

    pub async fn current(&self, actor: &Actor) -> CoreResult<CompanyView> {
        let company_id = actor.company_id()?;
        self.load(company_id).await
    }

    pub async fn add_member(&self, actor: &Actor, request: CreateMemberRequest) -> CoreResult<users::Model> {
        let company_id = actor.company_id()?;
        actor.require_admin()?;

        let role = request.role.unwrap_or(UserRole::Member);
        if role == UserRole::Superadmin && !actor.is_superadmin() {
            return Err(CoreError::forbidden("Only superadmins can grant the superadmin role"));
        }

        let user = create_user(
            &self.db,
            &self.config,
            NewUser {
                email: request.email,
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                company_id: Some(company_id),
                role,
            },
        )
        .await?;

        info!("User {} added {} to company {}", actor.id(), user.id, company_id);
        Ok(user)
    }

    pub async fn list_factories(&self, actor: &Actor) -> CoreResult<Vec<factories::Model>> {
        let company_id = actor.company_id()?;
        Ok(factories::Entity::find()
            .filter(factories::Column::CompanyId.eq(company_id))
            .order_by_asc(factories::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn create_factory(
        &self,
        actor: &Actor,
        request: CatalogEntryRequest,
    ) -> CoreResult<factories::Model> {
        let company_id = actor.company_id()?;
        let name = ValidationService::validate_name("name", &request.name)?;

        let exists = factories::Entity::find()
            .filter(factories::Column::CompanyId.eq(company_id))
            .filter(factories::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await?
            .is_some();
        if exists {
            return Err(CoreError::conflict(format!("Factory '{}' already exists", name)));
        }

        let factory = factories::ActiveModel {
            company_id: Set(company_id),
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!("Created factory {} for company {}", factory.id, company_id);
        Ok(factory)
    }

    pub async fn list_product_types(&self, actor: &Actor) -> CoreResult<Vec<product_types::Model>> {
        let company_id = actor.company_id()?;
        Ok(product_types::Entity::find()
            .filter(product_types::Column::CompanyId.eq(company_id))
            .order_by_asc(product_types::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn create_product_type(
        &self,
        actor: &Actor,
        request: CatalogEntryRequest,
    ) -> CoreResult<product_types::Model> {
        let company_id = actor.company_id()?;
        let name = ValidationService::validate_name("name", &request.name)?;

        let exists = product_types::Entity::find()
            .filter(product_types::Column::CompanyId.eq(company_id))
            .filter(product_types::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await?
            .is_some();
        if exists {
            return Err(CoreError::conflict(format!("Product type '{}' already exists", name)));
        }

        let product_type = product_types::ActiveModel {
            company_id: Set(company_id),
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!("Created product type {} for company {}", product_type.id, company_id);
        Ok(product_type)
    }

    async fn load(&self, company_id: i32) -> CoreResult<CompanyView> {
        let company = companies::Entity::find_by_id(company_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("Company", company_id))?;
        let members = users::Entity::find()
            .filter(users::Column::CompanyId.eq(company_id))
            .order_by_asc(users::Column::Id)
            .all(&self.db)
            .await?;
        Ok(CompanyView { company, members })
    }
}
