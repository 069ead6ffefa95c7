use axum::{extract::State, http::StatusCode, response::Json};

use crate::database::entities::{factories, product_types, users};
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::{CompanyUser, CurrentUser};
use crate::services::company_service::{
    CatalogEntryRequest, CompanyView, CreateCompanyRequest, CreateMemberRequest,
};
use crate::services::CompanyService;

fn service(state: &AppState) -> CompanyService {
    CompanyService::new(state.db.clone(), state.config.clone())
}

#[utoipa::path(
    post,
    path = "/api/v1/companies",
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created and default templates seeded"),
        (status = 409, description = "Caller already belongs to a company")
    )
)]
pub async fn create_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<CreateCompanyRequest>,
) -> CoreResult<(StatusCode, Json<CompanyView>)> {
    let company = service(&state).onboard(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    get,
    path = "/api/v1/company",
    responses(
        (status = 200, description = "Caller's company with its members"),
        (status = 403, description = "NO_COMPANY when the caller has not onboarded")
    )
)]
pub async fn get_company(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
) -> CoreResult<Json<CompanyView>> {
    Ok(Json(service(&state).current(&actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/company/users",
    request_body = CreateMemberRequest,
    responses(
        (status = 201, description = "Member created"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    ApiJson(payload): ApiJson<CreateMemberRequest>,
) -> CoreResult<(StatusCode, Json<users::Model>)> {
    let user = service(&state).add_member(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/factories",
    responses((status = 200, description = "Company factories"))
)]
pub async fn list_factories(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
) -> CoreResult<Json<Vec<factories::Model>>> {
    Ok(Json(service(&state).list_factories(&actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/factories",
    request_body = CatalogEntryRequest,
    responses(
        (status = 201, description = "Factory created"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_factory(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    ApiJson(payload): ApiJson<CatalogEntryRequest>,
) -> CoreResult<(StatusCode, Json<factories::Model>)> {
    let factory = service(&state).create_factory(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(factory)))
}

#[utoipa::path(
    get,
    path = "/api/v1/product-types",
    responses((status = 200, description = "Company product types"))
)]
pub async fn list_product_types(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
) -> CoreResult<Json<Vec<product_types::Model>>> {
    Ok(Json(service(&state).list_product_types(&actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/product-types",
    request_body = CatalogEntryRequest,
    responses(
        (status = 201, description = "Product type created"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_product_type(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    ApiJson(payload): ApiJson<CatalogEntryRequest>,
) -> CoreResult<(StatusCode, Json<product_types::Model>)> {
    let product_type = service(&state).create_product_type(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(product_type)))
}
