use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    auth, comments, companies, health, projects, stage_files, stages, tasks, templates,
};
use crate::config::AppConfig;
use crate::database::entities::{StageKind, StageStatus, TaskStatus, UserRole, UserSummary};
use crate::services::{build_mailer, LoginRateLimiter, Mailer};
use crate::stage_data::{
    CustomFieldDef, CustomFieldDefs, CustomFieldType, DistributionData, FlagMap, KeyList,
    LocalizedNames, QuantityMap, TextMap, UserIdList,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let mailer = build_mailer(&config);
        let login_limiter = Arc::new(LoginRateLimiter::new(
            config.login_max_attempts,
            Duration::from_secs(config.login_window_secs),
            Duration::from_secs(config.login_lockout_secs),
        ));
        Self {
            db,
            config,
            mailer,
            login_limiter,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Sourcetrack API", description = "Manufacturing project tracking"),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        companies::create_company,
        companies::get_company,
        companies::add_member,
        companies::list_factories,
        companies::create_factory,
        companies::list_product_types,
        companies::create_product_type,
        templates::list_templates,
        templates::create_template,
        templates::update_template,
        templates::delete_template,
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::add_stages,
        projects::generate_stages,
        stages::patch_stage,
        stages::patch_deadline,
        stages::toggle_conditional,
        stages::delete_stage,
        stages::stage_history,
        stage_files::list_files,
        stage_files::upload_file,
        stage_files::update_access,
        stage_files::delete_file,
        comments::list_comments,
        comments::add_comment,
        tasks::create_task,
        tasks::update_task,
        tasks::complete_task,
        tasks::request_revision,
        tasks::delete_task,
    ),
    components(schemas(
        crate::services::auth_service::RegisterRequest,
        crate::services::auth_service::LoginRequest,
        crate::services::company_service::CreateCompanyRequest,
        crate::services::company_service::CreateMemberRequest,
        crate::services::company_service::CatalogEntryRequest,
        crate::services::template_service::CreateTemplateRequest,
        crate::services::template_service::UpdateTemplateRequest,
        crate::services::project_service::ProductInput,
        crate::services::project_service::CreateProjectRequest,
        crate::services::project_service::UpdateProjectRequest,
        crate::services::project_service::StageStatusSummary,
        crate::services::stage_service::PatchStageRequest,
        crate::services::stage_service::DeadlineRequest,
        crate::services::stage_service::ConditionalRequest,
        crate::services::stage_service::AddStagesRequest,
        crate::services::stage_file_service::UploadFileRequest,
        crate::services::stage_file_service::UpdateAccessRequest,
        crate::services::comment_service::CreateCommentRequest,
        crate::services::task_service::CreateTaskRequest,
        crate::services::task_service::UpdateTaskRequest,
        crate::services::task_service::RevisionRequest,
        crate::services::history_service::StageHistory,
        crate::services::history_service::StatusHistoryEntry,
        crate::services::history_service::DeadlineHistoryEntry,
        UserSummary,
        UserRole,
        StageKind,
        StageStatus,
        TaskStatus,
        KeyList,
        LocalizedNames,
        FlagMap,
        TextMap,
        QuantityMap,
        UserIdList,
        DistributionData,
        CustomFieldType,
        CustomFieldDef,
        CustomFieldDefs,
    ))
)]
pub struct ApiDoc;

fn cors_layer(cors_origin: Option<&str>) -> Result<CorsLayer> {
    let cors = match cors_origin {
        // Session cookies need an explicit origin; a wildcard cannot carry credentials
        Some(origin) if origin != "*" => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow!("Invalid CORS origin: {}", e))?,
            )
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
            .allow_credentials(true),
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };
    Ok(cors)
}

pub async fn create_app(
    db: DatabaseConnection,
    cors_origin: Option<&str>,
    config: AppConfig,
) -> Result<Router> {
    let state = AppState::new(db, config);
    let cors = cors_layer(cors_origin)?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Identity
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))

        // Tenancy and catalogs
        .route("/companies", post(companies::create_company))
        .route("/company", get(companies::get_company))
        .route("/company/users", post(companies::add_member))
        .route(
            "/factories",
            get(companies::list_factories).post(companies::create_factory),
        )
        .route(
            "/product-types",
            get(companies::list_product_types).post(companies::create_product_type),
        )

        // Templates
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/:id",
            patch(templates::update_template).delete(templates::delete_template),
        )

        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/:id/add-stages", post(projects::add_stages))
        .route("/projects/:id/generate-stages", post(projects::generate_stages))

        // Stages
        .route(
            "/stages/:id",
            patch(stages::patch_stage).delete(stages::delete_stage),
        )
        .route("/stages/:id/deadline", patch(stages::patch_deadline))
        .route("/stages/:id/conditional", patch(stages::toggle_conditional))
        .route("/stages/:id/history", get(stages::stage_history))
        .route(
            "/stages/:id/files",
            get(stage_files::list_files).post(stage_files::upload_file),
        )
        .route(
            "/stages/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/stages/:id/tasks", post(tasks::create_task))

        // Files and tasks by id
        .route(
            "/stage-files/:id",
            patch(stage_files::update_access).delete(stage_files::delete_file),
        )
        .route(
            "/tasks/:id",
            patch(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/tasks/:id/complete", post(tasks::complete_task))
        .route("/tasks/:id/revision", post(tasks::request_revision))
}
