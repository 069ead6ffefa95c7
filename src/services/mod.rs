pub mod auth_service;
pub mod authorization;
pub mod comment_service;
pub mod company_service;
pub mod history_service;
pub mod login_limiter;
pub mod mailer;
pub mod project_service;
pub mod stage_file_service;
pub mod stage_service;
pub mod task_service;
pub mod template_service;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_service::AuthService;
pub use authorization::{Actor, AuthorizationService};
pub use comment_service::CommentService;
pub use company_service::CompanyService;
pub use history_service::HistoryService;
pub use login_limiter::LoginRateLimiter;
pub use mailer::{build_mailer, LogMailer, Mailer, ResendMailer};
pub use project_service::ProjectService;
pub use stage_file_service::StageFileService;
pub use stage_service::StageService;
pub use task_service::TaskService;
pub use template_service::TemplateService;
pub use validation::ValidationService;
