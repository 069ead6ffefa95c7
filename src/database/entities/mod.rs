pub mod comments;
pub mod companies;
pub mod deadline_history;
pub mod factories;
pub mod product_types;
pub mod products;
pub mod projects;
pub mod stage_files;
pub mod stage_templates;
pub mod stages;
pub mod status_history;
pub mod tasks;
pub mod user_sessions;
pub mod users;

pub use stage_templates::StageKind;
pub use stages::StageStatus;
pub use tasks::TaskStatus;
pub use users::{UserRole, UserSummary};
