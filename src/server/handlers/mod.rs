pub mod auth;
pub mod comments;
pub mod companies;
pub mod health;
pub mod projects;
pub mod stage_files;
pub mod stages;
pub mod tasks;
pub mod templates;
