pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_tenancy;
mod m20260105_000002_create_pipeline;
mod m20260105_000003_create_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_tenancy::Migration),
            Box::new(m20260105_000002_create_pipeline::Migration),
            Box::new(m20260105_000003_create_history::Migration),
        ]
    }
}
