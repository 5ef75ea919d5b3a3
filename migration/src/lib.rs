pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_tracking_tables;
mod m20260301_000002_postback_tables;
mod m20260301_000003_blacklist_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_tracking_tables::Migration),
            Box::new(m20260301_000002_postback_tables::Migration),
            Box::new(m20260301_000003_blacklist_entries::Migration),
        ]
    }
}
