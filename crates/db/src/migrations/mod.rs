//! Schema migrations.

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_document_table;

/// Applies every migration in order.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250101_000001_create_document_table::Migration)]
    }
}
