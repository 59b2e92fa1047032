//! Database migrations for the tfregistry service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_100000_create_namespaces;
mod m2025_11_10_100100_create_module_providers;
mod m2025_11_10_100200_create_module_versions;
mod m2025_11_10_100300_create_submodules;
mod m2025_11_10_100400_create_provider_catalog;
mod m2025_11_10_100450_create_gpg_keys;
mod m2025_11_10_100500_create_provider_versions;
mod m2025_11_10_100700_create_user_groups;
mod m2025_11_10_100800_create_sessions;
mod m2025_11_10_100900_create_terraform_idp;
mod m2025_11_10_101000_create_audit_history;
mod m2025_11_10_101100_create_analytics;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_100000_create_namespaces::Migration),
            Box::new(m2025_11_10_100100_create_module_providers::Migration),
            Box::new(m2025_11_10_100200_create_module_versions::Migration),
            Box::new(m2025_11_10_100300_create_submodules::Migration),
            Box::new(m2025_11_10_100400_create_provider_catalog::Migration),
            Box::new(m2025_11_10_100450_create_gpg_keys::Migration),
            Box::new(m2025_11_10_100500_create_provider_versions::Migration),
            Box::new(m2025_11_10_100700_create_user_groups::Migration),
            Box::new(m2025_11_10_100800_create_sessions::Migration),
            Box::new(m2025_11_10_100900_create_terraform_idp::Migration),
            Box::new(m2025_11_10_101000_create_audit_history::Migration),
            Box::new(m2025_11_10_101100_create_analytics::Migration),
        ]
    }
}
