//! Migration to create the module_providers and module_provider_redirects tables.
//!
//! A module provider is the (namespace, module, provider) triple that owns all
//! published versions. Redirect rows map historical triples onto live ones
//! after renames.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModuleProviders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModuleProviders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviders::NamespaceId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModuleProviders::Module).text().not_null())
                    .col(ColumnDef::new(ModuleProviders::Provider).text().not_null())
                    .col(ColumnDef::new(ModuleProviders::RepoCloneUrl).text())
                    .col(ColumnDef::new(ModuleProviders::RepoBaseUrl).text())
                    .col(ColumnDef::new(ModuleProviders::RepoBrowseUrl).text())
                    .col(
                        ColumnDef::new(ModuleProviders::GitTagFormat)
                            .text()
                            .not_null()
                            .default("{version}"),
                    )
                    .col(ColumnDef::new(ModuleProviders::GitPath).text())
                    .col(ColumnDef::new(ModuleProviders::GitProviderId).integer())
                    .col(
                        ColumnDef::new(ModuleProviders::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // Plain integer, no FK: the latest-version pointer closes a
                    // row-level cycle with module_versions.
                    .col(ColumnDef::new(ModuleProviders::LatestVersionId).integer())
                    .col(
                        ColumnDef::new(ModuleProviders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_module_providers_namespace")
                            .from(ModuleProviders::Table, ModuleProviders::NamespaceId)
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_module_providers_triple")
                    .table(ModuleProviders::Table)
                    .col(ModuleProviders::NamespaceId)
                    .col(ModuleProviders::Module)
                    .col(ModuleProviders::Provider)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ModuleProviderRedirects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::Namespace)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::Module)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::Provider)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::ModuleProviderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ModuleProviderRedirects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_module_provider_redirects_module_provider")
                            .from(
                                ModuleProviderRedirects::Table,
                                ModuleProviderRedirects::ModuleProviderId,
                            )
                            .to(ModuleProviders::Table, ModuleProviders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModuleProviderRedirects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModuleProviders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModuleProviders {
    Table,
    Id,
    NamespaceId,
    Module,
    Provider,
    RepoCloneUrl,
    RepoBaseUrl,
    RepoBrowseUrl,
    GitTagFormat,
    GitPath,
    GitProviderId,
    Verified,
    LatestVersionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ModuleProviderRedirects {
    Table,
    Id,
    Namespace,
    Module,
    Provider,
    ModuleProviderId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
}
