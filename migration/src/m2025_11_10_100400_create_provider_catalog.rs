//! Migration to create the provider_categories, repositories and providers tables.
//!
//! Providers are per-platform binary plugins. Each provider links to a source
//! repository record and a category used for search filtering.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderCategories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderCategories::Name).text().not_null())
                    .col(ColumnDef::new(ProviderCategories::Slug).text().not_null())
                    .col(
                        ColumnDef::new(ProviderCategories::UserSelectable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_categories_slug")
                    .table(ProviderCategories::Table)
                    .col(ProviderCategories::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::ProviderSource).text().not_null())
                    .col(ColumnDef::new(Repositories::Owner).text().not_null())
                    .col(ColumnDef::new(Repositories::Name).text().not_null())
                    .col(ColumnDef::new(Repositories::Description).text())
                    .col(ColumnDef::new(Repositories::CloneUrl).text())
                    .col(ColumnDef::new(Repositories::LogoUrl).text())
                    .col(
                        ColumnDef::new(Repositories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_source_owner_name")
                    .table(Repositories::Table)
                    .col(Repositories::ProviderSource)
                    .col(Repositories::Owner)
                    .col(Repositories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Providers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Providers::NamespaceId).integer().not_null())
                    .col(ColumnDef::new(Providers::Name).text().not_null())
                    .col(ColumnDef::new(Providers::Description).text())
                    .col(ColumnDef::new(Providers::Tier).text().not_null())
                    .col(ColumnDef::new(Providers::ProviderCategoryId).integer())
                    .col(ColumnDef::new(Providers::RepositoryId).integer())
                    // No FK; closes a cycle with provider_versions.
                    .col(ColumnDef::new(Providers::LatestVersionId).integer())
                    .col(
                        ColumnDef::new(Providers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_namespace")
                            .from(Providers::Table, Providers::NamespaceId)
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_category")
                            .from(Providers::Table, Providers::ProviderCategoryId)
                            .to(ProviderCategories::Table, ProviderCategories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_repository")
                            .from(Providers::Table, Providers::RepositoryId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_providers_namespace_name")
                    .table(Providers::Table)
                    .col(Providers::NamespaceId)
                    .col(Providers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Providers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderCategories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderCategories {
    Table,
    Id,
    Name,
    Slug,
    UserSelectable,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    ProviderSource,
    Owner,
    Name,
    Description,
    CloneUrl,
    LogoUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
    NamespaceId,
    Name,
    Description,
    Tier,
    ProviderCategoryId,
    RepositoryId,
    LatestVersionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
}
