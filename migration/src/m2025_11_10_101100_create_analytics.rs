//! Migration to create the module_analytics and provider_analytics tables.
//!
//! Module analytics rows are keyed off the analytics token embedded in the
//! download path; provider analytics back the download counts attached to
//! provider search results.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModuleAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModuleAnalytics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModuleAnalytics::ParentModuleVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ModuleAnalytics::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModuleAnalytics::TerraformVersion).text())
                    .col(ColumnDef::new(ModuleAnalytics::AnalyticsToken).text().not_null())
                    .col(ColumnDef::new(ModuleAnalytics::Environment).text())
                    .col(ColumnDef::new(ModuleAnalytics::Namespace).text().not_null())
                    .col(ColumnDef::new(ModuleAnalytics::Module).text().not_null())
                    .col(ColumnDef::new(ModuleAnalytics::Provider).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_module_analytics_module_version")
                            .from(ModuleAnalytics::Table, ModuleAnalytics::ParentModuleVersionId)
                            .to(ModuleVersions::Table, ModuleVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_module_analytics_token")
                    .table(ModuleAnalytics::Table)
                    .col(ModuleAnalytics::AnalyticsToken)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderAnalytics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderAnalytics::ProviderVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAnalytics::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderAnalytics::TerraformVersion).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_analytics_provider_version")
                            .from(ProviderAnalytics::Table, ProviderAnalytics::ProviderVersionId)
                            .to(ProviderVersions::Table, ProviderVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderAnalytics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModuleAnalytics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModuleAnalytics {
    Table,
    Id,
    ParentModuleVersionId,
    Timestamp,
    TerraformVersion,
    AnalyticsToken,
    Environment,
    Namespace,
    Module,
    Provider,
}

#[derive(DeriveIden)]
enum ProviderAnalytics {
    Table,
    Id,
    ProviderVersionId,
    Timestamp,
    TerraformVersion,
}

#[derive(DeriveIden)]
enum ModuleVersions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ProviderVersions {
    Table,
    Id,
}
