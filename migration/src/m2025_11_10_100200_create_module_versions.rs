//! Migration to create the module_details and module_versions tables.
//!
//! A module version carries the extracted metadata for one published semver
//! under a module provider, plus a details blob holding README and tooling
//! output. Submodules and examples reference their own details rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModuleDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModuleDetails::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModuleDetails::ReadmeContent).binary())
                    .col(ColumnDef::new(ModuleDetails::TerraformDocs).json())
                    .col(ColumnDef::new(ModuleDetails::Tfsec).json())
                    .col(ColumnDef::new(ModuleDetails::Infracost).json())
                    .col(ColumnDef::new(ModuleDetails::TerraformGraph).binary())
                    .col(ColumnDef::new(ModuleDetails::TerraformModules).json())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ModuleVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModuleVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModuleVersions::ModuleProviderId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModuleVersions::Version).text().not_null())
                    .col(
                        ColumnDef::new(ModuleVersions::Beta)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ModuleVersions::Internal)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ModuleVersions::Published)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ModuleVersions::Owner).text())
                    .col(ColumnDef::new(ModuleVersions::Description).text())
                    .col(ColumnDef::new(ModuleVersions::VariableTemplate).json())
                    .col(ColumnDef::new(ModuleVersions::ExtractionVersion).integer())
                    .col(ColumnDef::new(ModuleVersions::ModuleDetailsId).integer())
                    .col(ColumnDef::new(ModuleVersions::ArchiveUrl).text())
                    .col(
                        ColumnDef::new(ModuleVersions::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_module_versions_module_provider")
                            .from(ModuleVersions::Table, ModuleVersions::ModuleProviderId)
                            .to(ModuleProviders::Table, ModuleProviders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_module_versions_module_details")
                            .from(ModuleVersions::Table, ModuleVersions::ModuleDetailsId)
                            .to(ModuleDetails::Table, ModuleDetails::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_module_versions_provider_version")
                    .table(ModuleVersions::Table)
                    .col(ModuleVersions::ModuleProviderId)
                    .col(ModuleVersions::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModuleVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModuleDetails::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModuleDetails {
    Table,
    Id,
    ReadmeContent,
    TerraformDocs,
    Tfsec,
    Infracost,
    TerraformGraph,
    TerraformModules,
}

#[derive(DeriveIden)]
enum ModuleVersions {
    Table,
    Id,
    ModuleProviderId,
    Version,
    Beta,
    Internal,
    Published,
    Owner,
    Description,
    VariableTemplate,
    ExtractionVersion,
    ModuleDetailsId,
    ArchiveUrl,
    PublishedAt,
}

#[derive(DeriveIden)]
enum ModuleProviders {
    Table,
    Id,
}
