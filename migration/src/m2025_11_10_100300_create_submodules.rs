//! Migration to create the submodules and example_files tables.
//!
//! Submodules and examples share one table discriminated by type; examples
//! additionally own source files served to the UI.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Submodules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submodules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Submodules::ParentModuleVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Submodules::SubmoduleType).text().not_null())
                    .col(ColumnDef::new(Submodules::Path).text().not_null())
                    .col(ColumnDef::new(Submodules::Name).text())
                    .col(ColumnDef::new(Submodules::ModuleDetailsId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submodules_module_version")
                            .from(Submodules::Table, Submodules::ParentModuleVersionId)
                            .to(ModuleVersions::Table, ModuleVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submodules_module_details")
                            .from(Submodules::Table, Submodules::ModuleDetailsId)
                            .to(ModuleDetails::Table, ModuleDetails::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submodules_version_path")
                    .table(Submodules::Table)
                    .col(Submodules::ParentModuleVersionId)
                    .col(Submodules::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExampleFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExampleFiles::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExampleFiles::SubmoduleId).integer().not_null())
                    .col(ColumnDef::new(ExampleFiles::Path).text().not_null())
                    .col(ColumnDef::new(ExampleFiles::Content).binary())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_example_files_submodule")
                            .from(ExampleFiles::Table, ExampleFiles::SubmoduleId)
                            .to(Submodules::Table, Submodules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExampleFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Submodules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Submodules {
    Table,
    Id,
    ParentModuleVersionId,
    SubmoduleType,
    Path,
    Name,
    ModuleDetailsId,
}

#[derive(DeriveIden)]
enum ExampleFiles {
    Table,
    Id,
    SubmoduleId,
    Path,
    Content,
}

#[derive(DeriveIden)]
enum ModuleVersions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ModuleDetails {
    Table,
    Id,
}
