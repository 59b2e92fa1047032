//! Migration to create the namespaces table.
//!
//! Namespaces are the top-level scope for modules, providers and GPG keys.
//! Names are unique; lookups for redirects compare case-insensitively.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Namespaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Namespaces::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Namespaces::Name).text().not_null())
                    .col(ColumnDef::new(Namespaces::DisplayName).text())
                    .col(ColumnDef::new(Namespaces::NamespaceType).text().not_null())
                    .col(
                        ColumnDef::new(Namespaces::CreatedAt)
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
                    .name("idx_namespaces_name")
                    .table(Namespaces::Table)
                    .col(Namespaces::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Namespaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
    Name,
    DisplayName,
    NamespaceType,
    CreatedAt,
}
