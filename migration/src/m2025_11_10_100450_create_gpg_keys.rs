//! Migration to create the gpg_keys table.
//!
//! GPG keys belong to a namespace and are identified by (key id, fingerprint).
//! The ASCII-armored public key is stored verbatim for client verification.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GpgKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GpgKeys::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GpgKeys::NamespaceId).integer().not_null())
                    .col(ColumnDef::new(GpgKeys::KeyId).text().not_null())
                    .col(ColumnDef::new(GpgKeys::Fingerprint).text().not_null())
                    .col(ColumnDef::new(GpgKeys::AsciiArmor).text().not_null())
                    .col(ColumnDef::new(GpgKeys::Source).text())
                    .col(ColumnDef::new(GpgKeys::SourceUrl).text())
                    .col(
                        ColumnDef::new(GpgKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gpg_keys_namespace")
                            .from(GpgKeys::Table, GpgKeys::NamespaceId)
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gpg_keys_fingerprint")
                    .table(GpgKeys::Table)
                    .col(GpgKeys::Fingerprint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GpgKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GpgKeys {
    Table,
    Id,
    NamespaceId,
    KeyId,
    Fingerprint,
    AsciiArmor,
    Source,
    SourceUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
}
