//! Migration to create the provider_versions and provider_binaries tables.
//!
//! A provider version stores the SHA256SUMS document and its detached GPG
//! signature verbatim; binaries are referenced by opaque object URL, never
//! stored inline.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderVersions::ProviderId).integer().not_null())
                    .col(ColumnDef::new(ProviderVersions::Version).text().not_null())
                    .col(ColumnDef::new(ProviderVersions::GitTag).text())
                    .col(
                        ColumnDef::new(ProviderVersions::Beta)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ProviderVersions::ProtocolVersions)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderVersions::GpgKeyId).integer())
                    .col(ColumnDef::new(ProviderVersions::Shasums).text())
                    .col(ColumnDef::new(ProviderVersions::ShasumsSignature).binary())
                    .col(
                        ColumnDef::new(ProviderVersions::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_versions_provider")
                            .from(ProviderVersions::Table, ProviderVersions::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_versions_gpg_key")
                            .from(ProviderVersions::Table, ProviderVersions::GpgKeyId)
                            .to(GpgKeys::Table, GpgKeys::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_versions_provider_version")
                    .table(ProviderVersions::Table)
                    .col(ProviderVersions::ProviderId)
                    .col(ProviderVersions::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderBinaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderBinaries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderBinaries::ProviderVersionId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderBinaries::Os).text().not_null())
                    .col(ColumnDef::new(ProviderBinaries::Arch).text().not_null())
                    .col(ColumnDef::new(ProviderBinaries::Filename).text().not_null())
                    .col(ColumnDef::new(ProviderBinaries::Checksum).text().not_null())
                    .col(ColumnDef::new(ProviderBinaries::ObjectUrl).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_binaries_provider_version")
                            .from(ProviderBinaries::Table, ProviderBinaries::ProviderVersionId)
                            .to(ProviderVersions::Table, ProviderVersions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_binaries_platform")
                    .table(ProviderBinaries::Table)
                    .col(ProviderBinaries::ProviderVersionId)
                    .col(ProviderBinaries::Os)
                    .col(ProviderBinaries::Arch)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderBinaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderVersions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderVersions {
    Table,
    Id,
    ProviderId,
    Version,
    GitTag,
    Beta,
    ProtocolVersions,
    GpgKeyId,
    Shasums,
    ShasumsSignature,
    PublishedAt,
}

#[derive(DeriveIden)]
enum ProviderBinaries {
    Table,
    Id,
    ProviderVersionId,
    Os,
    Arch,
    Filename,
    Checksum,
    ObjectUrl,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum GpgKeys {
    Table,
    Id,
}
