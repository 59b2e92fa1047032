//! Migration to create the audit_history table.
//!
//! Append-only. Rows are inserted inside the same transaction as the domain
//! change they describe; there is no update or delete path.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuditHistory::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditHistory::Username).text().not_null())
                    .col(ColumnDef::new(AuditHistory::Action).text().not_null())
                    .col(ColumnDef::new(AuditHistory::ObjectType).text().not_null())
                    .col(ColumnDef::new(AuditHistory::ObjectId).text().not_null())
                    .col(ColumnDef::new(AuditHistory::OldValue).text())
                    .col(ColumnDef::new(AuditHistory::NewValue).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_history_timestamp")
                    .table(AuditHistory::Table)
                    .col(AuditHistory::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuditHistory {
    Table,
    Id,
    Timestamp,
    Username,
    Action,
    ObjectType,
    ObjectId,
    OldValue,
    NewValue,
}
