//! Migration to create the sessions and sso_states tables.
//!
//! Sessions are keyed by opaque token; the provider-auth blob is sealed with
//! AES-GCM before it reaches the row. SSO states track pending external login
//! flows keyed by the unpredictable state parameter.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::Username).text())
                    .col(ColumnDef::new(Sessions::AuthMethod).text().not_null())
                    .col(ColumnDef::new(Sessions::CsrfToken).text())
                    .col(ColumnDef::new(Sessions::AuthBlob).binary())
                    .col(
                        ColumnDef::new(Sessions::Expiry)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SsoStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SsoStates::State)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SsoStates::Provider).text().not_null())
                    .col(ColumnDef::new(SsoStates::Nonce).text())
                    .col(ColumnDef::new(SsoStates::CodeVerifier).text())
                    .col(ColumnDef::new(SsoStates::RequestId).text())
                    .col(
                        ColumnDef::new(SsoStates::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SsoStates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SsoStates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    Id,
    Username,
    AuthMethod,
    CsrfToken,
    AuthBlob,
    Expiry,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SsoStates {
    Table,
    State,
    Provider,
    Nonce,
    CodeVerifier,
    RequestId,
    ExpiresAt,
    CreatedAt,
}
