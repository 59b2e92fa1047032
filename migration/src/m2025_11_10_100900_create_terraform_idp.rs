//! Migration to create the Terraform CLI IdP tables.
//!
//! Three short-lived key/value/expiry tables: single-use authorization codes,
//! hashed access tokens, and the (subject, issuer) binding that keeps repeated
//! `terraform login` stable for one user.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IdpAuthorizationCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdpAuthorizationCodes::Code)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IdpAuthorizationCodes::CodeChallenge)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IdpAuthorizationCodes::RedirectUri)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IdpAuthorizationCodes::Subject).text().not_null())
                    .col(
                        ColumnDef::new(IdpAuthorizationCodes::Consumed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(IdpAuthorizationCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdpAccessTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdpAccessTokens::TokenHash)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IdpAccessTokens::Subject).text().not_null())
                    .col(
                        ColumnDef::new(IdpAccessTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdpSubjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdpSubjects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IdpSubjects::Subject).text().not_null())
                    .col(ColumnDef::new(IdpSubjects::Issuer).text().not_null())
                    .col(ColumnDef::new(IdpSubjects::Username).text().not_null())
                    .col(
                        ColumnDef::new(IdpSubjects::CreatedAt)
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
                    .name("idx_idp_subjects_subject_issuer")
                    .table(IdpSubjects::Table)
                    .col(IdpSubjects::Subject)
                    .col(IdpSubjects::Issuer)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IdpSubjects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdpAccessTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdpAuthorizationCodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IdpAuthorizationCodes {
    Table,
    Code,
    CodeChallenge,
    RedirectUri,
    Subject,
    Consumed,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum IdpAccessTokens {
    Table,
    TokenHash,
    Subject,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum IdpSubjects {
    Table,
    Id,
    Subject,
    Issuer,
    Username,
    CreatedAt,
}
