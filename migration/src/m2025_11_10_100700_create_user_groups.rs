//! Migration to create the user_groups and user_group_namespace_permissions tables.
//!
//! Groups come from SSO claim mapping; a permission row binds a group to a
//! namespace at one of the levels full/modify/read.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserGroups::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserGroups::Name).text().not_null())
                    .col(
                        ColumnDef::new(UserGroups::SiteAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserGroups::CreatedAt)
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
                    .name("idx_user_groups_name")
                    .table(UserGroups::Table)
                    .col(UserGroups::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserGroupNamespacePermissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserGroupNamespacePermissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserGroupNamespacePermissions::UserGroupId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserGroupNamespacePermissions::NamespaceId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserGroupNamespacePermissions::PermissionType)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_group_permissions_group")
                            .from(
                                UserGroupNamespacePermissions::Table,
                                UserGroupNamespacePermissions::UserGroupId,
                            )
                            .to(UserGroups::Table, UserGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_group_permissions_namespace")
                            .from(
                                UserGroupNamespacePermissions::Table,
                                UserGroupNamespacePermissions::NamespaceId,
                            )
                            .to(Namespaces::Table, Namespaces::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_group_permissions_group_namespace")
                    .table(UserGroupNamespacePermissions::Table)
                    .col(UserGroupNamespacePermissions::UserGroupId)
                    .col(UserGroupNamespacePermissions::NamespaceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(UserGroupNamespacePermissions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(UserGroups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserGroups {
    Table,
    Id,
    Name,
    SiteAdmin,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserGroupNamespacePermissions {
    Table,
    Id,
    UserGroupId,
    NamespaceId,
    PermissionType,
}

#[derive(DeriveIden)]
enum Namespaces {
    Table,
    Id,
}
