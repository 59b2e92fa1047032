//! Module version repository, including details, submodules and examples.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::models::{example_file, module_details, module_version, submodule};
use crate::semver::Semver;

/// Fields captured at extraction time for a new module version.
#[derive(Debug, Clone, Default)]
pub struct NewModuleVersion {
    pub version: String,
    pub beta: bool,
    pub internal: bool,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub variable_template: Option<serde_json::Value>,
    pub extraction_version: Option<i32>,
    pub archive_url: Option<String>,
}

/// Extracted documentation for a version, submodule or example.
#[derive(Debug, Clone, Default)]
pub struct NewModuleDetails {
    pub readme_content: Option<Vec<u8>>,
    pub terraform_docs: Option<serde_json::Value>,
    pub tfsec: Option<serde_json::Value>,
    pub infracost: Option<serde_json::Value>,
    pub terraform_graph: Option<Vec<u8>>,
    pub terraform_modules: Option<serde_json::Value>,
}

/// Repository for module version aggregates.
pub struct ModuleVersionRepository;

impl ModuleVersionRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
        new: NewModuleVersion,
        details_id: Option<i32>,
    ) -> Result<module_version::Model, DbErr> {
        module_version::ActiveModel {
            module_provider_id: Set(module_provider_id),
            version: Set(new.version),
            beta: Set(new.beta),
            internal: Set(new.internal),
            published: Set(false),
            owner: Set(new.owner),
            description: Set(new.description),
            variable_template: Set(new.variable_template),
            extraction_version: Set(new.extraction_version),
            module_details_id: Set(details_id),
            archive_url: Set(new.archive_url),
            published_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn create_details<C: ConnectionTrait>(
        conn: &C,
        new: NewModuleDetails,
    ) -> Result<module_details::Model, DbErr> {
        module_details::ActiveModel {
            readme_content: Set(new.readme_content),
            terraform_docs: Set(new.terraform_docs),
            tfsec: Set(new.tfsec),
            infracost: Set(new.infracost),
            terraform_graph: Set(new.terraform_graph),
            terraform_modules: Set(new.terraform_modules),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
        version: &str,
    ) -> Result<Option<module_version::Model>, DbErr> {
        module_version::Entity::find()
            .filter(module_version::Column::ModuleProviderId.eq(module_provider_id))
            .filter(module_version::Column::Version.eq(version))
            .one(conn)
            .await
    }

    /// Every version including internal and unpublished ones, newest first.
    /// Management surface only; public listings use [`Self::list_public`].
    pub async fn list_all<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
    ) -> Result<Vec<module_version::Model>, DbErr> {
        let mut rows = module_version::Entity::find()
            .filter(module_version::Column::ModuleProviderId.eq(module_provider_id))
            .all(conn)
            .await?;

        rows.sort_by(|a, b| match (Semver::parse(&a.version), Semver::parse(&b.version)) {
            (Ok(va), Ok(vb)) => vb.cmp(&va),
            _ => b.version.cmp(&a.version),
        });
        Ok(rows)
    }

    /// Published non-internal versions, newest first under semver order.
    pub async fn list_public<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
    ) -> Result<Vec<module_version::Model>, DbErr> {
        let mut rows: Vec<module_version::Model> = module_version::Entity::find()
            .filter(module_version::Column::ModuleProviderId.eq(module_provider_id))
            .filter(module_version::Column::Published.eq(true))
            .filter(module_version::Column::Internal.eq(false))
            .all(conn)
            .await?;

        rows.sort_by(|a, b| match (Semver::parse(&a.version), Semver::parse(&b.version)) {
            (Ok(va), Ok(vb)) => vb.cmp(&va),
            _ => b.version.cmp(&a.version),
        });
        Ok(rows)
    }

    /// The latest published, non-beta, non-internal version, if any.
    pub async fn latest<C: ConnectionTrait>(
        conn: &C,
        module_provider_id: i32,
    ) -> Result<Option<module_version::Model>, DbErr> {
        let rows = module_version::Entity::find()
            .filter(module_version::Column::ModuleProviderId.eq(module_provider_id))
            .filter(module_version::Column::Published.eq(true))
            .filter(module_version::Column::Beta.eq(false))
            .filter(module_version::Column::Internal.eq(false))
            .all(conn)
            .await?;

        Ok(rows.into_iter().max_by(|a, b| {
            match (Semver::parse(&a.version), Semver::parse(&b.version)) {
                (Ok(va), Ok(vb)) => va.cmp(&vb),
                _ => a.version.cmp(&b.version),
            }
        }))
    }

    pub async fn set_published<C: ConnectionTrait>(
        conn: &C,
        model: module_version::Model,
    ) -> Result<module_version::Model, DbErr> {
        let mut active: module_version::ActiveModel = model.into();
        active.published = Set(true);
        active.update(conn).await
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
        module_version::Entity::delete_by_id(id).exec(conn).await?;
        Ok(())
    }

    pub async fn get_details<C: ConnectionTrait>(
        conn: &C,
        details_id: i32,
    ) -> Result<Option<module_details::Model>, DbErr> {
        module_details::Entity::find_by_id(details_id).one(conn).await
    }

    pub async fn create_submodule<C: ConnectionTrait>(
        conn: &C,
        parent_module_version_id: i32,
        submodule_type: &str,
        path: &str,
        name: Option<String>,
        details_id: Option<i32>,
    ) -> Result<submodule::Model, DbErr> {
        submodule::ActiveModel {
            parent_module_version_id: Set(parent_module_version_id),
            submodule_type: Set(submodule_type.to_string()),
            path: Set(path.to_string()),
            name: Set(name),
            module_details_id: Set(details_id),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Submodules or examples for a version, ordered by path.
    pub async fn list_submodules<C: ConnectionTrait>(
        conn: &C,
        parent_module_version_id: i32,
        submodule_type: &str,
    ) -> Result<Vec<submodule::Model>, DbErr> {
        submodule::Entity::find()
            .filter(submodule::Column::ParentModuleVersionId.eq(parent_module_version_id))
            .filter(submodule::Column::SubmoduleType.eq(submodule_type))
            .order_by_asc(submodule::Column::Path)
            .all(conn)
            .await
    }

    pub async fn create_example_file<C: ConnectionTrait>(
        conn: &C,
        submodule_id: i32,
        path: &str,
        content: Option<Vec<u8>>,
    ) -> Result<example_file::Model, DbErr> {
        example_file::ActiveModel {
            submodule_id: Set(submodule_id),
            path: Set(path.to_string()),
            content: Set(content),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn list_example_files<C: ConnectionTrait>(
        conn: &C,
        submodule_id: i32,
    ) -> Result<Vec<example_file::Model>, DbErr> {
        example_file::Entity::find()
            .filter(example_file::Column::SubmoduleId.eq(submodule_id))
            .order_by_asc(example_file::Column::Path)
            .all(conn)
            .await
    }
}
