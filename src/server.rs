//! # Server Configuration
//!
//! Application state, router assembly and startup. Every request passes
//! through trace-context assignment and identity resolution before reaching
//! a handler; mutating handlers open their own transaction and commit after
//! their audit insert.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::middleware::identity_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::maintenance::MaintenanceSweeper;
use crate::sso::{github::GithubClient, oidc::OidcClient, saml::SamlClient};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub oidc: Option<Arc<OidcClient>>,
    pub github: Option<Arc<GithubClient>>,
    pub saml: Option<Arc<SamlClient>>,
}

impl AppState {
    /// Build state with SSO clients derived from configuration.
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Self {
        Self {
            oidc: OidcClient::from_config(&config).map(Arc::new),
            github: GithubClient::from_config(&config).map(Arc::new),
            saml: SamlClient::from_config(&config).map(Arc::new),
            db,
            config,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/.well-known/terraform.json",
            get(handlers::well_known_terraform),
        )
        .route("/v1/terrareg/health", get(handlers::health))
        // Module registry protocol
        .route("/v1/modules/search", get(handlers::modules::search_modules))
        .route(
            "/v1/modules/{namespace}/{module}/{provider}/versions",
            get(handlers::modules::list_versions),
        )
        .route(
            "/v1/modules/{namespace}/{module}/{provider}/download",
            get(handlers::modules::download_latest),
        )
        .route(
            "/v1/modules/{namespace}/{module}/{provider}/{version}/download",
            get(handlers::modules::download_version),
        )
        .route(
            "/v1/modules/{namespace}/{module}/{provider}",
            get(handlers::modules::get_module),
        )
        .route(
            "/v1/modules/{namespace}/{module}/{provider}/{version}",
            get(handlers::modules::get_module_version),
        )
        // Provider registry protocol
        .route(
            "/v1/providers/search",
            get(handlers::providers::search_providers),
        )
        .route(
            "/v1/providers/{namespace}/{name}/versions",
            get(handlers::providers::list_versions),
        )
        .route(
            "/v1/providers/{namespace}/{name}/{version}/download/{os}/{arch}",
            get(handlers::providers::download),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/{name}/{version}/shasums",
            get(handlers::providers::shasums),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/{name}/{version}/shasums.sig",
            get(handlers::providers::shasums_signature),
        )
        // Search extras
        .route(
            "/v1/terrareg/modules/search",
            get(handlers::modules::search_modules),
        )
        .route(
            "/v1/terrareg/search_filters",
            get(handlers::modules::search_filters),
        )
        // Module management
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/create",
            post(handlers::module_admin::create_module_provider),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/delete",
            delete(handlers::module_admin::delete_module_provider),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/settings",
            post(handlers::module_admin::update_module_provider_settings),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/import",
            post(handlers::module_admin::import_module_version),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}/publish",
            post(handlers::module_admin::publish_module_version),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}",
            delete(handlers::module_admin::delete_module_version),
        )
        .route(
            "/v1/terrareg/modules/{namespace}/{module}/{provider}/{version}/examples",
            get(handlers::modules::list_examples),
        )
        .route(
            "/v1/terrareg/analytics/{namespace}/{module}/{provider}/token_versions",
            get(handlers::module_admin::token_versions),
        )
        // Provider management
        .route(
            "/v1/terrareg/provider_categories",
            get(handlers::provider_admin::list_provider_categories),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/create",
            post(handlers::provider_admin::create_provider),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/{name}/delete",
            delete(handlers::provider_admin::delete_provider),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/{name}/versions",
            post(handlers::provider_admin::index_provider_version),
        )
        .route(
            "/v1/terrareg/providers/{namespace}/{name}/{version}",
            delete(handlers::provider_admin::delete_provider_version),
        )
        .route(
            "/v1/terrareg/repositories",
            post(handlers::provider_admin::create_repository),
        )
        .route(
            "/v1/terrareg/repositories/{id}",
            put(handlers::provider_admin::update_repository)
                .delete(handlers::provider_admin::delete_repository),
        )
        // GPG keys
        .route(
            "/v1/terrareg/gpg-keys",
            post(handlers::gpg_keys::create_gpg_key),
        )
        .route(
            "/v1/terrareg/gpg-keys/{namespace}",
            get(handlers::gpg_keys::list_gpg_keys),
        )
        .route(
            "/v1/terrareg/gpg-keys/{namespace}/{fingerprint}",
            delete(handlers::gpg_keys::delete_gpg_key),
        )
        // Namespaces
        .route(
            "/v1/terrareg/namespaces",
            get(handlers::namespaces::list_namespaces).post(handlers::namespaces::create_namespace),
        )
        .route(
            "/v1/terrareg/namespaces/{namespace}",
            post(handlers::namespaces::update_namespace)
                .delete(handlers::namespaces::delete_namespace),
        )
        // User groups
        .route(
            "/v1/terrareg/user-groups",
            get(handlers::user_groups::list_user_groups)
                .post(handlers::user_groups::create_user_group),
        )
        .route(
            "/v1/terrareg/user-groups/{name}",
            delete(handlers::user_groups::delete_user_group),
        )
        .route(
            "/v1/terrareg/user-groups/{name}/permissions/{namespace}",
            put(handlers::user_groups::set_permission)
                .delete(handlers::user_groups::delete_permission),
        )
        // Sessions
        .route("/v1/terrareg/auth/login", post(handlers::auth::login))
        .route("/v1/terrareg/auth/session", delete(handlers::auth::logout))
        .route(
            "/v1/terrareg/auth/admin/is_authenticated",
            get(handlers::auth::is_authenticated),
        )
        // External SSO
        .route("/openid/login", get(handlers::sso::oidc_login))
        .route("/openid/callback", get(handlers::sso::oidc_callback))
        .route("/github/login", get(handlers::sso::github_login))
        .route("/github/callback", get(handlers::sso::github_callback))
        .route("/saml/login", get(handlers::sso::saml_login))
        .route("/saml/metadata", get(handlers::sso::saml_metadata))
        .route("/saml/acs", post(handlers::sso::saml_acs))
        // Terraform CLI IdP
        .route(
            "/terraform/oauth/authorization",
            get(handlers::idp::authorization),
        )
        .route("/terraform/oauth/token", post(handlers::idp::token))
        .route("/terraform/oauth/revoke", post(handlers::idp::revoke))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration and database pool.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), db.clone());

    crate::seeds::seed_provider_categories(&db).await?;

    let shutdown = CancellationToken::new();
    let sweeper = MaintenanceSweeper::new(Arc::clone(&config), Arc::new(db));
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper_handle.await;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::well_known_terraform,
        crate::handlers::health,
        crate::handlers::modules::search_modules,
        crate::handlers::modules::search_filters,
        crate::handlers::modules::list_versions,
        crate::handlers::modules::download_latest,
        crate::handlers::modules::download_version,
        crate::handlers::modules::get_module,
        crate::handlers::modules::get_module_version,
        crate::handlers::modules::list_examples,
        crate::handlers::providers::search_providers,
        crate::handlers::providers::list_versions,
        crate::handlers::providers::download,
        crate::handlers::providers::shasums,
        crate::handlers::providers::shasums_signature,
        crate::handlers::module_admin::create_module_provider,
        crate::handlers::module_admin::delete_module_provider,
        crate::handlers::module_admin::update_module_provider_settings,
        crate::handlers::module_admin::import_module_version,
        crate::handlers::module_admin::publish_module_version,
        crate::handlers::module_admin::delete_module_version,
        crate::handlers::module_admin::token_versions,
        crate::handlers::provider_admin::list_provider_categories,
        crate::handlers::provider_admin::create_provider,
        crate::handlers::provider_admin::delete_provider,
        crate::handlers::provider_admin::index_provider_version,
        crate::handlers::provider_admin::delete_provider_version,
        crate::handlers::provider_admin::create_repository,
        crate::handlers::provider_admin::update_repository,
        crate::handlers::provider_admin::delete_repository,
        crate::handlers::gpg_keys::list_gpg_keys,
        crate::handlers::gpg_keys::create_gpg_key,
        crate::handlers::gpg_keys::delete_gpg_key,
        crate::handlers::namespaces::list_namespaces,
        crate::handlers::namespaces::create_namespace,
        crate::handlers::namespaces::update_namespace,
        crate::handlers::namespaces::delete_namespace,
        crate::handlers::user_groups::list_user_groups,
        crate::handlers::user_groups::create_user_group,
        crate::handlers::user_groups::delete_user_group,
        crate::handlers::user_groups::set_permission,
        crate::handlers::user_groups::delete_permission,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::is_authenticated,
        crate::handlers::sso::oidc_login,
        crate::handlers::sso::oidc_callback,
        crate::handlers::sso::github_login,
        crate::handlers::sso::github_callback,
        crate::handlers::sso::saml_login,
        crate::handlers::sso::saml_metadata,
        crate::handlers::sso::saml_acs,
        crate::handlers::idp::authorization,
        crate::handlers::idp::token,
        crate::handlers::idp::revoke,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
        )
    ),
    info(
        title = "tfregistry API",
        description = "Private Terraform module and provider registry",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
