//! # Search & Discovery
//!
//! Module and provider search with multi-term weighted scoring, trust
//! filtering and facet aggregation. Candidate rows are fetched with their
//! namespace and latest-version context, then filtered, scored and paginated
//! by the pure functions in this module so facet counts always agree with
//! search results.

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::config::AppConfig;
use crate::models::{module_provider, module_version, provider, provider_category};
use crate::repositories::{
    AnalyticsRepository, ModuleProviderRepository, NamespaceRepository, ProviderRepository,
};

/// Search parameters shared by the module search endpoints.
#[derive(Debug, Clone, Default)]
pub struct ModuleSearchParams {
    /// Free-text query, tokenized on whitespace.
    pub q: Option<String>,
    /// Restrict to these namespaces.
    pub namespaces: Vec<String>,
    /// Restrict to an exact module name.
    pub module: Option<String>,
    /// Restrict to these providers.
    pub providers: Vec<String>,
    /// Restrict to verified module providers.
    pub verified: Option<bool>,
    /// Restrict to trusted namespaces.
    pub trusted: Option<bool>,
    /// Restrict to contributed (non-trusted) namespaces.
    pub contributed: Option<bool>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Ordering when no query is given: `module` or `namespace`.
    pub order_by: Option<String>,
    /// `asc` or `desc`.
    pub order_dir: Option<String>,
}

/// A module-provider candidate with its scoring context.
#[derive(Debug, Clone)]
pub struct ModuleSearchRow {
    pub module_provider: module_provider::Model,
    pub namespace_name: String,
    pub latest_version: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub verified: bool,
    pub trusted: bool,
}

/// One page of scored module results.
#[derive(Debug)]
pub struct ModuleSearchOutcome {
    pub rows: Vec<ModuleSearchRow>,
    pub total: u64,
}

/// Facet counts for the search UI.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ModuleSearchFacets {
    pub trusted: u64,
    pub contributed: u64,
    pub verified: u64,
    pub namespaces: BTreeMap<String, u64>,
    pub providers: BTreeMap<String, u64>,
}

/// Tokenize a query string on whitespace, lower-casing for comparison.
fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Per-token rubric; the highest matching rule wins.
fn score_token(row: &ModuleSearchRow, token: &str) -> i64 {
    let module = row.module_provider.module.to_lowercase();
    let namespace = row.namespace_name.to_lowercase();
    let provider = row.module_provider.provider.to_lowercase();
    let description = row.description.as_deref().unwrap_or("").to_lowercase();
    let owner = row.owner.as_deref().unwrap_or("").to_lowercase();

    if module == token {
        20
    } else if namespace == token {
        18
    } else if provider == token {
        14
    } else if !description.is_empty() && description == token {
        13
    } else if !owner.is_empty() && owner == token {
        12
    } else if module.contains(token) {
        5
    } else if description.contains(token) {
        4
    } else if owner.contains(token) {
        3
    } else if namespace.contains(token) {
        2
    } else {
        0
    }
}

/// Sum of per-token scores.
fn score_row(row: &ModuleSearchRow, tokens: &[String]) -> i64 {
    tokens.iter().map(|t| score_token(row, t)).sum()
}

/// Row-level filter: any token appears in module, namespace, description or
/// owner.
fn row_matches(row: &ModuleSearchRow, tokens: &[String]) -> bool {
    let module = row.module_provider.module.to_lowercase();
    let namespace = row.namespace_name.to_lowercase();
    let description = row.description.as_deref().unwrap_or("").to_lowercase();
    let owner = row.owner.as_deref().unwrap_or("").to_lowercase();

    tokens.iter().any(|t| {
        module.contains(t) || namespace.contains(t) || description.contains(t) || owner.contains(t)
    })
}

fn passes_filters(row: &ModuleSearchRow, params: &ModuleSearchParams) -> bool {
    if !params.namespaces.is_empty()
        && !params
            .namespaces
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&row.namespace_name))
    {
        return false;
    }
    if let Some(module) = &params.module {
        if !module.eq_ignore_ascii_case(&row.module_provider.module) {
            return false;
        }
    }
    if !params.providers.is_empty()
        && !params
            .providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&row.module_provider.provider))
    {
        return false;
    }
    if let Some(verified) = params.verified {
        if row.verified != verified {
            return false;
        }
    }

    // trusted=true restricts to trusted namespaces, contributed=true to the
    // rest; requesting both OR-combines the conditions.
    let trusted = params.trusted.unwrap_or(false);
    let contributed = params.contributed.unwrap_or(false);
    if trusted && contributed {
        // Every row is either trusted or contributed.
    } else if trusted && !row.trusted {
        return false;
    } else if contributed && row.trusted {
        return false;
    }

    true
}

/// Assemble discovery-eligible module rows with their scoring context.
pub async fn module_candidates<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
) -> Result<Vec<ModuleSearchRow>, DbErr> {
    let namespaces = NamespaceRepository::list(conn).await?;
    let namespace_names: BTreeMap<i32, String> =
        namespaces.into_iter().map(|n| (n.id, n.name)).collect();

    let module_providers = ModuleProviderRepository::list_discoverable(conn).await?;

    let latest_ids: Vec<i32> = module_providers
        .iter()
        .filter_map(|mp| mp.latest_version_id)
        .collect();
    let latest_versions: BTreeMap<i32, module_version::Model> = if latest_ids.is_empty() {
        BTreeMap::new()
    } else {
        module_version::Entity::find()
            .filter(module_version::Column::Id.is_in(latest_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    let mut rows = Vec::with_capacity(module_providers.len());
    for mp in module_providers {
        let Some(namespace_name) = namespace_names.get(&mp.namespace_id).cloned() else {
            continue;
        };
        let Some(latest) = mp
            .latest_version_id
            .and_then(|id| latest_versions.get(&id))
        else {
            continue;
        };

        let verified = mp.verified || config.is_auto_verified_namespace(&namespace_name);
        let trusted = config.is_trusted_namespace(&namespace_name);

        rows.push(ModuleSearchRow {
            verified,
            trusted,
            namespace_name,
            latest_version: latest.version.clone(),
            description: latest.description.clone(),
            owner: latest.owner.clone(),
            module_provider: mp,
        });
    }

    Ok(rows)
}

/// Execute a module search: filter, score, order and paginate.
pub async fn search_modules<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    params: &ModuleSearchParams,
) -> Result<ModuleSearchOutcome, DbErr> {
    let candidates = module_candidates(conn, config).await?;
    let tokens = params.q.as_deref().map(tokenize).unwrap_or_default();

    let mut matched: Vec<(i64, ModuleSearchRow)> = candidates
        .into_iter()
        .filter(|row| passes_filters(row, params))
        .filter(|row| tokens.is_empty() || row_matches(row, &tokens))
        .map(|row| (score_row(&row, &tokens), row))
        .collect();

    if tokens.is_empty() {
        let descending = params.order_dir.as_deref() == Some("desc");
        let by_namespace = params.order_by.as_deref() == Some("namespace");
        matched.sort_by(|(_, a), (_, b)| {
            let ord = if by_namespace {
                a.namespace_name
                    .cmp(&b.namespace_name)
                    .then_with(|| a.module_provider.module.cmp(&b.module_provider.module))
            } else {
                a.module_provider
                    .module
                    .cmp(&b.module_provider.module)
                    .then_with(|| a.namespace_name.cmp(&b.namespace_name))
            };
            if descending { ord.reverse() } else { ord }
        });
    } else {
        matched.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then_with(|| a.module_provider.module.cmp(&b.module_provider.module))
                .then_with(|| a.module_provider.provider.cmp(&b.module_provider.provider))
        });
    }

    let total = matched.len() as u64;
    let offset = params.offset.unwrap_or(0) as usize;
    let limit = params.limit.unwrap_or(10).min(50) as usize;

    let rows = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(_, row)| row)
        .collect();

    Ok(ModuleSearchOutcome { rows, total })
}

/// Facet counts over the same row filter as [`search_modules`], ignoring
/// pagination. For any query the counts equal what an unbounded search would
/// return.
pub async fn module_search_facets<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    query: Option<&str>,
) -> Result<ModuleSearchFacets, DbErr> {
    let candidates = module_candidates(conn, config).await?;
    let tokens = query.map(tokenize).unwrap_or_default();

    let mut facets = ModuleSearchFacets::default();
    for row in candidates {
        if !tokens.is_empty() && !row_matches(&row, &tokens) {
            continue;
        }
        if row.trusted {
            facets.trusted += 1;
        } else {
            facets.contributed += 1;
        }
        if row.verified {
            facets.verified += 1;
        }
        *facets
            .namespaces
            .entry(row.namespace_name.clone())
            .or_default() += 1;
        *facets
            .providers
            .entry(row.module_provider.provider.clone())
            .or_default() += 1;
    }

    Ok(facets)
}

/// A provider candidate with its scoring context.
#[derive(Debug, Clone)]
pub struct ProviderSearchRow {
    pub provider: provider::Model,
    pub namespace_name: String,
    pub latest_version: Option<String>,
    pub category_slug: Option<String>,
    pub downloads: u64,
}

/// Search parameters for provider search.
#[derive(Debug, Clone, Default)]
pub struct ProviderSearchParams {
    pub q: Option<String>,
    pub namespaces: Vec<String>,
    pub categories: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

fn score_provider_token(row: &ProviderSearchRow, token: &str) -> i64 {
    let name = row.provider.name.to_lowercase();
    let namespace = row.namespace_name.to_lowercase();
    let description = row
        .provider
        .description
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    if name == token {
        20
    } else if namespace == token {
        18
    } else if !description.is_empty() && description == token {
        13
    } else if name.contains(token) {
        5
    } else if description.contains(token) {
        4
    } else if namespace.contains(token) {
        2
    } else {
        0
    }
}

fn provider_row_matches(row: &ProviderSearchRow, tokens: &[String]) -> bool {
    let name = row.provider.name.to_lowercase();
    let namespace = row.namespace_name.to_lowercase();
    let description = row
        .provider
        .description
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    tokens
        .iter()
        .any(|t| name.contains(t) || namespace.contains(t) || description.contains(t))
}

/// Execute a provider search with download counts attached.
pub async fn search_providers<C: ConnectionTrait>(
    conn: &C,
    params: &ProviderSearchParams,
) -> Result<Vec<ProviderSearchRow>, DbErr> {
    let namespaces = NamespaceRepository::list(conn).await?;
    let namespace_names: BTreeMap<i32, String> =
        namespaces.into_iter().map(|n| (n.id, n.name)).collect();

    let categories: BTreeMap<i32, provider_category::Model> = provider_category::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let providers = ProviderRepository::list_discoverable(conn).await?;

    let mut rows = Vec::with_capacity(providers.len());
    for p in providers {
        let Some(namespace_name) = namespace_names.get(&p.namespace_id).cloned() else {
            continue;
        };
        let latest_version = match p.latest_version_id {
            Some(id) => ProviderRepository::get_version_by_id(conn, id)
                .await?
                .map(|v| v.version),
            None => None,
        };
        let category_slug = p
            .provider_category_id
            .and_then(|id| categories.get(&id))
            .map(|c| c.slug.clone());
        let downloads = AnalyticsRepository::provider_download_count(conn, p.id).await?;

        rows.push(ProviderSearchRow {
            provider: p,
            namespace_name,
            latest_version,
            category_slug,
            downloads,
        });
    }

    let tokens = params.q.as_deref().map(tokenize).unwrap_or_default();

    let mut matched: Vec<(i64, ProviderSearchRow)> = rows
        .into_iter()
        .filter(|row| {
            params.namespaces.is_empty()
                || params
                    .namespaces
                    .iter()
                    .any(|n| n.eq_ignore_ascii_case(&row.namespace_name))
        })
        .filter(|row| {
            params.categories.is_empty()
                || row
                    .category_slug
                    .as_deref()
                    .is_some_and(|slug| params.categories.iter().any(|c| c.as_str() == slug))
        })
        .filter(|row| tokens.is_empty() || provider_row_matches(row, &tokens))
        .map(|row| {
            let score = tokens.iter().map(|t| score_provider_token(&row, t)).sum();
            (score, row)
        })
        .collect();

    matched.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| a.provider.name.cmp(&b.provider.name))
            .then_with(|| a.namespace_name.cmp(&b.namespace_name))
    });

    let offset = params.offset.unwrap_or(0) as usize;
    let limit = params.limit.unwrap_or(10).min(50) as usize;

    Ok(matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(_, row)| row)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(namespace: &str, module: &str, provider: &str, description: &str) -> ModuleSearchRow {
        ModuleSearchRow {
            module_provider: module_provider::Model {
                id: 1,
                namespace_id: 1,
                module: module.to_string(),
                provider: provider.to_string(),
                repo_clone_url: None,
                repo_base_url: None,
                repo_browse_url: None,
                git_tag_format: "{version}".to_string(),
                git_path: None,
                git_provider_id: None,
                verified: false,
                latest_version_id: Some(1),
                created_at: chrono::Utc::now(),
            },
            namespace_name: namespace.to_string(),
            latest_version: "1.0.0".to_string(),
            description: Some(description.to_string()),
            owner: None,
            verified: false,
            trusted: false,
        }
    }

    #[test]
    fn module_exact_match_outranks_description_like() {
        let exact = row("acme", "vpc", "aws", "Amazon VPC");
        let partial = row("acme", "network", "aws", "vpc helpers");
        let tokens = tokenize("vpc");

        assert_eq!(score_row(&exact, &tokens), 20);
        assert_eq!(score_row(&partial, &tokens), 4);
    }

    #[test]
    fn highest_rule_wins_per_token() {
        // Token matches namespace exactly and module partially; 18 wins over 5.
        let r = row("vpc", "vpc-peering", "aws", "");
        assert_eq!(score_row(&r, &tokenize("vpc")), 18);
    }

    #[test]
    fn multi_token_scores_sum() {
        let r = row("acme", "network", "aws", "vpc helpers");
        // "network" module-exact (20) + "vpc" description-LIKE (4)
        assert_eq!(score_row(&r, &tokenize("network vpc")), 24);
    }

    #[test]
    fn row_filter_ignores_provider_field() {
        // Token matches only the provider; the row filter excludes it.
        let r = row("acme", "network", "aws", "helpers");
        assert!(!row_matches(&r, &tokenize("aws")));
        assert!(row_matches(&r, &tokenize("network")));
    }

    #[test]
    fn trusted_and_contributed_or_combine() {
        let mut trusted_row = row("acme", "network", "aws", "");
        trusted_row.trusted = true;
        let contributed_row = row("other", "network", "aws", "");

        let both = ModuleSearchParams {
            trusted: Some(true),
            contributed: Some(true),
            ..ModuleSearchParams::default()
        };
        assert!(passes_filters(&trusted_row, &both));
        assert!(passes_filters(&contributed_row, &both));

        let trusted_only = ModuleSearchParams {
            trusted: Some(true),
            ..ModuleSearchParams::default()
        };
        assert!(passes_filters(&trusted_row, &trusted_only));
        assert!(!passes_filters(&contributed_row, &trusted_only));
    }
}
