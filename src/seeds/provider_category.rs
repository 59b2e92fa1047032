//! Provider category seeding.
//!
//! Idempotent: categories are looked up by slug and only created when
//! missing, so startup seeding is safe to run on every boot.

use anyhow::Result;
use sea_orm::DatabaseConnection;

use crate::repositories::ProviderRepository;

struct CategorySeed {
    name: &'static str,
    slug: &'static str,
    user_selectable: bool,
}

const CATEGORIES: &[CategorySeed] = &[
    CategorySeed {
        name: "Cloud",
        slug: "cloud",
        user_selectable: true,
    },
    CategorySeed {
        name: "Infrastructure",
        slug: "infrastructure",
        user_selectable: true,
    },
    CategorySeed {
        name: "Networking",
        slug: "networking",
        user_selectable: true,
    },
    CategorySeed {
        name: "Databases",
        slug: "databases",
        user_selectable: true,
    },
    CategorySeed {
        name: "Monitoring & Logging",
        slug: "monitoring-logging",
        user_selectable: true,
    },
    CategorySeed {
        name: "Security & Authentication",
        slug: "security-authentication",
        user_selectable: true,
    },
    CategorySeed {
        name: "Utility",
        slug: "utility",
        user_selectable: true,
    },
    CategorySeed {
        name: "Uncategorized",
        slug: "uncategorized",
        user_selectable: false,
    },
];

/// Seed the provider categories table with the built-in list.
pub async fn seed_provider_categories(db: &DatabaseConnection) -> Result<()> {
    let mut created = 0;
    for seed in CATEGORIES {
        if ProviderRepository::get_category_by_slug(db, seed.slug)
            .await?
            .is_none()
        {
            ProviderRepository::create_category(db, seed.name, seed.slug, seed.user_selectable)
                .await?;
            created += 1;
        }
    }
    if created > 0 {
        tracing::info!(created, "seeded provider categories");
    }
    Ok(())
}
