//! # Maintenance Sweeper
//!
//! Background task that garbage-collects expired sessions, Terraform IdP
//! codes and tokens, and abandoned SSO login states. Ticks are jittered so
//! multiple instances do not sweep in lockstep.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rand::Rng;
use sea_orm::DatabaseConnection;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::repositories::{SessionRepository, SsoStateRepository, TerraformIdpRepository};

/// Background expiry sweeper.
pub struct MaintenanceSweeper {
    config: Arc<AppConfig>,
    db: Arc<DatabaseConnection>,
}

impl MaintenanceSweeper {
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Run the sweep loop until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_seconds = self.config.maintenance_interval_seconds,
            "starting maintenance sweeper"
        );

        loop {
            let interval = self.jittered_interval();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("maintenance sweeper shutting down");
                    return;
                }
                _ = sleep(interval) => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "maintenance sweep failed");
                    }
                }
            }
        }
    }

    /// One sweep over all three expirable tables.
    pub async fn tick(&self) -> Result<(), sea_orm::DbErr> {
        let now = Utc::now();

        let sessions = SessionRepository::delete_expired(&*self.db, now).await?;
        let idp_rows = TerraformIdpRepository::delete_expired(&*self.db, now).await?;
        let sso_states = SsoStateRepository::delete_expired(&*self.db, now).await?;

        counter!("maintenance_sessions_swept").increment(sessions);
        counter!("maintenance_idp_rows_swept").increment(idp_rows);
        counter!("maintenance_sso_states_swept").increment(sso_states);

        if sessions + idp_rows + sso_states > 0 {
            debug!(sessions, idp_rows, sso_states, "maintenance sweep removed rows");
        }

        Ok(())
    }

    /// Base interval plus up to 10% random jitter.
    fn jittered_interval(&self) -> Duration {
        let base = self.config.maintenance_interval_seconds.max(1);
        let jitter_ms = rand::thread_rng().gen_range(0..=base * 100);
        Duration::from_secs(base) + Duration::from_millis(jitter_ms)
    }
}
