//! Background auto-import of external policy bundles.
//!
//! A single task polls storage for due import configurations, fetches each
//! bundle URL, and feeds the bytes through the import path. Ticks are
//! serialized: a slow tick delays the next one, it does not stack. The task
//! runs until its shutdown channel flips.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use verdict_core::{Error, Kind, PolicyAutoImport, Result};
use verdict_storage::DynPolicyStorage;

use crate::service::PolicyService;

/// The auto-import scheduler.
pub struct AutoImporter {
    storage: DynPolicyStorage,
    service: Arc<PolicyService>,
    http_client: reqwest::Client,
    poll_interval: Duration,
}

impl AutoImporter {
    /// Creates a scheduler over the service's storage and import path.
    pub fn new(
        storage: DynPolicyStorage,
        service: Arc<PolicyService>,
        http_client: reqwest::Client,
        poll_interval: Duration,
    ) -> Self {
        Self {
            storage,
            service,
            http_client,
            poll_interval,
        }
    }

    /// Starts the scheduler in a background task.
    ///
    /// Returns a shutdown sender; sending `true` terminates the task
    /// promptly. The caller owns the sender and invokes it during teardown.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            info!(
                poll_interval_secs = self.poll_interval.as_secs(),
                "policy auto importer started"
            );

            let mut ticker = interval(self.poll_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!(error = %e, "error running scheduled policy imports");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("policy auto importer shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Runs one tick: imports every due configuration.
    ///
    /// A failing import is logged and retried on the next tick; it never
    /// aborts the loop or the remaining configurations.
    ///
    /// # Errors
    ///
    /// Only when the due configurations cannot be listed at all.
    pub async fn run_once(&self) -> Result<()> {
        let configs = self
            .storage
            .active_import_configs()
            .await
            .map_err(|e| Error::wrap("error getting active import configurations", &e))?;

        for config in configs {
            match self.import_one(&config).await {
                Ok(()) => {
                    info!(policy_url = %config.policy_url, "imported policy bundle");
                }
                Err(e) => {
                    error!(policy_url = %config.policy_url, error = %e, "policy auto import failed");
                }
            }
        }

        Ok(())
    }

    async fn import_one(&self, config: &PolicyAutoImport) -> Result<()> {
        let response = self
            .http_client
            .get(&config.policy_url)
            .send()
            .await
            .map_err(|e| Error::wrap_with(Kind::Internal, "error fetching policy bundle", e))?;

        if !response.status().is_success() {
            return Err(Error::internal(format!(
                "error fetching policy bundle: unexpected status {}",
                response.status()
            )));
        }

        let archive = response
            .bytes()
            .await
            .map_err(|e| Error::wrap_with(Kind::Internal, "error reading policy bundle", e))?;

        self.service.import_bundle(&archive).await?;

        let mut updated = config.clone();
        updated.next_import = OffsetDateTime::now_utc() + config.interval;
        self.storage
            .save_auto_import_config(&updated)
            .await
            .map_err(|e| Error::wrap("error rescheduling auto import", &e))
    }
}
