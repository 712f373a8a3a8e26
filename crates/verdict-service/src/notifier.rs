//! Webhook change notifier.
//!
//! On a policy change the notifier looks up all subscribers of the changed
//! coordinates and POSTs the change event to each webhook. Delivery is
//! best-effort and bounded by the HTTP client's timeout; failures are
//! logged, there is no retry queue.

use serde::Serialize;
use tracing::{debug, error, warn};

use verdict_core::{Error, PolicyRef, Result};
use verdict_storage::{DynPolicyStorage, PolicyChangeObserver};

/// The change event delivered to subscriber webhooks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyChangeEvent {
    /// Event discriminator, always `policy_change`.
    pub event: &'static str,
    /// Repository of the changed policy.
    pub repository: String,
    /// Group of the changed policy.
    pub group: String,
    /// Name of the changed policy.
    pub name: String,
    /// Version of the changed policy.
    pub version: String,
}

impl PolicyChangeEvent {
    fn new(policy_ref: &PolicyRef) -> Self {
        Self {
            event: "policy_change",
            repository: policy_ref.repository.clone(),
            group: policy_ref.group.clone(),
            name: policy_ref.name.clone(),
            version: policy_ref.version.clone(),
        }
    }
}

/// Dispatches policy change events to subscriber webhooks.
pub struct ChangeNotifier {
    storage: DynPolicyStorage,
    http_client: reqwest::Client,
}

impl ChangeNotifier {
    /// Creates a notifier over the subscriber store and an HTTP client with
    /// a finite timeout.
    pub fn new(storage: DynPolicyStorage, http_client: reqwest::Client) -> Self {
        Self {
            storage,
            http_client,
        }
    }

    /// Notifies every subscriber of the changed policy.
    ///
    /// # Errors
    ///
    /// Only when the subscriber list cannot be read; individual delivery
    /// failures are logged and swallowed.
    pub async fn notify(&self, policy_ref: &PolicyRef) -> Result<()> {
        let subscribers = self
            .storage
            .subscribers_for_policy(policy_ref)
            .await
            .map_err(|e| Error::wrap("error retrieving policy subscribers", &e))?;

        if subscribers.is_empty() {
            return Ok(());
        }

        let event = PolicyChangeEvent::new(policy_ref);

        for subscriber in subscribers {
            match self
                .http_client
                .post(&subscriber.webhook_url)
                .json(&event)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        policy = %policy_ref,
                        webhook = %subscriber.webhook_url,
                        subscriber = %subscriber.name,
                        "policy change delivered"
                    );
                }
                Ok(response) => {
                    warn!(
                        policy = %policy_ref,
                        webhook = %subscriber.webhook_url,
                        status = %response.status(),
                        "policy change delivery rejected"
                    );
                }
                Err(e) => {
                    warn!(
                        policy = %policy_ref,
                        webhook = %subscriber.webhook_url,
                        error = %e,
                        "policy change delivery failed"
                    );
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl PolicyChangeObserver for ChangeNotifier {
    async fn policy_data_change(&self, repository: &str, group: &str, name: &str, version: &str) {
        let policy_ref = PolicyRef::new(repository, group, name, version);
        if let Err(e) = self.notify(&policy_ref).await {
            error!(policy = %policy_ref, error = %e, "error notifying policy subscribers");
        }
    }
}
