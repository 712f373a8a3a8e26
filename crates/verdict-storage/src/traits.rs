//! Storage traits for the policy persistence abstraction layer.
//!
//! This module defines the contract every storage backend must implement.
//! Backends are thread-safe (`Send + Sync`) trait objects; the service layer
//! only ever sees [`DynPolicyStorage`](crate::DynPolicyStorage).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use verdict_core::{Policy, PolicyAutoImport, PolicyRef, Result, Subscriber};

/// Observer of policy change events.
///
/// Backends call every registered observer when a policy's source or data
/// changes, whether through this process (save, lock) or through an external
/// change feed. The compiled-policy cache and the webhook change notifier
/// both implement this trait.
#[async_trait]
pub trait PolicyChangeObserver: Send + Sync {
    /// Called after the policy addressed by the coordinates changed.
    async fn policy_data_change(&self, repository: &str, group: &str, name: &str, version: &str);
}

/// The storage contract consumed by the policy and bundle services.
///
/// # Errors
///
/// Methods return kinded errors: a missing entity is `NotFound`, a duplicate
/// insert is `Exist`, anything else is backend-specific and treated as
/// generic by callers.
#[async_trait]
pub trait PolicyStorage: Send + Sync {
    // ==================== Policies ====================

    /// Fetches a single policy by coordinates.
    async fn policy(&self, policy_ref: &PolicyRef) -> Result<Policy>;

    /// Creates or replaces a policy and notifies change observers.
    async fn save_policy(&self, policy: &Policy) -> Result<()>;

    /// Sets the lock flag of a policy and notifies change observers.
    async fn set_policy_lock(&self, policy_ref: &PolicyRef, lock: bool) -> Result<()>;

    /// Lists policies, optionally filtered by lock state and name substring.
    async fn get_policies(
        &self,
        locked: Option<bool>,
        name_filter: Option<&str>,
    ) -> Result<Vec<Policy>>;

    // ==================== Change propagation ====================

    /// Registers observers to be notified on policy changes.
    fn add_policy_subscribers(&self, observers: Vec<Arc<dyn PolicyChangeObserver>>);

    /// Runs the backend's external change feed until `shutdown` flips to true.
    ///
    /// Backends without an external feed (the in-memory one) notify observers
    /// directly from the mutating calls and simply wait here for shutdown.
    async fn listen_policy_data_changes(&self, shutdown: watch::Receiver<bool>) -> Result<()>;

    // ==================== Webhook subscribers ====================

    /// Fetches the subscriber matching the full uniqueness tuple
    /// `(coordinates, webhook, name)`, or `NotFound`.
    async fn subscriber(
        &self,
        policy_ref: &PolicyRef,
        webhook_url: &str,
        name: &str,
    ) -> Result<Subscriber>;

    /// Persists a new subscriber and returns it with timestamps set.
    async fn create_subscriber(&self, subscriber: &Subscriber) -> Result<Subscriber>;

    /// Lists all subscribers watching the given policy.
    async fn subscribers_for_policy(&self, policy_ref: &PolicyRef) -> Result<Vec<Subscriber>>;

    // ==================== Generic key-value data ====================

    /// Fetches a data document by key.
    async fn get_data(&self, key: &str) -> Result<Value>;

    /// Stores a data document under a key.
    async fn set_data(&self, key: &str, data: Value) -> Result<()>;

    /// Removes a data document.
    async fn delete_data(&self, key: &str) -> Result<()>;

    // ==================== Auto-import configuration ====================

    /// Creates or replaces the auto-import configuration for a bundle URL.
    async fn save_auto_import_config(&self, config: &PolicyAutoImport) -> Result<()>;

    /// Fetches the auto-import configuration for a bundle URL.
    async fn auto_import_config(&self, policy_url: &str) -> Result<PolicyAutoImport>;

    /// Lists every auto-import configuration.
    async fn auto_import_configs(&self) -> Result<Vec<PolicyAutoImport>>;

    /// Removes the auto-import configuration for a bundle URL.
    async fn delete_auto_import_config(&self, policy_url: &str) -> Result<()>;

    /// Lists configurations whose `next_import` is due (`<= now`).
    async fn active_import_configs(&self) -> Result<Vec<PolicyAutoImport>>;

    // ==================== Lifecycle ====================

    /// Releases backend resources. Called once during teardown.
    async fn close(&self);
}

// Compile-time checks that the traits stay object-safe.
#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_storage_object_safe(_: &dyn PolicyStorage) {}
    fn _assert_observer_object_safe(_: &dyn PolicyChangeObserver) {}
}
