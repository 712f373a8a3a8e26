//! In-memory policy storage backend.
//!
//! Backed by `dashmap` for concurrent access without a global lock. Policy
//! mutations notify registered change observers directly, which stands in
//! for the change feed a persistent backend would watch.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::sync::watch;

use verdict_core::{Error, Policy, PolicyAutoImport, PolicyRef, Result, Subscriber};
use verdict_storage::PolicyChangeObserver;

/// In-memory storage for policies, subscribers, generic data documents, and
/// auto-import configurations.
#[derive(Default)]
pub struct InMemoryStorage {
    pub(crate) policies: DashMap<String, Policy>,
    pub(crate) data: DashMap<String, Value>,
    pub(crate) import_configs: DashMap<String, PolicyAutoImport>,
    pub(crate) subscribers: RwLock<Vec<Subscriber>>,
    pub(crate) observers: std::sync::RwLock<Vec<Arc<dyn PolicyChangeObserver>>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage wrapped in an `Arc` for sharing.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seeds the storage with a policy, bypassing change notification.
    pub fn seed_policy(&self, policy: Policy) {
        self.policies
            .insert(policy.reference().fingerprint(), policy);
    }

    /// Number of stored policies.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    pub(crate) async fn notify_change(&self, policy_ref: &PolicyRef) {
        let observers: Vec<Arc<dyn PolicyChangeObserver>> = {
            let guard = self.observers.read().expect("observer lock poisoned");
            guard.clone()
        };
        for observer in observers {
            observer
                .policy_data_change(
                    &policy_ref.repository,
                    &policy_ref.group,
                    &policy_ref.name,
                    &policy_ref.version,
                )
                .await;
        }
    }
}

#[async_trait::async_trait]
impl verdict_storage::PolicyStorage for InMemoryStorage {
    async fn policy(&self, policy_ref: &PolicyRef) -> Result<Policy> {
        self.policies
            .get(&policy_ref.fingerprint())
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::not_found(format!("policy not found: {policy_ref}")))
    }

    async fn save_policy(&self, policy: &Policy) -> Result<()> {
        let policy_ref = policy.reference();
        self.policies
            .insert(policy_ref.fingerprint(), policy.clone());
        self.notify_change(&policy_ref).await;
        Ok(())
    }

    async fn set_policy_lock(&self, policy_ref: &PolicyRef, lock: bool) -> Result<()> {
        {
            let mut entry = self
                .policies
                .get_mut(&policy_ref.fingerprint())
                .ok_or_else(|| Error::not_found(format!("policy not found: {policy_ref}")))?;
            entry.locked = lock;
            entry.last_update = OffsetDateTime::now_utc();
        }
        self.notify_change(policy_ref).await;
        Ok(())
    }

    async fn get_policies(
        &self,
        locked: Option<bool>,
        name_filter: Option<&str>,
    ) -> Result<Vec<Policy>> {
        let policies = self
            .policies
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|p| locked.is_none_or(|l| p.locked == l))
            .filter(|p| name_filter.is_none_or(|f| p.name.contains(f)))
            .collect();
        Ok(policies)
    }

    fn add_policy_subscribers(&self, observers: Vec<Arc<dyn PolicyChangeObserver>>) {
        let mut guard = self.observers.write().expect("observer lock poisoned");
        guard.extend(observers);
    }

    async fn listen_policy_data_changes(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // No external change feed to watch; mutations notify observers
        // directly. Park until shutdown.
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            if shutdown.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    async fn subscriber(
        &self,
        policy_ref: &PolicyRef,
        webhook_url: &str,
        name: &str,
    ) -> Result<Subscriber> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .find(|s| {
                s.policy_ref() == *policy_ref && s.webhook_url == webhook_url && s.name == name
            })
            .cloned()
            .ok_or_else(|| Error::not_found("subscriber not found"))
    }

    async fn create_subscriber(&self, subscriber: &Subscriber) -> Result<Subscriber> {
        let mut subscribers = self.subscribers.write().await;
        let duplicate = subscribers.iter().any(|s| {
            s.policy_ref() == subscriber.policy_ref()
                && s.webhook_url == subscriber.webhook_url
                && s.name == subscriber.name
        });
        if duplicate {
            return Err(Error::exist("subscriber already exist"));
        }

        let now = OffsetDateTime::now_utc();
        let mut created = subscriber.clone();
        created.created_at = now;
        created.updated_at = now;
        subscribers.push(created.clone());
        Ok(created)
    }

    async fn subscribers_for_policy(&self, policy_ref: &PolicyRef) -> Result<Vec<Subscriber>> {
        let subscribers = self.subscribers.read().await;
        Ok(subscribers
            .iter()
            .filter(|s| s.policy_ref() == *policy_ref)
            .cloned()
            .collect())
    }

    async fn get_data(&self, key: &str) -> Result<Value> {
        self.data
            .get(key)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::not_found(format!("data not found: {key}")))
    }

    async fn set_data(&self, key: &str, data: Value) -> Result<()> {
        self.data.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_data(&self, key: &str) -> Result<()> {
        self.data
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("data not found: {key}")))
    }

    async fn save_auto_import_config(&self, config: &PolicyAutoImport) -> Result<()> {
        self.import_configs
            .insert(config.policy_url.clone(), config.clone());
        Ok(())
    }

    async fn auto_import_config(&self, policy_url: &str) -> Result<PolicyAutoImport> {
        self.import_configs
            .get(policy_url)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::not_found(format!("auto import config not found: {policy_url}")))
    }

    async fn auto_import_configs(&self) -> Result<Vec<PolicyAutoImport>> {
        Ok(self
            .import_configs
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_auto_import_config(&self, policy_url: &str) -> Result<()> {
        self.import_configs
            .remove(policy_url)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("auto import config not found: {policy_url}")))
    }

    async fn active_import_configs(&self) -> Result<Vec<PolicyAutoImport>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .import_configs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|c| c.next_import <= now)
            .collect())
    }

    async fn close(&self) {}
}
