//! In-memory result cache.
//!
//! Development default for the result-cache port. Deployments back this
//! port with the shared cache service; this implementation keeps results in
//! process and honors TTLs on read.

use dashmap::DashMap;
use time::OffsetDateTime;

use verdict_core::Result;
use verdict_service::ResultCache;

#[derive(Default)]
pub struct InMemoryResultCache {
    entries: DashMap<String, CachedResult>,
}

struct CachedResult {
    value: Vec<u8>,
    expires_at: Option<OffsetDateTime>,
}

impl InMemoryResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for a key, dropping it when expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.expires_at {
                Some(expires_at) => expires_at <= OffsetDateTime::now_utc(),
                None => false,
            },
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Number of cached results, including not-yet-collected expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ResultCache for InMemoryResultCache {
    async fn set(
        &self,
        key: &str,
        namespace: &str,
        scope: &str,
        value: &[u8],
        ttl: Option<u64>,
    ) -> Result<()> {
        let expires_at = ttl.map(|secs| OffsetDateTime::now_utc() + std::time::Duration::from_secs(secs));
        self.entries.insert(
            cache_key(key, namespace, scope),
            CachedResult {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }
}

fn cache_key(key: &str, namespace: &str, scope: &str) -> String {
    if namespace.is_empty() && scope.is_empty() {
        return key.to_string();
    }
    format!("{namespace}/{scope}/{key}")
}
