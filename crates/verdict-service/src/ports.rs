//! Ports consumed by the policy service besides storage.
//!
//! The result cache and the signer are external collaborators; only their
//! contracts live here. Implementations are wired in by the binary (or by
//! tests, which stub them).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use verdict_core::Result;

/// Cache for evaluation results, keyed by evaluation ID.
///
/// A `ServiceUnavailable` error is recoverable: evaluation succeeds without
/// caching. Any other error fails the evaluation.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Stores a JSON-encoded evaluation result.
    ///
    /// `ttl` is in seconds; `None` leaves expiry to the backend default.
    async fn set(
        &self,
        key: &str,
        namespace: &str,
        scope: &str,
        value: &[u8],
        ttl: Option<u64>,
    ) -> Result<()>;
}

/// Detached signing of bundle digests and lookup of verification keys.
///
/// Keys are addressed by `(namespace, key)` taken from a policy's export
/// configuration. The signature format is whatever the signer produces; the
/// reference configuration emits compact JWS over the digest.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Returns the public verification key as a JSON value (JWK convention).
    async fn key(&self, namespace: &str, key: &str) -> Result<Value>;

    /// Signs `data` (a bundle digest) with the addressed key.
    async fn sign(&self, namespace: &str, key: &str, data: &[u8]) -> Result<Vec<u8>>;
}

/// Type alias for a shared result-cache trait object.
pub type DynResultCache = Arc<dyn ResultCache>;

/// Type alias for a shared signer trait object.
pub type DynSigner = Arc<dyn Signer>;
