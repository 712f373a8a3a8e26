//! Local signer.
//!
//! Development default for the signer port: a P-256 key generated at
//! startup, signing bundle digests as compact JWS. Deployments back this
//! port with a key-management service holding the `(namespace, key)` pairs
//! that policy export configurations address; the local signer serves every
//! pair with its single key.

use async_trait::async_trait;
use josekit::jwk::Jwk;
use josekit::jwk::alg::ec::EcCurve;
use josekit::jws::{self, ES256, JwsHeader};
use serde_json::Value;

use verdict_core::{Error, Kind, Result};
use verdict_service::Signer;

pub struct LocalSigner {
    private: Jwk,
}

impl LocalSigner {
    /// Generates a fresh signing key.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when key generation fails.
    pub fn generate() -> Result<Self> {
        let mut private = Jwk::generate_ec_key(EcCurve::P256)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error generating signing key", e))?;
        private.set_algorithm("ES256");
        private.set_key_use("sig");
        Ok(Self { private })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn key(&self, _namespace: &str, _key: &str) -> Result<Value> {
        let public = self
            .private
            .to_public_key()
            .map_err(|e| Error::wrap_with(Kind::Internal, "error deriving public key", e))?;
        serde_json::to_value(public)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error encoding public key", e))
    }

    async fn sign(&self, _namespace: &str, _key: &str, data: &[u8]) -> Result<Vec<u8>> {
        let signer = ES256
            .signer_from_jwk(&self.private)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error building signer", e))?;
        let compact = jws::serialize_compact(data, &JwsHeader::new(), &signer)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error signing digest", e))?;
        Ok(compact.into_bytes())
    }
}
