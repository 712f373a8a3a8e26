//! Detached-signature verification for imported bundles.
//!
//! The signature entry of a signed archive is a compact JWS whose payload is
//! the SHA-256 digest of the inner bundle bytes. Verification parses the
//! public key (JWK), checks the JWS under it, and compares the recovered
//! payload against a freshly computed digest.

use josekit::jwk::Jwk;
use josekit::jws::{self, JwsVerifier};
use sha2::{Digest, Sha256};

use verdict_core::{Error, Kind};

/// Computes the SHA-256 digest of the given bytes.
#[must_use]
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Verifies a detached compact JWS over the expected digest.
///
/// # Errors
///
/// Returns `Forbidden` when the key is unusable, the JWS does not verify, or
/// the signed payload differs from the expected digest.
pub fn verify_detached_signature(
    key: &serde_json::Value,
    signature: &[u8],
    expected_digest: &[u8],
) -> Result<(), Error> {
    let jwk: Jwk = serde_json::from_value(key.clone())
        .map_err(|e| Error::wrap_with(Kind::Forbidden, "invalid verification key", e))?;
    let verifier = verifier_for(&jwk)?;

    let compact = std::str::from_utf8(signature)
        .map_err(|e| Error::wrap_with(Kind::Forbidden, "signature is not a compact jws", e))?;
    let (payload, _header) = jws::deserialize_compact(compact, &*verifier)
        .map_err(|e| Error::wrap_with(Kind::Forbidden, "signature verification failed", e))?;

    if payload != expected_digest {
        return Err(Error::forbidden("signature does not match bundle digest"));
    }
    Ok(())
}

/// Selects a verifier for the key, by its `alg` field when present and by
/// key type otherwise.
fn verifier_for(jwk: &Jwk) -> Result<Box<dyn JwsVerifier>, Error> {
    let make = |e: josekit::JoseError| Error::wrap_with(Kind::Forbidden, "invalid verification key", e);

    if let Some(alg) = jwk.algorithm() {
        return match alg {
            "EdDSA" => Ok(Box::new(jws::EdDSA.verifier_from_jwk(jwk).map_err(make)?)),
            "ES256" => Ok(Box::new(jws::ES256.verifier_from_jwk(jwk).map_err(make)?)),
            "ES384" => Ok(Box::new(jws::ES384.verifier_from_jwk(jwk).map_err(make)?)),
            "RS256" => Ok(Box::new(jws::RS256.verifier_from_jwk(jwk).map_err(make)?)),
            other => Err(Error::forbidden(format!(
                "unsupported signature algorithm: {other}"
            ))),
        };
    }

    match jwk.key_type() {
        "OKP" => Ok(Box::new(jws::EdDSA.verifier_from_jwk(jwk).map_err(make)?)),
        "EC" => match jwk.curve() {
            Some("P-256") => Ok(Box::new(jws::ES256.verifier_from_jwk(jwk).map_err(make)?)),
            Some("P-384") => Ok(Box::new(jws::ES384.verifier_from_jwk(jwk).map_err(make)?)),
            curve => Err(Error::forbidden(format!(
                "unsupported elliptic curve: {curve:?}"
            ))),
        },
        "RSA" => Ok(Box::new(jws::RS256.verifier_from_jwk(jwk).map_err(make)?)),
        other => Err(Error::forbidden(format!("unsupported key type: {other}"))),
    }
}
