//! # verdict-bundle
//!
//! Signed-bundle codec for the verdict policy decision service: building and
//! parsing the two-layer policy ZIP archives, computing the bundle digest,
//! and verifying detached JWS signatures on import.
//!
//! Signing itself goes through the Signer port in `verdict-service`; this
//! crate only packages bytes and verifies what a remote instance signed.

mod codec;
mod verify;

pub use codec::{
    BUNDLE_FILENAME, BUNDLE_SIGNATURE_FILENAME, BundleMetadata, DATA_CONFIG_FILENAME,
    DATA_FILENAME, METADATA_FILENAME, ZipFile, bundle_metadata, create_policy_bundle,
    create_signed_archive, create_zip_archive, policy_from_bundle, unzip,
};
pub use verify::{digest, verify_detached_signature};
