//! Bundle operations: export, public-key lookup, and import.
//!
//! Export packages a policy into the inner bundle, signs its SHA-256 digest
//! through the Signer port, and wraps bundle and signature into the outer
//! archive. Import runs the inverse path and will only save a policy whose
//! signature verifies under the public key discovered through the bundle's
//! own metadata.

use serde_json::Value;
use tracing::{debug, error};

use verdict_bundle::{
    bundle_metadata, create_policy_bundle, create_signed_archive, digest, policy_from_bundle,
    unzip, verify_detached_signature, ZipFile,
};
use verdict_core::{Error, Kind, PolicyRef, Result};

use crate::requests::{ExportBundleResult, ImportSummary};
use crate::service::PolicyService;

impl PolicyService {
    /// Exports a policy as a signed bundle.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown policy, `Forbidden` when the policy has no
    /// export configuration, and signer or packaging failures otherwise.
    pub async fn export_bundle(&self, policy_ref: &PolicyRef) -> Result<ExportBundleResult> {
        let policy = self.storage.policy(policy_ref).await.map_err(|e| {
            error!(policy = %policy_ref, error = %e, "error getting policy from storage");
            e
        })?;

        let export_config = policy.signing_config()?;

        let bundle = create_policy_bundle(&policy, &self.verification_key_url(policy_ref))?;

        // only the sha256 digest of the bundle is signed, not the bundle itself
        let bundle_digest = digest(&bundle);
        let signature = self
            .signer
            .sign(&export_config.namespace, &export_config.key, &bundle_digest)
            .await
            .map_err(|e| Error::wrap("error signing policy bundle", &e))?;

        let archive = create_signed_archive(&bundle, &signature)?;

        let filename = format!(
            "{}_{}_{}_{}.zip",
            policy.repository, policy.group, policy.name, policy.version
        );

        Ok(ExportBundleResult {
            content_type: "application/zip",
            content_length: archive.len(),
            content_disposition: format!("attachment; filename=\"{}\"", filename.trim()),
            archive,
        })
    }

    /// Returns the public key verifying this policy's bundles, in JWK form.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown policy, `Forbidden` when the policy has no
    /// export configuration.
    pub async fn policy_public_key(&self, policy_ref: &PolicyRef) -> Result<Value> {
        let policy = self.storage.policy(policy_ref).await.map_err(|e| {
            error!(policy = %policy_ref, error = %e, "error getting policy from storage");
            e
        })?;

        let export_config = policy.signing_config()?;

        self.signer
            .key(&export_config.namespace, &export_config.key)
            .await
            .map_err(|e| Error::wrap("error getting policy public key", &e))
    }

    /// Imports a signed policy bundle.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an unreadable archive or a wrong member count;
    /// `Forbidden` for any signature verification failure.
    pub async fn import_bundle(&self, archive: &[u8]) -> Result<ImportSummary> {
        let files = unzip(archive)?;

        if files.len() != 2 {
            return Err(Error::bad_request(format!(
                "invalid bundle: expected to contain two files, but has: {}",
                files.len()
            )));
        }

        self.verify_bundle(&files)
            .await
            .map_err(|e| Error::wrap_with(Kind::Forbidden, "failed to verify bundle", e))?;
        debug!("bundle signature is valid");

        let policy = policy_from_bundle(&files[0].content)
            .map_err(|e| Error::wrap("cannot make policy from bundle", &e))?;
        policy.reference().validate()?;

        self.storage
            .save_policy(&policy)
            .await
            .map_err(|e| Error::wrap("error saving imported policy bundle", &e))?;

        Ok(ImportSummary {
            repository: policy.repository,
            group: policy.group,
            name: policy.name,
            version: policy.version,
            locked: policy.locked,
            last_update: policy.last_update.unix_timestamp(),
        })
    }

    /// Verifies the detached signature of a signed archive.
    ///
    /// The verification key is fetched from the URL the inner bundle's own
    /// metadata names, so the verifier must trust that hostname.
    async fn verify_bundle(&self, files: &[ZipFile]) -> Result<()> {
        let metadata = bundle_metadata(&files[0].content)?;

        let key = self
            .fetch_verification_key(&metadata.verification_key_url)
            .await?;

        verify_detached_signature(&key, &files[1].content, &digest(&files[0].content))
    }

    async fn fetch_verification_key(&self, url: &str) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::wrap_with(Kind::Forbidden, "error fetching verification key", e))?;

        if !response.status().is_success() {
            return Err(Error::forbidden(format!(
                "error fetching verification key: unexpected status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::wrap_with(Kind::Forbidden, "invalid verification key document", e))
    }

    /// Absolute URL of this instance's public-key endpoint for a policy.
    pub(crate) fn verification_key_url(&self, policy_ref: &PolicyRef) -> String {
        format!(
            "{}/policy/{}/{}/{}/{}/key",
            self.external_hostname,
            policy_ref.repository,
            policy_ref.group,
            policy_ref.name,
            policy_ref.version
        )
    }
}
