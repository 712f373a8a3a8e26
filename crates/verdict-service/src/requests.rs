//! Request and response types of the policy and bundle services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use verdict_core::PolicyRef;

/// Request to evaluate (or validate) a policy against an input document.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    /// Repository of the addressed policy.
    pub repository: String,
    /// Group of the addressed policy.
    pub group: String,
    /// Name of the addressed policy.
    pub policy_name: String,
    /// Version of the addressed policy.
    pub version: String,
    /// Arbitrary JSON input the policy is evaluated against.
    pub input: Value,
    /// Optional TTL (seconds) for the cached evaluation result.
    pub ttl: Option<u64>,
    /// Optional caller-supplied evaluation ID; a fresh UUID otherwise.
    pub evaluation_id: Option<String>,
}

impl EvaluateRequest {
    /// The coordinates of the addressed policy.
    #[must_use]
    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef::new(&self.repository, &self.group, &self.policy_name, &self.version)
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// The normalized evaluation output.
    pub result: Value,
    /// Cache key of the stored result; returned as the `ETag` header.
    pub e_tag: String,
}

/// Filters and field selection for listing policies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoliciesQuery {
    /// Tri-state lock filter: `Some(true)`, `Some(false)`, or unset for all.
    pub locked: Option<bool>,
    /// Substring filter on the policy name.
    pub policy_name: Option<String>,
    /// Include the Rego source in each row.
    #[serde(default)]
    pub rego: bool,
    /// Include the static data in each row.
    #[serde(default)]
    pub data: bool,
    /// Include the data-config in each row.
    #[serde(default)]
    pub data_config: bool,
}

/// One row of a policy listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyListItem {
    /// Repository of the policy.
    pub repository: String,
    /// Group of the policy.
    pub group: String,
    /// Name of the policy.
    pub policy_name: String,
    /// Version of the policy.
    pub version: String,
    /// Whether the policy is locked.
    pub locked: bool,
    /// Last modification as Unix seconds.
    pub last_update: i64,
    /// Rego source, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rego: Option<String>,
    /// Static data, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Data-config, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_config: Option<String>,
}

/// Result of a policy listing.
#[derive(Debug, Clone, Serialize)]
pub struct PoliciesResult {
    /// The matching policies.
    pub policies: Vec<PolicyListItem>,
}

/// Request to subscribe a webhook for change events of one policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Repository of the watched policy.
    pub repository: String,
    /// Group of the watched policy.
    pub group: String,
    /// Name of the watched policy.
    pub policy_name: String,
    /// Version of the watched policy.
    pub version: String,
    /// Webhook endpoint to notify.
    pub webhook_url: String,
    /// Subscriber name; part of the uniqueness tuple.
    pub subscriber: String,
}

impl SubscribeRequest {
    /// The coordinates of the watched policy.
    #[must_use]
    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef::new(&self.repository, &self.group, &self.policy_name, &self.version)
    }
}

/// An exported, signed policy bundle with its download headers.
#[derive(Debug, Clone)]
pub struct ExportBundleResult {
    /// Always `application/zip`.
    pub content_type: &'static str,
    /// Exact byte length of `archive`.
    pub content_length: usize,
    /// `attachment; filename="<repo>_<group>_<name>_<version>.zip"`.
    pub content_disposition: String,
    /// The signed archive bytes.
    pub archive: Vec<u8>,
}

/// Summary of an imported policy bundle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Repository of the imported policy.
    pub repository: String,
    /// Group of the imported policy.
    pub group: String,
    /// Name of the imported policy.
    pub name: String,
    /// Version of the imported policy.
    pub version: String,
    /// Lock state after import (always unlocked).
    pub locked: bool,
    /// Last modification as Unix seconds.
    pub last_update: i64,
}

/// Request to enable periodic import of an external bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoImportRequest {
    /// URL of the signed bundle.
    pub policy_url: String,
    /// Import interval as a duration string, e.g. `"1m"`.
    pub interval: String,
}

/// One auto-import configuration as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoImportEntry {
    /// URL of the signed bundle.
    pub policy_url: String,
    /// Import interval as a duration string.
    pub interval: String,
}
