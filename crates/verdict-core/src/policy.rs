//! Policy domain types.
//!
//! A policy is addressed by `(repository, group, name, version)`. The
//! [`PolicyRef`] tuple is the canonical address and produces the fingerprint
//! string used as the compiled-policy cache key. Coordinate components must
//! be non-empty and must not contain commas, which keeps the fingerprint
//! unambiguous.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// The coordinate tuple addressing a single policy version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    /// Repository the policy lives in.
    pub repository: String,
    /// Policy group; first component of the package declaration.
    pub group: String,
    /// Policy name; second component of the package declaration.
    pub name: String,
    /// Policy version string (free-form, e.g. "1.52").
    pub version: String,
}

impl PolicyRef {
    /// Creates a new reference from the four coordinates.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Validates the coordinates: all components non-empty, no commas.
    ///
    /// # Errors
    ///
    /// Returns a `BadRequest` error naming the offending component.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("repository", &self.repository),
            ("group", &self.group),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if value.is_empty() {
                return Err(Error::bad_request(format!("policy {field} is empty")));
            }
            if value.contains(',') {
                return Err(Error::bad_request(format!(
                    "policy {field} must not contain a comma: {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the fingerprint string keying the compiled-policy cache.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "{},{},{},{}",
            self.repository, self.group, self.name, self.version
        )
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.repository, self.group, self.name, self.version
        )
    }
}

/// A stored policy: coordinates plus source, data, and configuration.
///
/// The `rego` source's package declaration must equal `<group>.<name>`;
/// evaluation queries `data.<group>.<name>` and relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Repository the policy lives in.
    pub repository: String,
    /// Policy group.
    pub group: String,
    /// Policy name.
    pub name: String,
    /// Policy version.
    pub version: String,
    /// Rego source text.
    pub rego: String,
    /// Filename hint under which the source is compiled and bundled.
    pub filename: String,
    /// Static JSON data installed as the data document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Data-config descriptor consumed by external data loaders, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_config: Option<String>,
    /// JSON Schema validating evaluation output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
    /// Export configuration enabling signed-bundle export, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_config: Option<String>,
    /// Locked policies cannot be evaluated.
    pub locked: bool,
    /// When the policy was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
}

impl Policy {
    /// Returns the coordinate tuple of this policy.
    #[must_use]
    pub fn reference(&self) -> PolicyRef {
        PolicyRef::new(&self.repository, &self.group, &self.name, &self.version)
    }

    /// Parses the export configuration, if present.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when no export configuration is set (the policy
    /// may not be exported) and `Internal` when the stored JSON is invalid.
    pub fn signing_config(&self) -> Result<ExportConfig> {
        let raw = self
            .export_config
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::forbidden("policy export configuration is not defined"))?;

        serde_json::from_str(raw).map_err(|e| {
            Error::wrap_with(
                crate::error::Kind::Internal,
                "invalid policy export configuration",
                e,
            )
        })
    }
}

/// Signing coordinates for bundle export: a signer namespace and key ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Signer namespace holding the key.
    pub namespace: String,
    /// Key identifier within the namespace.
    pub key: String,
}

/// A webhook subscription for change events of a single policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Subscriber name; part of the uniqueness tuple.
    pub name: String,
    /// Webhook endpoint notified on change.
    pub webhook_url: String,
    /// Coordinates of the watched policy.
    pub policy_repository: String,
    /// Group of the watched policy.
    pub policy_group: String,
    /// Name of the watched policy.
    pub policy_name: String,
    /// Version of the watched policy.
    pub policy_version: String,
    /// When the subscription was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the subscription was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Subscriber {
    /// Returns the coordinates of the watched policy.
    #[must_use]
    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef::new(
            &self.policy_repository,
            &self.policy_group,
            &self.policy_name,
            &self.policy_version,
        )
    }
}

/// Configuration for periodic import of an external policy bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAutoImport {
    /// URL the signed bundle is fetched from.
    pub policy_url: String,
    /// How often the bundle is re-imported.
    pub interval: Duration,
    /// Absolute time of the next scheduled import.
    #[serde(with = "time::serde::rfc3339")]
    pub next_import: OffsetDateTime,
}
