//! Policy bundle ZIP codec.
//!
//! Two archive layers. The inner bundle (`policy_bundle.zip`) packages one
//! policy: its Rego source under the stored filename, `data.json`,
//! `data-config.json`, and `metadata.json` carrying the coordinates and the
//! absolute URL of the verification public key. The outer archive wraps the
//! inner bundle together with `signature.raw`, the detached signature over
//! the inner bundle's SHA-256 digest.
//!
//! Entries are written uncompressed and in a fixed order, so identical
//! policies produce byte-identical bundles.

use std::io::{Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use verdict_core::{Error, ExportConfig, Kind, Policy};

/// Name of the inner bundle entry in a signed archive.
pub const BUNDLE_FILENAME: &str = "policy_bundle.zip";
/// Name of the detached-signature entry in a signed archive.
pub const BUNDLE_SIGNATURE_FILENAME: &str = "signature.raw";

/// Name of the static-data entry in the inner bundle.
pub const DATA_FILENAME: &str = "data.json";
/// Name of the data-config entry in the inner bundle.
pub const DATA_CONFIG_FILENAME: &str = "data-config.json";
/// Name of the metadata entry in the inner bundle.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Filename for the policy source when the policy stores no hint.
const DEFAULT_SOURCE_FILENAME: &str = "policy.rego";

/// A single named entry of a ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFile {
    /// Entry name within the archive.
    pub name: String,
    /// Raw entry content.
    pub content: Vec<u8>,
}

/// Metadata document embedded in every inner bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Repository of the bundled policy.
    pub repository: String,
    /// Group of the bundled policy.
    pub group: String,
    /// Name of the bundled policy.
    pub name: String,
    /// Version of the bundled policy.
    pub version: String,
    /// Absolute URL of the public key verifying the bundle signature.
    pub verification_key_url: String,
    /// Export configuration of the bundled policy, carried so that an
    /// import restores the policy's signing coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_config: Option<ExportConfig>,
}

/// Writes entries into a ZIP archive, preserving order.
///
/// # Errors
///
/// Returns `Internal` when the archive cannot be written.
pub fn create_zip_archive(files: &[ZipFile]) -> Result<Vec<u8>, Error> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for file in files {
        writer
            .start_file(&file.name, options)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error creating zip archive", e))?;
        writer
            .write_all(&file.content)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error creating zip archive", e))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::wrap_with(Kind::Internal, "error creating zip archive", e))?;
    Ok(cursor.into_inner())
}

/// Reads all entries of a ZIP archive in archive order.
///
/// # Errors
///
/// Returns `BadRequest` when the bytes are not a readable ZIP archive.
pub fn unzip(archive: &[u8]) -> Result<Vec<ZipFile>, Error> {
    let mut reader = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::wrap_with(Kind::BadRequest, "failed to unzip bundle", e))?;

    let mut files = Vec::with_capacity(reader.len());
    for i in 0..reader.len() {
        let mut entry = reader
            .by_index(i)
            .map_err(|e| Error::wrap_with(Kind::BadRequest, "failed to unzip bundle", e))?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::wrap_with(Kind::BadRequest, "failed to unzip bundle", e))?;
        files.push(ZipFile {
            name: entry.name().to_string(),
            content,
        });
    }
    Ok(files)
}

/// Builds the inner policy bundle.
///
/// # Errors
///
/// Returns `Internal` when the archive cannot be written.
pub fn create_policy_bundle(
    policy: &Policy,
    verification_key_url: &str,
) -> Result<Vec<u8>, Error> {
    let metadata = BundleMetadata {
        repository: policy.repository.clone(),
        group: policy.group.clone(),
        name: policy.name.clone(),
        version: policy.version.clone(),
        verification_key_url: verification_key_url.to_string(),
        export_config: policy.signing_config().ok(),
    };
    let metadata_json = serde_json::to_vec(&metadata)
        .map_err(|e| Error::wrap_with(Kind::Internal, "error encoding bundle metadata", e))?;

    let source_filename = if policy.filename.is_empty() {
        DEFAULT_SOURCE_FILENAME
    } else {
        &policy.filename
    };

    let files = [
        ZipFile {
            name: source_filename.to_string(),
            content: policy.rego.clone().into_bytes(),
        },
        ZipFile {
            name: DATA_FILENAME.to_string(),
            content: policy.data.clone().unwrap_or_default().into_bytes(),
        },
        ZipFile {
            name: DATA_CONFIG_FILENAME.to_string(),
            content: policy.data_config.clone().unwrap_or_default().into_bytes(),
        },
        ZipFile {
            name: METADATA_FILENAME.to_string(),
            content: metadata_json,
        },
    ];

    create_zip_archive(&files)
}

/// Wraps an inner bundle and its detached signature into the outer archive.
///
/// The archive holds exactly [`BUNDLE_FILENAME`] followed by
/// [`BUNDLE_SIGNATURE_FILENAME`].
///
/// # Errors
///
/// Returns `Internal` when the archive cannot be written.
pub fn create_signed_archive(bundle: &[u8], signature: &[u8]) -> Result<Vec<u8>, Error> {
    create_zip_archive(&[
        ZipFile {
            name: BUNDLE_FILENAME.to_string(),
            content: bundle.to_vec(),
        },
        ZipFile {
            name: BUNDLE_SIGNATURE_FILENAME.to_string(),
            content: signature.to_vec(),
        },
    ])
}

/// Reads the metadata document out of an inner bundle.
///
/// # Errors
///
/// Returns `BadRequest` when the bundle is unreadable or the metadata entry
/// is missing or invalid.
pub fn bundle_metadata(bundle: &[u8]) -> Result<BundleMetadata, Error> {
    let files = unzip(bundle)?;
    let entry = files
        .iter()
        .find(|f| f.name == METADATA_FILENAME)
        .ok_or_else(|| Error::bad_request("bundle has no metadata.json"))?;

    serde_json::from_slice(&entry.content)
        .map_err(|e| Error::wrap_with(Kind::BadRequest, "invalid bundle metadata", e))
}

/// Reconstructs a policy from an inner bundle.
///
/// The source entry is the one entry that is none of `data.json`,
/// `data-config.json`, or `metadata.json`; its name becomes the policy's
/// filename hint. Empty data entries map back to absent fields. The policy
/// is imported unlocked with a fresh `last_update`.
///
/// # Errors
///
/// Returns `BadRequest` when the bundle is unreadable, has no metadata, or
/// has no source entry.
pub fn policy_from_bundle(bundle: &[u8]) -> Result<Policy, Error> {
    let files = unzip(bundle)?;
    let metadata = bundle_metadata(bundle)?;

    let mut rego: Option<(String, String)> = None;
    let mut data = None;
    let mut data_config = None;

    for file in files {
        match file.name.as_str() {
            METADATA_FILENAME => {}
            DATA_FILENAME => {
                data = content_to_string(&file, "data.json")?;
            }
            DATA_CONFIG_FILENAME => {
                data_config = content_to_string(&file, "data-config.json")?;
            }
            _ => {
                let source = String::from_utf8(file.content).map_err(|e| {
                    Error::wrap_with(Kind::BadRequest, "policy source is not valid UTF-8", e)
                })?;
                rego = Some((file.name, source));
            }
        }
    }

    let (filename, rego) =
        rego.ok_or_else(|| Error::bad_request("bundle has no policy source entry"))?;

    let export_config = match metadata.export_config {
        Some(cfg) => Some(serde_json::to_string(&cfg).map_err(|e| {
            Error::wrap_with(Kind::BadRequest, "invalid bundle export configuration", e)
        })?),
        None => None,
    };

    Ok(Policy {
        repository: metadata.repository,
        group: metadata.group,
        name: metadata.name,
        version: metadata.version,
        rego,
        filename,
        data,
        data_config,
        output_schema: None,
        export_config,
        locked: false,
        last_update: OffsetDateTime::now_utc(),
    })
}

fn content_to_string(file: &ZipFile, what: &str) -> Result<Option<String>, Error> {
    if file.content.is_empty() {
        return Ok(None);
    }
    String::from_utf8(file.content.clone())
        .map(Some)
        .map_err(|e| Error::wrap_with(Kind::BadRequest, format!("{what} is not valid UTF-8"), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> Policy {
        Policy {
            repository: "myrepo".into(),
            group: "mygroup".into(),
            name: "myname".into(),
            version: "1.52".into(),
            rego: "package mygroup.myname\n\nallow = true".into(),
            filename: "myname.rego".into(),
            data: Some(r#"{"hello":"world"}"#.into()),
            data_config: None,
            output_schema: None,
            export_config: Some(r#"{"namespace":"transit","key":"key1"}"#.into()),
            locked: false,
            last_update: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_zip_roundtrip_preserves_order() {
        let files = [
            ZipFile {
                name: "b.txt".into(),
                content: b"second".to_vec(),
            },
            ZipFile {
                name: "a.txt".into(),
                content: b"first".to_vec(),
            },
        ];

        let archive = create_zip_archive(&files).unwrap();
        let parsed = unzip(&archive).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "b.txt");
        assert_eq!(parsed[1].name, "a.txt");
        assert_eq!(parsed[1].content, b"first");
    }

    #[test]
    fn test_unzip_garbage_is_bad_request() {
        let err = unzip(b"definitely not a zip").unwrap_err();
        assert_eq!(err.kind(), Kind::BadRequest);
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let policy = sample_policy();
        let key_url = "https://policies.example.com/policy/myrepo/mygroup/myname/1.52/key";

        let first = create_policy_bundle(&policy, key_url).unwrap();
        let second = create_policy_bundle(&policy, key_url).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_bundle_contains_expected_entries() {
        let policy = sample_policy();
        let bundle = create_policy_bundle(
            &policy,
            "https://policies.example.com/policy/myrepo/mygroup/myname/1.52/key",
        )
        .unwrap();

        let entries = unzip(&bundle).unwrap();
        let names: Vec<&str> = entries.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["myname.rego", DATA_FILENAME, DATA_CONFIG_FILENAME, METADATA_FILENAME]
        );
    }

    #[test]
    fn test_metadata_roundtrip() {
        let policy = sample_policy();
        let key_url = "https://policies.example.com/policy/myrepo/mygroup/myname/1.52/key";
        let bundle = create_policy_bundle(&policy, key_url).unwrap();

        let metadata = bundle_metadata(&bundle).unwrap();
        assert_eq!(metadata.repository, "myrepo");
        assert_eq!(metadata.group, "mygroup");
        assert_eq!(metadata.name, "myname");
        assert_eq!(metadata.version, "1.52");
        assert_eq!(metadata.verification_key_url, key_url);
    }

    #[test]
    fn test_policy_from_bundle_restores_fields() {
        let policy = sample_policy();
        let bundle = create_policy_bundle(
            &policy,
            "https://policies.example.com/policy/myrepo/mygroup/myname/1.52/key",
        )
        .unwrap();

        let imported = policy_from_bundle(&bundle).unwrap();
        assert_eq!(imported.repository, policy.repository);
        assert_eq!(imported.group, policy.group);
        assert_eq!(imported.name, policy.name);
        assert_eq!(imported.version, policy.version);
        assert_eq!(imported.rego, policy.rego);
        assert_eq!(imported.filename, policy.filename);
        assert_eq!(imported.data, policy.data);
        // data-config was absent and stays absent after the round trip
        assert_eq!(imported.data_config, None);
        assert_eq!(
            imported.signing_config().unwrap(),
            policy.signing_config().unwrap()
        );
        assert!(!imported.locked);
    }

    #[test]
    fn test_signed_archive_layout() {
        let outer = create_signed_archive(b"inner-bytes", b"signature").unwrap();

        let entries = unzip(&outer).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, BUNDLE_FILENAME);
        assert_eq!(entries[0].content, b"inner-bytes");
        assert_eq!(entries[1].name, BUNDLE_SIGNATURE_FILENAME);
        assert_eq!(entries[1].content, b"signature");
    }
}
