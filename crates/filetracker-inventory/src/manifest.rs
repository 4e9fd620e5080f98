//! Inventory manifest model. The manifest enumerates one or more
//! data files together with per-file MD5 checksums so a corrupted file
//! can be skipped without failing the whole job.

use serde::Deserialize;

use filetracker_core::error::TrackerError;

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryManifest {
    #[serde(rename = "sourceBucket")]
    pub source_bucket: String,
    #[serde(rename = "destinationBucket")]
    pub destination_bucket: String,
    #[serde(rename = "fileSchema")]
    pub file_schema: Vec<String>,
    pub files: Vec<InventoryFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryFile {
    pub key: String,
    pub size: i64,
    #[serde(rename = "MD5checksum")]
    pub md5_checksum: String,
}

/// The container format a data file is encoded in, inferred from its key
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    GzipCsv,
    Orc,
    Parquet,
}

impl ContainerFormat {
    pub fn detect(key: &str) -> Option<Self> {
        if key.ends_with(".csv.gz") {
            Some(Self::GzipCsv)
        } else if key.ends_with(".orc") {
            Some(Self::Orc)
        } else if key.ends_with(".parquet") {
            Some(Self::Parquet)
        } else {
            None
        }
    }
}

pub fn parse_manifest(raw: &[u8]) -> Result<InventoryManifest, TrackerError> {
    serde_json::from_slice(raw).map_err(|e| TrackerError::InvalidManifest(e.to_string()))
}

/// Verify a downloaded data file against its manifest-declared MD5
/// checksum. A single corrupt file is skipped rather than failing the
/// whole job.
pub fn verify_md5(contents: &[u8], expected_hex: &str) -> bool {
    let digest = md5::compute(contents);
    format!("{digest:x}").eq_ignore_ascii_case(expected_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_manifest() {
        let raw = br#"{
            "sourceBucket": "my-bucket",
            "destinationBucket": "inventory-bucket",
            "fileSchema": ["Bucket", "Key", "Size"],
            "files": [{"key": "data/f1.csv.gz", "size": 123, "MD5checksum": "abc123"}]
        }"#;
        let manifest = parse_manifest(raw).unwrap();
        assert_eq!(manifest.source_bucket, "my-bucket");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].md5_checksum, "abc123");
    }

    #[test]
    fn malformed_manifest_is_an_invalid_manifest_error() {
        let raw = b"not json";
        assert!(matches!(parse_manifest(raw), Err(TrackerError::InvalidManifest(_))));
    }

    #[test]
    fn md5_verification_detects_corruption() {
        let contents = b"hello world";
        let digest = format!("{:x}", md5::compute(contents));
        assert!(verify_md5(contents, &digest));
        assert!(!verify_md5(b"corrupted", &digest));
    }

    #[test]
    fn container_format_is_detected_from_the_key_extension() {
        assert_eq!(ContainerFormat::detect("data/f1.csv.gz"), Some(ContainerFormat::GzipCsv));
        assert_eq!(ContainerFormat::detect("data/f1.orc"), Some(ContainerFormat::Orc));
        assert_eq!(ContainerFormat::detect("data/f1.parquet"), Some(ContainerFormat::Parquet));
        assert_eq!(ContainerFormat::detect("data/f1.txt"), None);
    }
}
