//! Provider registry protocol service.
//!
//! SHA256SUMS document handling and the signing pipeline contract: the
//! registry stores only public keys, so detached signatures arrive with the
//! version payload, are verified here against the namespace key, and are
//! served byte-exact afterwards.

use std::collections::BTreeMap;

use sea_orm::{ConnectionTrait, DbErr};
use thiserror::Error;

use crate::gpg::{self, GpgError};
use crate::models::{gpg_key, provider, provider_binary};
use crate::repositories::ProviderRepository;

/// Errors raised while indexing a provider version's release artifacts.
#[derive(Debug, Error)]
pub enum ShasumsError {
    #[error("SHA256SUMS document is malformed at line {line}")]
    Malformed { line: usize },
    #[error("SHA256SUMS is missing an entry for '{filename}'")]
    MissingEntry { filename: String },
    #[error("checksum mismatch for '{filename}'")]
    ChecksumMismatch { filename: String },
    #[error(transparent)]
    Signature(#[from] GpgError),
}

/// Render the canonical SHA256SUMS document for a set of binaries: one
/// `<hex-sha256>  <filename>` line per binary, sorted by filename.
pub fn build_shasums(binaries: &[(String, String)]) -> String {
    let sorted: BTreeMap<&str, &str> = binaries
        .iter()
        .map(|(filename, checksum)| (filename.as_str(), checksum.as_str()))
        .collect();

    let mut out = String::new();
    for (filename, checksum) in sorted {
        out.push_str(checksum);
        out.push_str("  ");
        out.push_str(filename);
        out.push('\n');
    }
    out
}

/// Parse a SHA256SUMS document into filename → checksum.
pub fn parse_shasums(document: &str) -> Result<BTreeMap<String, String>, ShasumsError> {
    let mut entries = BTreeMap::new();
    for (idx, line) in document.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((checksum, filename)) = line.split_once("  ") else {
            return Err(ShasumsError::Malformed { line: idx + 1 });
        };
        let checksum = checksum.trim();
        let filename = filename.trim_start_matches('*').trim();
        if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ShasumsError::Malformed { line: idx + 1 });
        }
        entries.insert(filename.to_string(), checksum.to_lowercase());
    }
    Ok(entries)
}

/// Validate that a supplied SHA256SUMS document covers every binary with the
/// checksum recorded for it.
pub fn check_shasums_cover_binaries(
    document: &str,
    binaries: &[(String, String)],
) -> Result<(), ShasumsError> {
    let entries = parse_shasums(document)?;
    for (filename, checksum) in binaries {
        match entries.get(filename) {
            None => {
                return Err(ShasumsError::MissingEntry {
                    filename: filename.clone(),
                });
            }
            Some(listed) if !listed.eq_ignore_ascii_case(checksum) => {
                return Err(ShasumsError::ChecksumMismatch {
                    filename: filename.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Verify the detached signature over the exact SHA256SUMS bytes against the
/// namespace's signing key.
pub fn verify_shasums_signature(
    key: &gpg_key::Model,
    shasums: &str,
    signature: &[u8],
) -> Result<(), ShasumsError> {
    gpg::verify_detached_signature(&key.ascii_armor, signature, shasums.as_bytes())?;
    Ok(())
}

/// Recompute the cached latest-version pointer after any version mutation.
pub async fn refresh_latest_pointer<C: ConnectionTrait>(
    conn: &C,
    provider: provider::Model,
) -> Result<provider::Model, DbErr> {
    let latest = ProviderRepository::latest_version(conn, provider.id).await?;
    ProviderRepository::set_latest_version_id(conn, provider, latest.map(|v| v.id)).await
}

/// Platform pairs advertised in the versions document.
pub fn platforms(binaries: &[provider_binary::Model]) -> Vec<(String, String)> {
    binaries
        .iter()
        .map(|b| (b.os.clone(), b.arch.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_binaries() -> Vec<(String, String)> {
        vec![
            (
                "terraform-provider-tls_1.0.0_linux_amd64.zip".to_string(),
                "b".repeat(64),
            ),
            (
                "terraform-provider-tls_1.0.0_darwin_arm64.zip".to_string(),
                "a".repeat(64),
            ),
        ]
    }

    #[test]
    fn shasums_lines_sorted_by_filename() {
        let doc = build_shasums(&sample_binaries());
        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("darwin_arm64.zip"));
        assert!(lines[1].ends_with("linux_amd64.zip"));
        assert!(lines[0].starts_with(&"a".repeat(64)));
        // Exactly two spaces between checksum and filename.
        assert!(lines[0].contains(&format!("{}  terraform", "a".repeat(64))));
    }

    #[test]
    fn parse_round_trips_build() {
        let doc = build_shasums(&sample_binaries());
        let parsed = parse_shasums(&doc).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed["terraform-provider-tls_1.0.0_linux_amd64.zip"],
            "b".repeat(64)
        );
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            parse_shasums("nonsense line\n"),
            Err(ShasumsError::Malformed { line: 1 })
        ));
        assert!(matches!(
            parse_shasums("abc  file.zip\n"),
            Err(ShasumsError::Malformed { line: 1 })
        ));
    }

    #[test]
    fn cover_check_detects_missing_and_mismatched() {
        let binaries = sample_binaries();
        let doc = build_shasums(&binaries);
        assert!(check_shasums_cover_binaries(&doc, &binaries).is_ok());

        let mut extra = binaries.clone();
        extra.push(("missing.zip".to_string(), "c".repeat(64)));
        assert!(matches!(
            check_shasums_cover_binaries(&doc, &extra),
            Err(ShasumsError::MissingEntry { .. })
        ));

        let mut wrong = binaries.clone();
        wrong[0].1 = "d".repeat(64);
        assert!(matches!(
            check_shasums_cover_binaries(&doc, &wrong),
            Err(ShasumsError::ChecksumMismatch { .. })
        ));
    }
}
