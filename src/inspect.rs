//! Directory inventory of certificates and keys.
//!
//! Every regular file in the directory becomes one [`DirectoryEntry`], in
//! lexical file-name order. Files that cannot be classified or parsed are
//! reported as error entries; only a failure to read the directory itself
//! aborts the listing.
//!
//! For certificates the inventory shows:
//! - Common name and issuer
//! - Serial number (uppercase hex)
//! - Expiration date
//! - Hosts from the subject alternative names
//! - Public key algorithm and an MD5 fingerprint of the public key
//! - SHA-256 digest of the DER certificate
//! - Whether the sibling `.key` file holds the matching private key
//! - Verification against `ca.crt` in the same directory
//!
//! For keys only the file mode, PEM type and a digest are shown.

use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::Id;
use openssl::x509::{X509NameRef, X509};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::CertError;
use crate::naming::{classify, FileKind, Role};
use crate::pem_files::{file_mode_string, read_file, read_private_key, PRIVATE_KEY_TAGS};
use crate::verify::{ChainVerifier, VerifyOutcome};

const UNKNOWN_MODE: &str = "?";

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Verify certificates against `ca.crt` when it is present.
    pub verify: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// One file found in the certificate directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub file_name: String,
    pub kind: FileKind,
    /// Permission string, e.g. `-rw-------`.
    pub file_mode: String,
    pub details: EntryDetails,
}

impl DirectoryEntry {
    /// The error recorded for this file, if it could not be inspected.
    pub fn error(&self) -> Option<&str> {
        match &self.details {
            EntryDetails::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn certificate(&self) -> Option<&CertificateInfo> {
        match &self.details {
            EntryDetails::Certificate(info) => Some(info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntryDetails {
    Certificate(CertificateInfo),
    Key(KeyInfo),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub common_name: String,
    pub issuer_name: String,
    pub serial_number: String,
    pub expires: DateTime<Utc>,
    pub hosts: Vec<String>,
    pub algorithm: String,
    pub sha256_digest: String,
    pub public_key_md5: String,
    /// `None` when there is no readable sibling key file.
    pub key_match: Option<bool>,
    pub verified_ca: VerifyOutcome,
}

#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub pem_type: String,
    pub sha256_digest: String,
}

/// List `dir` with verification enabled.
pub fn list_certs(dir: &Path) -> Result<Vec<DirectoryEntry>> {
    list_certs_with(dir, &ListOptions::default())
}

pub fn list_certs_with(dir: &Path, opts: &ListOptions) -> Result<Vec<DirectoryEntry>> {
    let mut files: Vec<(String, PathBuf, io::Result<fs::Metadata>)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CertError::io(dir, e))? {
        let entry = entry.map_err(|e| CertError::io(dir, e))?;
        let path = entry.path();
        // Follows symlinks; a dangling link still gets an entry.
        let metadata = fs::metadata(&path);
        let is_dir = match &metadata {
            Ok(metadata) => metadata.is_dir(),
            Err(_) => entry.file_type().map(|t| t.is_dir()).unwrap_or(false),
        };
        if is_dir {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        files.push((file_name, path, metadata));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let trust = if opts.verify {
        load_ca_trust(dir)
    } else {
        CaTrust::Absent
    };

    Ok(files
        .into_iter()
        .map(|(file_name, path, metadata)| {
            let kind = classify(&file_name);
            let file_mode = metadata
                .as_ref()
                .map(file_mode_string)
                .unwrap_or_else(|_| UNKNOWN_MODE.to_string());
            let details = match metadata {
                Err(e) => Err(CertError::io(&path, e).into()),
                Ok(_) => match &kind {
                    FileKind::Certificate(role) => inspect_certificate(dir, &path, role, &trust),
                    FileKind::Key(_) => inspect_key(&path),
                    FileKind::Unsupported => {
                        Err(CertError::UnsupportedFile(file_name.clone()).into())
                    }
                },
            }
            .unwrap_or_else(|e| {
                debug!("{}: {:#}", file_name, e);
                EntryDetails::Error(format!("{:#}", e))
            });
            DirectoryEntry {
                file_mode,
                file_name,
                kind,
                details,
            }
        })
        .collect())
}

/// What `ca.crt` offers for chain verification.
enum CaTrust {
    /// No CA certificate, or verification switched off.
    Absent,
    /// `ca.crt` exists but cannot be loaded.
    Unusable(String),
    Ready(ChainVerifier),
}

fn load_ca_trust(dir: &Path) -> CaTrust {
    let ca_path = dir.join(Role::Ca.cert_file_name());
    if !ca_path.is_file() {
        return CaTrust::Absent;
    }
    let verifier = read_file(&ca_path)
        .map_err(anyhow::Error::from)
        .and_then(|pem| {
            X509::from_pem(&pem).map_err(|e| anyhow!("Failed to parse certificate: {}", e))
        })
        .and_then(|cert| ChainVerifier::new(&cert));
    match verifier {
        Ok(verifier) => CaTrust::Ready(verifier),
        Err(e) => {
            debug!("CA unavailable for verification: {:#}", e);
            CaTrust::Unusable(format!("{:#}", e))
        }
    }
}

fn inspect_certificate(
    dir: &Path,
    path: &Path,
    role: &Role,
    trust: &CaTrust,
) -> Result<EntryDetails> {
    let pem = read_file(path)?;
    let cert =
        X509::from_pem(&pem).map_err(|e| anyhow!("Failed to parse certificate: {}", e))?;

    let der = cert.to_der()?;
    let public_key = cert.public_key()?;
    let spki = public_key.public_key_to_der()?;

    let key_path = dir.join(role.key_file_name());
    let key_match = if key_path.is_file() {
        read_private_key(&key_path)
            .ok()
            .map(|key| key.public_eq(&public_key))
    } else {
        None
    };

    let verified_ca = match trust {
        CaTrust::Ready(verifier) => verifier
            .verify(&cert)
            .unwrap_or_else(|e| VerifyOutcome::Failed(e.to_string())),
        CaTrust::Unusable(reason) => {
            VerifyOutcome::Failed(format!("CA certificate unusable: {}", reason))
        }
        CaTrust::Absent => VerifyOutcome::NotAttempted,
    };

    Ok(EntryDetails::Certificate(CertificateInfo {
        common_name: common_name(cert.subject_name()).unwrap_or_default(),
        issuer_name: name_to_string(cert.issuer_name()),
        serial_number: cert.serial_number().to_bn()?.to_hex_str()?.to_string(),
        expires: asn1_to_datetime(cert.not_after())?,
        hosts: subject_hosts(&cert),
        algorithm: key_algorithm(public_key.id(), public_key.bits()),
        sha256_digest: hex::encode(Sha256::digest(&der)),
        public_key_md5: hex::encode_upper(hash(MessageDigest::md5(), &spki)?),
        key_match,
        verified_ca,
    }))
}

fn inspect_key(path: &Path) -> Result<EntryDetails> {
    let bytes = read_file(path)?;
    let block = pem::parse(&bytes).map_err(|e| anyhow!("Failed to parse PEM: {}", e))?;
    if !PRIVATE_KEY_TAGS.contains(&block.tag()) {
        return Err(anyhow!("unexpected PEM type {:?} for a key file", block.tag()));
    }
    Ok(EntryDetails::Key(KeyInfo {
        pem_type: block.tag().to_string(),
        sha256_digest: hex::encode(Sha256::digest(block.contents())),
    }))
}

fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
}

/// `O=Autumn, CN=Autumn Root CA` style rendering.
fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn subject_hosts(cert: &X509) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };
    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(dns.to_string());
            }
            name.ipaddress().and_then(ip_from_bytes).map(|ip| ip.to_string())
        })
        .collect()
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn key_algorithm(id: Id, bits: u32) -> String {
    let name = match id {
        Id::RSA => "RSA".to_string(),
        Id::EC => "EC".to_string(),
        Id::ED25519 => "Ed25519".to_string(),
        other => format!("key type {}", other.as_raw()),
    };
    format!("{}-{}", name, bits)
}

fn asn1_to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp out of range: {}", secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory_has_no_entries() {
        let tmp = TempDir::new().unwrap();
        assert!(list_certs(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = list_certs(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CertError>(),
            Some(CertError::Io { .. })
        ));
    }

    #[test]
    fn test_unsupported_and_subdirectories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), b"hello").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let entries = list_certs(tmp.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "notes.txt");
        assert_eq!(entries[0].kind, FileKind::Unsupported);
        assert!(entries[0].error().unwrap().contains("unsupported"));
    }

    #[test]
    fn test_key_with_wrong_pem_type() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("node.key"),
            b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
        )
        .unwrap();
        let entries = list_certs(tmp.path()).unwrap();
        assert!(entries[0].error().unwrap().contains("unexpected PEM type"));
    }

    #[test]
    fn test_ip_from_bytes() {
        assert_eq!(
            ip_from_bytes(&[127, 0, 0, 1]),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(ip_from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn test_asn1_to_datetime() {
        let time = Asn1Time::from_unix(1_700_000_000).unwrap();
        assert_eq!(asn1_to_datetime(&time).unwrap().timestamp(), 1_700_000_000);
    }
}
