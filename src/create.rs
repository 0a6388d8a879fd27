//! Key and certificate creation for the CA, the node and clients.
//!
//! The flow for one run:
//! 1. Resolve the CA: reuse `ca.crt` + CA key when both exist (and `force` is
//!    off), otherwise self-sign a new CA certificate, reusing an existing CA
//!    key when only the key is present.
//! 2. Issue `node.{crt,key}` covering every valid host, and
//!    `client.<name>.{crt,key}` when a client name is given.
//! 3. Optionally re-read every certificate written in this run and verify it
//!    against the CA.
//!
//! Existing files are skipped with a warning unless `force` is set. Writes
//! made earlier in a run are not rolled back when a later step fails.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::{debug, info, warn};

use crate::configs::CreateOptions;
use crate::error::CertError;
use crate::generate_ca::RsaCABuilder;
use crate::generate_leaf::RsaLeafBuilder;
use crate::hosts::{parse_hosts, Host};
use crate::naming::Role;
use crate::pem_files::{
    read_certificate, read_private_key, write_certificate, write_private_key,
};
use crate::serial::SerialAllocator;
use crate::verify::{ChainVerifier, VerifyOutcome};

/// An artifact that was not (re)generated, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub role: Role,
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one `create` run.
#[derive(Debug, Default)]
pub struct CreateReport {
    /// `true` when an existing CA certificate and key signed this run.
    pub ca_reused: bool,
    /// Files written, in creation order.
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedArtifact>,
    /// `--nodes` entries that were dropped, with the reason.
    pub rejected_hosts: Vec<String>,
    /// Certificates verified against the CA after writing.
    pub verified: Vec<PathBuf>,
}

impl CreateReport {
    fn skip(&mut self, role: &Role, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Skipping {} ({}): {}", role, path.display(), reason);
        self.skipped.push(SkippedArtifact {
            role: role.clone(),
            path: path.to_path_buf(),
            reason,
        });
    }
}

struct Authority {
    key: PKey<Private>,
    cert: X509,
}

/// Create the CA and requested node/client key pairs under `opts.dir()`.
///
/// # Errors
/// Fatal: unreadable or mismatched CA material, filesystem failures, and
/// (with verification on) any issued certificate that does not chain to
/// the CA. Problems scoped to a single artifact are recorded in
/// [`CreateReport::skipped`] instead.
pub fn create_certs(opts: &CreateOptions) -> Result<CreateReport> {
    let dir = opts.dir();
    fs::create_dir_all(dir).map_err(|e| CertError::io(dir, e))?;

    let mut report = CreateReport::default();
    let mut serials = SerialAllocator::new();
    let mut issued: Vec<PathBuf> = Vec::new();

    let authority = resolve_authority(opts, &mut serials, &mut report, &mut issued)?;

    let (hosts, rejected) = parse_hosts(opts.nodes());
    for err in rejected {
        warn!("Ignoring host entry: {}", err);
        report.rejected_hosts.push(err.to_string());
    }

    let mut leaves: Vec<(Role, String)> = Vec::new();
    if !hosts.is_empty() {
        leaves.push((Role::Node, opts.subject().node_common_name.clone()));
    } else if !opts.nodes().is_empty() {
        warn!("No valid hosts given; node certificate not created");
    }
    if let Some(client) = opts.client() {
        leaves.push((Role::Client(client.to_string()), client.to_string()));
    }

    for (role, common_name) in leaves {
        if let Some(cert_path) = issue_leaf(
            opts,
            &authority,
            role,
            common_name,
            &hosts,
            &mut serials,
            &mut report,
        )? {
            issued.push(cert_path);
        }
    }

    if opts.verify() && !issued.is_empty() {
        let verifier = ChainVerifier::new(&authority.cert)?;
        for path in issued {
            let cert = read_certificate(&path)?;
            match verifier.verify(&cert)? {
                VerifyOutcome::Verified => {
                    debug!("{} verified against CA", path.display());
                    report.verified.push(path);
                }
                VerifyOutcome::Failed(reason) => {
                    return Err(CertError::Verification { path, reason }.into());
                }
                VerifyOutcome::NotAttempted => {}
            }
        }
    }

    Ok(report)
}

fn resolve_authority(
    opts: &CreateOptions,
    serials: &mut SerialAllocator,
    report: &mut CreateReport,
    issued: &mut Vec<PathBuf>,
) -> Result<Authority> {
    let key_path = opts.ca_key_path();
    let cert_path = opts.ca_cert_path();
    let force = opts.force();

    let existing_key = if !force && key_path.exists() {
        Some(load_ca_key(key_path)?)
    } else {
        None
    };

    if !force && cert_path.exists() {
        let Some(key) = existing_key else {
            return Err(CertError::CaKeyMissing {
                cert: cert_path,
                key: key_path.to_path_buf(),
            }
            .into());
        };
        let cert = read_certificate(&cert_path).context("Failed to load CA certificate")?;
        let cert_key = cert
            .public_key()
            .map_err(|e| anyhow!("Failed to read CA certificate public key: {}", e))?;
        if !cert_key.public_eq(&key) {
            return Err(CertError::InvalidCaKey {
                path: key_path.to_path_buf(),
                reason: format!("does not match {}", cert_path.display()),
            }
            .into());
        }
        info!("Reusing CA from {}", cert_path.display());
        report.ca_reused = true;
        return Ok(Authority { key, cert });
    }

    let mut builder = RsaCABuilder::new(serials.next_serial()?)
        .subject_common_name(opts.subject().ca_common_name.clone())
        .organization(opts.subject().organization.clone())
        .key_size(opts.key_size())
        .validity_days(opts.ca_days());
    let key_reused = existing_key.is_some();
    if let Some(key) = existing_key {
        info!("Reusing CA key {}", key_path.display());
        builder = builder.private_key(key);
    }
    let (key, cert) = builder.build().context("Failed to generate CA")?;

    if !key_reused {
        if !write_private_key(key_path, &key, force)? {
            return Err(anyhow!(
                "{} appeared while generating the CA",
                key_path.display()
            ));
        }
        report.written.push(key_path.to_path_buf());
    }
    if !write_certificate(&cert_path, &cert, force)? {
        return Err(anyhow!(
            "{} appeared while generating the CA",
            cert_path.display()
        ));
    }
    info!("Created CA certificate {}", cert_path.display());
    report.written.push(cert_path.clone());
    issued.push(cert_path);

    Ok(Authority { key, cert })
}

fn load_ca_key(path: &Path) -> Result<PKey<Private>> {
    read_private_key(path).map_err(|e| {
        anyhow::Error::from(CertError::InvalidCaKey {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        })
    })
}

/// Issue one node or client pair. Returns the certificate path when written.
fn issue_leaf(
    opts: &CreateOptions,
    authority: &Authority,
    role: Role,
    common_name: String,
    hosts: &[Host],
    serials: &mut SerialAllocator,
    report: &mut CreateReport,
) -> Result<Option<PathBuf>> {
    let force = opts.force();
    let cert_path = opts.dir().join(role.cert_file_name());
    let key_path = opts.dir().join(role.key_file_name());

    if !force && cert_path.exists() {
        report.skip(&role, &cert_path, "certificate exists, use force to overwrite");
        return Ok(None);
    }

    let existing_key = if !force && key_path.exists() {
        match read_private_key(&key_path) {
            Ok(key) => Some(key),
            Err(e) => {
                report.skip(&role, &key_path, format!("existing key unusable: {:#}", e));
                return Ok(None);
            }
        }
    } else {
        None
    };

    let mut builder =
        RsaLeafBuilder::new(role.clone(), &authority.key, &authority.cert, serials.next_serial()?)
            .subject_common_name(common_name)
            .organization(opts.subject().organization.clone())
            .hosts(hosts.to_vec())
            .key_size(opts.key_size())
            .validity_days(opts.days());
    let key_reused = existing_key.is_some();
    if let Some(key) = existing_key {
        info!("Reusing {} key {}", role, key_path.display());
        builder = builder.private_key(key);
    }
    let (key, cert) = builder
        .build()
        .with_context(|| format!("Failed to generate {} certificate", role))?;

    if !key_reused {
        if !write_private_key(&key_path, &key, force)? {
            report.skip(&role, &key_path, "key file appeared concurrently");
            return Ok(None);
        }
        report.written.push(key_path);
    }
    if !write_certificate(&cert_path, &cert, force)? {
        report.skip(&role, &cert_path, "certificate file appeared concurrently");
        return Ok(None);
    }
    info!("Created {} certificate {}", role, cert_path.display());
    report.written.push(cert_path.clone());

    Ok(Some(cert_path))
}
