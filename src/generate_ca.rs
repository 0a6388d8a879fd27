//! Self-signed certificate authority generation.
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Key Usage**: keyCertSign, cRLSign, digitalSignature
//! - **Basic Constraints**: CA=true, pathlen=0 (signs end-entity certificates only)
//! - **Signature**: SHA-256 with RSA
//! - **Version**: X.509v3 with extensions
//!
//! # Example
//! ```rust,no_run
//! # use anyhow::Result;
//! # use autumn_cert::generate_ca::RsaCABuilder;
//! # use autumn_cert::serial::SerialAllocator;
//! # fn example() -> Result<()> {
//! let mut serials = SerialAllocator::new();
//! let (ca_key, ca_cert) = RsaCABuilder::new(serials.next_serial()?)
//!     .subject_common_name("Autumn Root CA".to_string())
//!     .organization("Autumn".to_string())
//!     .key_size(2048)
//!     .validity_days(3651)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};
use openssl::x509::{X509Name, X509};

pub(crate) const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const CA_PATH_LENGTH: u32 = 0;

/// Generate an RSA private key of `bits` size.
pub fn generate_rsa_key(bits: u32) -> Result<PKey<Private>> {
    let rsa = Rsa::generate(bits).map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;
    PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))
}

/// Build an `O=<organization>, CN=<common name>` distinguished name.
pub(crate) fn build_subject_name(common_name: &str, organization: &str) -> Result<X509Name> {
    let mut name_builder =
        X509Name::builder().map_err(|e| anyhow!("Failed to create name builder: {}", e))?;
    if !organization.is_empty() {
        name_builder
            .append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)
            .map_err(|e| anyhow!("Failed to set organization: {}", e))?;
    }
    name_builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .map_err(|e| anyhow!("Failed to set CN: {}", e))?;
    Ok(name_builder.build())
}

/// Builder for the RSA key pair and self-signed CA certificate.
///
/// An existing key can be supplied with [`RsaCABuilder::private_key`]; the
/// certificate is then re-issued around it instead of generating a new key.
pub struct RsaCABuilder {
    subject_common_name: String,
    organization: String,
    key_size: u32,
    validity_days: u32,
    serial: Asn1Integer,
    private_key: Option<PKey<Private>>,
}

impl RsaCABuilder {
    pub fn new(serial: Asn1Integer) -> Self {
        Self {
            subject_common_name: String::new(),
            organization: String::new(),
            key_size: 2048,
            validity_days: 3651,
            serial,
            private_key: None,
        }
    }

    pub fn subject_common_name(mut self, cn: String) -> Self {
        self.subject_common_name = cn;
        self
    }

    pub fn organization(mut self, org: String) -> Self {
        self.organization = org;
        self
    }

    /// RSA modulus size for a newly generated key; ignored when a key is supplied.
    pub fn key_size(mut self, bits: u32) -> Self {
        self.key_size = bits;
        self
    }

    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Reuse an existing private key instead of generating one.
    pub fn private_key(mut self, key: PKey<Private>) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Build the RSA key pair and self-signed CA certificate
    ///
    /// # Returns
    /// * `Ok((PKey<Private>, X509))` - Tuple of (private key, self-signed certificate)
    ///
    /// # Errors
    /// Returns error if the common name is empty, key generation fails, or
    /// any extension cannot be built or signed.
    pub fn build(self) -> Result<(PKey<Private>, X509)> {
        if self.subject_common_name.is_empty() {
            return Err(anyhow!("CA common name must not be empty"));
        }

        let private_key = match self.private_key {
            Some(key) => key,
            None => generate_rsa_key(self.key_size)?,
        };

        let mut builder =
            X509::builder().map_err(|e| anyhow!("Failed to create X509 builder: {}", e))?;

        builder
            .set_version(X509_VERSION_3)
            .map_err(|e| anyhow!("Failed to set version: {}", e))?;
        builder
            .set_serial_number(&self.serial)
            .map_err(|e| anyhow!("Failed to set serial number: {}", e))?;

        let name = build_subject_name(&self.subject_common_name, &self.organization)?;
        builder
            .set_subject_name(&name)
            .map_err(|e| anyhow!("Failed to set subject: {}", e))?;
        builder
            .set_issuer_name(&name)
            .map_err(|e| anyhow!("Failed to set issuer: {}", e))?;

        let not_before =
            Asn1Time::days_from_now(0).map_err(|e| anyhow!("Failed to create not_before: {}", e))?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| anyhow!("Failed to set not_before: {}", e))?;

        let not_after = Asn1Time::days_from_now(self.validity_days)
            .map_err(|e| anyhow!("Failed to create not_after: {}", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| anyhow!("Failed to set not_after: {}", e))?;

        builder
            .set_pubkey(&private_key)
            .map_err(|e| anyhow!("Failed to set public key: {}", e))?;

        let bc = BasicConstraints::new()
            .critical()
            .ca()
            .pathlen(CA_PATH_LENGTH)
            .build()
            .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
        builder
            .append_extension(bc)
            .map_err(|e| anyhow!("Failed to add BasicConstraints: {}", e))?;

        let ku = KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .digital_signature()
            .build()
            .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?;
        builder
            .append_extension(ku)
            .map_err(|e| anyhow!("Failed to add KeyUsage: {}", e))?;

        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .map_err(|e| anyhow!("Failed to build SubjectKeyIdentifier: {}", e))?;
        builder
            .append_extension(ski)
            .map_err(|e| anyhow!("Failed to add SubjectKeyIdentifier: {}", e))?;

        builder
            .sign(&private_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

        Ok((private_key, builder.build()))
    }
}
