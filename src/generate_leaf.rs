//! Node and client certificate generation, signed by the local CA.
//!
//! # X.509 Extensions
//! - **Basic Constraints**: CA=false
//! - **Key Usage**: `digitalSignature`, `keyEncipherment`
//! - **Extended Key Usage**: `serverAuth` + `clientAuth` for nodes (they dial
//!   each other), `clientAuth` for clients
//! - **Subject Alternative Name**: one DNS or IP entry per configured host, in
//!   input order; omitted when no hosts are given

use anyhow::{anyhow, Result};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Ref, X509};

use crate::generate_ca::{build_subject_name, generate_rsa_key, X509_VERSION_3};
use crate::hosts::Host;
use crate::naming::Role;

/// Builder for an end-entity key pair and certificate signed by a CA.
///
/// # Examples
/// ```rust,no_run
/// # use anyhow::Result;
/// # use openssl::pkey::{PKey, Private};
/// # use openssl::x509::X509;
/// # use autumn_cert::generate_leaf::RsaLeafBuilder;
/// # use autumn_cert::hosts::parse_host;
/// # use autumn_cert::naming::Role;
/// # use autumn_cert::serial::SerialAllocator;
/// # fn example(ca_key: PKey<Private>, ca_cert: X509) -> Result<()> {
/// let mut serials = SerialAllocator::new();
/// let (node_key, node_cert) = RsaLeafBuilder::new(Role::Node, &ca_key, &ca_cert, serials.next_serial()?)
///     .subject_common_name("Autumn Node".to_string())
///     .hosts(vec![parse_host("host1")?, parse_host("127.0.0.1")?])
///     .validity_days(365)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaLeafBuilder<'a> {
    role: Role,
    subject_common_name: String,
    organization: String,
    hosts: Vec<Host>,
    key_size: u32,
    validity_days: u32,
    serial: Asn1Integer,
    private_key: Option<PKey<Private>>,
    signing_key: &'a PKeyRef<Private>,
    signing_cert: &'a X509Ref,
}

impl<'a> RsaLeafBuilder<'a> {
    /// # Arguments
    /// * `role` - `Role::Node` or `Role::Client`; decides the extended key usage
    /// * `ca_key` - CA private key used for signing
    /// * `ca_cert` - CA certificate (issuer information)
    /// * `serial` - Serial number for the new certificate
    pub fn new(
        role: Role,
        ca_key: &'a PKeyRef<Private>,
        ca_cert: &'a X509Ref,
        serial: Asn1Integer,
    ) -> Self {
        Self {
            role,
            subject_common_name: String::new(),
            organization: String::new(),
            hosts: Vec::new(),
            key_size: 2048,
            validity_days: 1826,
            serial,
            private_key: None,
            signing_key: ca_key,
            signing_cert: ca_cert,
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

    /// Subject alternative names, in the order they should appear.
    pub fn hosts(mut self, hosts: Vec<Host>) -> Self {
        self.hosts = hosts;
        self
    }

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

    /// Build the key pair and CA-signed certificate
    ///
    /// # Returns
    /// * `Ok((PKey<Private>, X509))` - Tuple of (private key, signed certificate)
    pub fn build(self) -> Result<(PKey<Private>, X509)> {
        if self.role == Role::Ca {
            return Err(anyhow!("CA certificates are built with RsaCABuilder"));
        }
        if self.subject_common_name.is_empty() {
            return Err(anyhow!("common name for {} must not be empty", self.role));
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

        let subject_name = build_subject_name(&self.subject_common_name, &self.organization)?;
        builder
            .set_subject_name(&subject_name)
            .map_err(|e| anyhow!("Failed to set subject: {}", e))?;
        builder
            .set_issuer_name(self.signing_cert.subject_name())
            .map_err(|e| anyhow!("Failed to set issuer from CA: {}", e))?;

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
            .build()
            .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
        builder
            .append_extension(bc)
            .map_err(|e| anyhow!("Failed to add BasicConstraints: {}", e))?;

        let ku = KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()
            .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?;
        builder
            .append_extension(ku)
            .map_err(|e| anyhow!("Failed to add KeyUsage: {}", e))?;

        let mut eku = ExtendedKeyUsage::new();
        if self.role == Role::Node {
            eku.server_auth();
        }
        eku.client_auth();
        let eku = eku
            .build()
            .map_err(|e| anyhow!("Failed to build ExtendedKeyUsage: {}", e))?;
        builder
            .append_extension(eku)
            .map_err(|e| anyhow!("Failed to add ExtendedKeyUsage: {}", e))?;

        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(self.signing_cert), None))
            .map_err(|e| anyhow!("Failed to build AuthorityKeyIdentifier: {}", e))?;
        builder
            .append_extension(aki)
            .map_err(|e| anyhow!("Failed to add AuthorityKeyIdentifier: {}", e))?;

        if !self.hosts.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for host in &self.hosts {
                match host {
                    Host::Ip(ip) => {
                        san.ip(&ip.to_string());
                    }
                    Host::Dns(name) => {
                        san.dns(name);
                    }
                }
            }
            let san = san
                .build(&builder.x509v3_context(Some(self.signing_cert), None))
                .map_err(|e| anyhow!("Failed to build SubjectAlternativeName: {}", e))?;
            builder
                .append_extension(san)
                .map_err(|e| anyhow!("Failed to add SubjectAlternativeName: {}", e))?;
        }

        builder
            .sign(self.signing_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

        Ok((private_key, builder.build()))
    }
}
