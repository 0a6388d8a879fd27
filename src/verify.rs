//! Chain verification against the local CA.
//!
//! Used both right after issuing certificates and when listing a directory,
//! so the two paths apply the same policy: the CA certificate is the only
//! trust anchor, and validity windows are checked against the current time.

use std::fmt;

use anyhow::{anyhow, Result};
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{X509Ref, X509StoreContext, X509};

/// Result of checking one certificate against the CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Failed(String),
    NotAttempted,
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Verified => write!(f, "OK"),
            VerifyOutcome::Failed(reason) => write!(f, "FAILED: {}", reason),
            VerifyOutcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

/// Trust store holding a single CA certificate.
pub struct ChainVerifier {
    store: X509Store,
}

impl ChainVerifier {
    pub fn new(ca_cert: &X509Ref) -> Result<Self> {
        let mut builder =
            X509StoreBuilder::new().map_err(|e| anyhow!("Failed to create X509 store: {}", e))?;
        builder
            .add_cert(ca_cert.to_owned())
            .map_err(|e| anyhow!("Failed to add CA certificate to store: {}", e))?;
        Ok(Self {
            store: builder.build(),
        })
    }

    /// Check that `cert` was signed by the CA and is currently valid.
    ///
    /// A rejected certificate yields `Ok(VerifyOutcome::Failed(..))`; `Err`
    /// means the check itself could not run.
    pub fn verify(&self, cert: &X509Ref) -> Result<VerifyOutcome> {
        let chain: Stack<X509> =
            Stack::new().map_err(|e| anyhow!("Failed to create certificate stack: {}", e))?;
        let mut context = X509StoreContext::new()
            .map_err(|e| anyhow!("Failed to create verification context: {}", e))?;
        let failure = context
            .init(&self.store, cert, &chain, |ctx| {
                if ctx.verify_cert()? {
                    Ok(None)
                } else {
                    Ok(Some(ctx.error().error_string().to_string()))
                }
            })
            .map_err(|e| anyhow!("Failed to verify certificate: {}", e))?;

        Ok(match failure {
            None => VerifyOutcome::Verified,
            Some(reason) => VerifyOutcome::Failed(reason),
        })
    }
}
