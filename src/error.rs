//! Error taxonomy for certificate creation and directory inspection.
//!
//! Library functions return `anyhow::Result`; the variants below are raised
//! wherever a caller needs to tell failure classes apart, and can be recovered
//! with `err.downcast_ref::<CertError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    /// Malformed input that makes the whole run meaningless.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A single `--nodes` entry that is neither an IP literal nor a DNS name.
    #[error("invalid host entry {entry:?}: {reason}")]
    InvalidHost { entry: String, reason: String },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CA key {}: {reason}", path.display())]
    InvalidCaKey { path: PathBuf, reason: String },

    #[error("CA certificate {} exists but its key {} is missing", cert.display(), key.display())]
    CaKeyMissing { cert: PathBuf, key: PathBuf },

    /// An issued certificate does not chain to the CA.
    #[error("{}: verification against CA failed: {reason}", path.display())]
    Verification { path: PathBuf, reason: String },

    #[error("unsupported file name: {0}")]
    UnsupportedFile(String),
}

impl CertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CertError::Io {
            path: path.into(),
            source,
        }
    }
}
