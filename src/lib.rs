//! Autumn Cert - local certificate authority for Autumn clusters
//!
//! Creates and inspects the RSA keys and X.509 certificates that secure
//! node-to-node and client-to-node connections. Everything lives in one
//! directory with a fixed naming scheme:
//!
//! ```text
//! tls/
//!   ca.crt  ca.key                 self-signed authority
//!   node.crt  node.key             node identity, every host as a SAN
//!   client.<name>.crt / .key       one pair per client
//! ```
//!
//! # Module Overview
//!
//! - [`create`]: issues the CA, node and client pairs ([`create_certs`])
//! - [`inspect`]: lists and checks a certificate directory ([`list_certs`])
//! - [`verify`]: chain verification shared by both
//! - [`generate_ca`] / [`generate_leaf`]: openssl certificate builders
//! - [`configs`]: validated [`CreateOptions`] and the optional TOML defaults file
//! - [`naming`]: file naming convention and name-based classification
//!
//! # Example
//!
//! ```no_run
//! use autumn_cert::{create_certs, list_certs, CreateOptions};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let opts = CreateOptions::builder("tls")
//!         .nodes(vec!["host1".to_string(), "127.0.0.1".to_string()])
//!         .client(Some("alice".to_string()))
//!         .build()?;
//!     create_certs(&opts)?;
//!
//!     for entry in list_certs(opts.dir())? {
//!         println!("{}", entry.file_name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Public functions return `anyhow::Result<T>`. Failures that callers may
//! want to tell apart carry a [`CertError`], reachable with
//! `err.downcast_ref::<CertError>()`.

pub mod configs;
pub mod create;
pub mod error;
pub mod generate_ca;
pub mod generate_leaf;
pub mod hosts;
pub mod inspect;
pub mod naming;
pub mod pem_files;
pub mod serial;
pub mod verify;

pub use configs::{AppConfig, CreateOptions};
pub use create::{create_certs, CreateReport};
pub use error::CertError;
pub use inspect::{list_certs, list_certs_with, DirectoryEntry, EntryDetails, ListOptions};
pub use naming::{FileKind, Role};
pub use verify::{ChainVerifier, VerifyOutcome};
