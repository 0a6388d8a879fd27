//! Configuration for certificate creation.
//!
//! [`CreateOptions`] is the validated, immutable input to
//! [`create_certs`](crate::create::create_certs). It is assembled through
//! [`CreateOptionsBuilder`], optionally seeded from a TOML file:
//!
//! ```toml
//! [defaults]
//! dir = "tls"
//! key_size = 4096
//! days = 365
//! ca_days = 3651
//!
//! [subject]
//! ca_common_name = "Autumn Root CA"
//! node_common_name = "Autumn Node"
//! organization = "Autumn"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::CertError;
use crate::naming::Role;

pub const DEFAULT_DIR: &str = "tls";
pub const DEFAULT_KEY_SIZE: u32 = 2048;
pub const DEFAULT_DAYS: u32 = 1826;
pub const DEFAULT_CA_DAYS: u32 = 3651;
pub const MIN_KEY_SIZE: u32 = 2048;
pub const MAX_KEY_SIZE: u32 = 8192;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub subject: SubjectNames,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_key_size")]
    pub key_size: u32,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_ca_days")]
    pub ca_days: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            key_size: default_key_size(),
            days: default_days(),
            ca_days: default_ca_days(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DIR)
}

fn default_key_size() -> u32 {
    DEFAULT_KEY_SIZE
}

fn default_days() -> u32 {
    DEFAULT_DAYS // 5 years
}

fn default_ca_days() -> u32 {
    DEFAULT_CA_DAYS // 10 years
}

/// Distinguished-name values stamped into generated certificates.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SubjectNames {
    #[serde(default = "default_ca_common_name")]
    pub ca_common_name: String,
    #[serde(default = "default_node_common_name")]
    pub node_common_name: String,
    #[serde(default = "default_organization")]
    pub organization: String,
}

impl Default for SubjectNames {
    fn default() -> Self {
        Self {
            ca_common_name: default_ca_common_name(),
            node_common_name: default_node_common_name(),
            organization: default_organization(),
        }
    }
}

fn default_ca_common_name() -> String {
    "Autumn Root CA".to_string()
}

fn default_node_common_name() -> String {
    "Autumn Node".to_string()
}

fn default_organization() -> String {
    "Autumn".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load `path` when given, built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Split a separator-delimited list, trimming items and dropping empty ones.
pub fn split_and_trim(s: &str, sep: char) -> Vec<String> {
    s.split(sep)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validated inputs for one `create` run.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    dir: PathBuf,
    ca_key: PathBuf,
    nodes: Vec<String>,
    client: Option<String>,
    key_size: u32,
    days: u32,
    ca_days: u32,
    force: bool,
    verify: bool,
    subject: SubjectNames,
}

impl CreateOptions {
    pub fn builder(dir: impl Into<PathBuf>) -> CreateOptionsBuilder {
        CreateOptionsBuilder::new(dir.into())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ca_key_path(&self) -> &Path {
        &self.ca_key
    }

    /// The CA certificate always lives in the target directory.
    pub fn ca_cert_path(&self) -> PathBuf {
        self.dir.join(Role::Ca.cert_file_name())
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }

    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn ca_days(&self) -> u32 {
        self.ca_days
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn verify(&self) -> bool {
        self.verify
    }

    pub fn subject(&self) -> &SubjectNames {
        &self.subject
    }
}

/// Builder for [`CreateOptions`]; `build()` performs all validation.
#[derive(Debug, Clone)]
pub struct CreateOptionsBuilder {
    dir: PathBuf,
    ca_key: Option<PathBuf>,
    nodes: Vec<String>,
    client: Option<String>,
    key_size: u32,
    days: u32,
    ca_days: u32,
    force: bool,
    verify: bool,
    subject: SubjectNames,
}

impl CreateOptionsBuilder {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            ca_key: None,
            nodes: Vec::new(),
            client: None,
            key_size: DEFAULT_KEY_SIZE,
            days: DEFAULT_DAYS,
            ca_days: DEFAULT_CA_DAYS,
            force: false,
            verify: true,
            subject: SubjectNames::default(),
        }
    }

    /// Seed sizes, validity and subject names from a loaded config file.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.key_size = config.defaults.key_size;
        self.days = config.defaults.days;
        self.ca_days = config.defaults.ca_days;
        self.subject = config.subject.clone();
        self
    }

    /// Path to the CA private key; defaults to `<dir>/ca.key`
    pub fn ca_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_key = Some(path.into());
        self
    }

    pub fn nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn client(mut self, client: Option<String>) -> Self {
        self.client = client;
        self
    }

    pub fn key_size(mut self, bits: u32) -> Self {
        self.key_size = bits;
        self
    }

    /// Validity of node and client certificates, in days
    pub fn days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    /// Validity of a newly generated CA certificate, in days
    pub fn ca_days(mut self, days: u32) -> Self {
        self.ca_days = days;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn subject(mut self, subject: SubjectNames) -> Self {
        self.subject = subject;
        self
    }

    pub fn build(self) -> Result<CreateOptions, CertError> {
        if self.dir.as_os_str().is_empty() {
            return Err(CertError::Config("directory must not be empty".to_string()));
        }
        if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&self.key_size) {
            return Err(CertError::Config(format!(
                "key size {} out of range {}..={}",
                self.key_size, MIN_KEY_SIZE, MAX_KEY_SIZE
            )));
        }
        if self.days == 0 || self.ca_days == 0 {
            return Err(CertError::Config(
                "validity must be at least one day".to_string(),
            ));
        }
        let client = match self.client {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    None
                } else {
                    validate_client_name(&name)?;
                    Some(name)
                }
            }
            None => None,
        };
        if self.subject.ca_common_name.is_empty() || self.subject.node_common_name.is_empty() {
            return Err(CertError::Config(
                "subject common names must not be empty".to_string(),
            ));
        }

        let ca_key = self
            .ca_key
            .unwrap_or_else(|| self.dir.join(Role::Ca.key_file_name()));

        Ok(CreateOptions {
            dir: self.dir,
            ca_key,
            nodes: self.nodes,
            client,
            key_size: self.key_size,
            days: self.days,
            ca_days: self.ca_days,
            force: self.force,
            verify: self.verify,
            subject: self.subject,
        })
    }
}

/// Client names become part of a file name, so keep them to a safe alphabet.
fn validate_client_name(name: &str) -> Result<(), CertError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !valid_chars || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(CertError::Config(format!("invalid client name: {:?}", name)));
    }
    Ok(())
}
