//! On-disk naming convention shared by the creator and the inspector.
//!
//! ```text
//! ca.crt / ca.key                  certificate authority
//! node.crt / node.key              node identity (all hosts via SAN)
//! client.<name>.crt / .key         per-client identity
//! ```
//!
//! Classification is purely name based; file contents are never consulted.

use std::fmt;

pub const CERT_EXTENSION: &str = "crt";
pub const KEY_EXTENSION: &str = "key";

const CA_BASE: &str = "ca";
const NODE_BASE: &str = "node";
const CLIENT_PREFIX: &str = "client.";

/// Identity a key/certificate pair belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Ca,
    Node,
    Client(String),
}

impl Role {
    /// File name without extension, e.g. `client.alice`.
    pub fn base_name(&self) -> String {
        match self {
            Role::Ca => CA_BASE.to_string(),
            Role::Node => NODE_BASE.to_string(),
            Role::Client(name) => format!("{}{}", CLIENT_PREFIX, name),
        }
    }

    pub fn cert_file_name(&self) -> String {
        format!("{}.{}", self.base_name(), CERT_EXTENSION)
    }

    pub fn key_file_name(&self) -> String {
        format!("{}.{}", self.base_name(), KEY_EXTENSION)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Ca => write!(f, "CA"),
            Role::Node => write!(f, "node"),
            Role::Client(name) => write!(f, "client {}", name),
        }
    }
}

/// What a file in the certificate directory is, judged by its name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Certificate(Role),
    Key(Role),
    Unsupported,
}

/// Map a file name onto the fixed naming convention.
pub fn classify(file_name: &str) -> FileKind {
    let Some((base, extension)) = file_name.rsplit_once('.') else {
        return FileKind::Unsupported;
    };

    let role = match base {
        CA_BASE => Role::Ca,
        NODE_BASE => Role::Node,
        _ => match base.strip_prefix(CLIENT_PREFIX) {
            Some(name) if !name.is_empty() => Role::Client(name.to_string()),
            _ => return FileKind::Unsupported,
        },
    };

    match extension {
        CERT_EXTENSION => FileKind::Certificate(role),
        KEY_EXTENSION => FileKind::Key(role),
        _ => FileKind::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_names() {
        assert_eq!(classify("ca.crt"), FileKind::Certificate(Role::Ca));
        assert_eq!(classify("ca.key"), FileKind::Key(Role::Ca));
        assert_eq!(classify("node.crt"), FileKind::Certificate(Role::Node));
        assert_eq!(classify("node.key"), FileKind::Key(Role::Node));
        assert_eq!(
            classify("client.alice.crt"),
            FileKind::Certificate(Role::Client("alice".to_string()))
        );
        assert_eq!(
            classify("client.svc.backup.key"),
            FileKind::Key(Role::Client("svc.backup".to_string()))
        );
    }

    #[test]
    fn test_classify_rejects_other_names() {
        for name in [
            "README",
            "ca.pem",
            "CA.crt",
            "node.crt.bak",
            "client..crt",
            "client.crt",
            "server.crt",
            ".key",
        ] {
            assert_eq!(classify(name), FileKind::Unsupported, "{}", name);
        }
    }

    #[test]
    fn test_file_names_round_trip_through_classify() {
        let role = Role::Client("bob".to_string());
        assert_eq!(role.cert_file_name(), "client.bob.crt");
        assert_eq!(role.key_file_name(), "client.bob.key");
        assert_eq!(classify(&role.key_file_name()), FileKind::Key(role.clone()));
        assert_eq!(classify(&role.cert_file_name()), FileKind::Certificate(role));
    }
}
