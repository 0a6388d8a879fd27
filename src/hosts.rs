//! Parsing of `--nodes` entries into subject alternative names.

use std::fmt;
use std::net::IpAddr;

use crate::error::CertError;

const MAX_DNS_NAME_LEN: usize = 253;
const MAX_DNS_LABEL_LEN: usize = 63;

/// One SAN entry: an IP literal when the text parses as one, a DNS name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Dns(String),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{}", ip),
            Host::Dns(name) => write!(f, "{}", name),
        }
    }
}

pub fn parse_host(entry: &str) -> Result<Host, CertError> {
    let entry = entry.trim();
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(Host::Ip(ip));
    }
    validate_dns_name(entry).map_err(|reason| CertError::InvalidHost {
        entry: entry.to_string(),
        reason: reason.to_string(),
    })?;
    Ok(Host::Dns(entry.to_string()))
}

/// Parse every entry, keeping input order and dropping duplicates.
///
/// Invalid entries do not stop the scan; they are returned alongside the
/// valid hosts so the caller can report them.
pub fn parse_hosts<S: AsRef<str>>(entries: &[S]) -> (Vec<Host>, Vec<CertError>) {
    let mut hosts: Vec<Host> = Vec::new();
    let mut rejected = Vec::new();
    for entry in entries {
        match parse_host(entry.as_ref()) {
            Ok(host) if !hosts.contains(&host) => hosts.push(host),
            Ok(_) => {}
            Err(e) => rejected.push(e),
        }
    }
    (hosts, rejected)
}

fn validate_dns_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty host name");
    }
    if name.len() > MAX_DNS_NAME_LEN {
        return Err("host name longer than 253 characters");
    }
    // A single leading wildcard label is allowed.
    let name = name.strip_prefix("*.").unwrap_or(name);
    let name = name.strip_suffix('.').unwrap_or(name);
    for label in name.split('.') {
        if label.is_empty() {
            return Err("empty label");
        }
        if label.len() > MAX_DNS_LABEL_LEN {
            return Err("label longer than 63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("label starts or ends with '-'");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("invalid character");
        }
    }
    Ok(())
}
