//! Autumn Cert command line
//!
//! ```bash
//! # CA plus a node certificate for three hosts and one client
//! autumn-cert create --dir tls --nodes host1,host2,127.0.0.1 --client alice
//!
//! # Inventory of the directory
//! autumn-cert ls --dir tls
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autumn_cert::configs::split_and_trim;
use autumn_cert::{
    create_certs, list_certs_with, AppConfig, CreateOptions, CreateReport, DirectoryEntry,
    EntryDetails, ListOptions,
};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autumn-cert")]
#[command(about = "Generate certificates for autumn")]
#[command(version)]
struct Cli {
    /// TOML file with default sizes, validity and subject names
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists certificates and keys
    Ls {
        /// Directory holding the certificates
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Skip verification against ca.crt
        #[arg(long)]
        no_verify: bool,
    },

    /// Creates the CA and node/client key and certificate pairs
    Create {
        /// Directory to store certificates
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Path to the CA private key (default: <dir>/ca.key)
        #[arg(short = 'k', long)]
        ca_key: Option<PathBuf>,

        /// RSA key bit size for creating new keys
        #[arg(short = 'r', long)]
        keysize: Option<u32>,

        /// Duration of node/client cert validity in days
        #[arg(long)]
        duration: Option<u32>,

        /// Duration of a new CA cert validity in days
        #[arg(long)]
        ca_duration: Option<u32>,

        /// Comma-separated hosts (names or IPs) for the node certificate
        #[arg(short, long)]
        nodes: Option<String>,

        /// Create a cert/key pair for this client name
        #[arg(short, long)]
        client: Option<String>,

        /// Force overwrite of existing cert/key pairs
        #[arg(long)]
        force: bool,

        /// Verify certs against the CA after creating them
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        verify: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("autumn_cert=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ls { dir, no_verify } => {
            let dir = dir.unwrap_or_else(|| config.defaults.dir.clone());
            handle_ls(&dir, !no_verify)
        }
        Commands::Create {
            dir,
            ca_key,
            keysize,
            duration,
            ca_duration,
            nodes,
            client,
            force,
            verify,
        } => {
            let dir = dir.unwrap_or_else(|| config.defaults.dir.clone());
            let mut builder = CreateOptions::builder(dir)
                .with_config(&config)
                .nodes(split_and_trim(nodes.as_deref().unwrap_or_default(), ','))
                .client(client)
                .force(force)
                .verify(verify);
            if let Some(path) = ca_key {
                builder = builder.ca_key(path);
            }
            if let Some(bits) = keysize {
                builder = builder.key_size(bits);
            }
            if let Some(days) = duration {
                builder = builder.days(days);
            }
            if let Some(days) = ca_duration {
                builder = builder.ca_days(days);
            }
            let opts = builder.build()?;
            let report = create_certs(&opts).context("Failed to create certificates")?;
            print_create_report(&report);
            Ok(())
        }
    }
}

fn handle_ls(dir: &Path, verify: bool) -> Result<()> {
    let entries = list_certs_with(dir, &ListOptions { verify })?;
    if entries.is_empty() {
        println!("Directory is empty: {}", dir.display());
        return Ok(());
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &DirectoryEntry) {
    match &entry.details {
        EntryDetails::Error(message) => {
            println!("{}: error: {}\n", entry.file_name, message);
        }
        EntryDetails::Key(key) => {
            println!("{} {} - {}", entry.file_mode, entry.file_name, key.pem_type);
            println!("{:>14}: {}\n", "SHA-256 Digest", key.sha256_digest);
        }
        EntryDetails::Certificate(cert) => {
            println!(
                "{} {} - {}",
                entry.file_mode, entry.file_name, cert.common_name
            );
            println!("{:>14}: {}", "Issuer", cert.issuer_name);
            println!("{:>14}: {}", "CA Verify", cert.verified_ca);
            println!("{:>14}: {}", "S/N", cert.serial_number);
            println!(
                "{:>14}: {}",
                "Expiration",
                cert.expires.format("%a, %d %b %Y %H:%M:%S UTC")
            );
            if !cert.hosts.is_empty() {
                println!("{:>14}: {}", "Hosts", cert.hosts.join(", "));
            }
            println!("{:>14}: {}", "Algorithm", cert.algorithm);
            println!("{:>14}: {}", "Public Key MD5", cert.public_key_md5);
            if let Some(matches) = cert.key_match {
                let verdict = if matches { "OK" } else { "MISMATCH" };
                println!("{:>14}: {}", "Key Match", verdict);
            }
            println!("{:>14}: {}\n", "SHA-256 Digest", cert.sha256_digest);
        }
    }
}

fn print_create_report(report: &CreateReport) {
    if report.ca_reused {
        println!("✓ Using existing CA");
    }
    for path in &report.written {
        println!("✓ Wrote {}", path.display());
    }
    for skipped in &report.skipped {
        println!("✗ Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    for host in &report.rejected_hosts {
        println!("✗ {}", host);
    }
    for path in &report.verified {
        println!("✓ Verified {}", path.display());
    }
}
