use std::collections::HashSet;
use std::fs;
use std::path::Path;

use autumn_cert::pem_files::read_certificate;
use autumn_cert::{
    create_certs, list_certs, list_certs_with, CreateOptions, EntryDetails, FileKind,
    ListOptions, Role, VerifyOutcome,
};
use chrono::Utc;
use openssl::asn1::Asn1Time;
use tempfile::TempDir;

fn create(dir: &Path, nodes: &[&str], client: Option<&str>, force: bool) {
    let opts = CreateOptions::builder(dir)
        .nodes(nodes.iter().map(|n| n.to_string()).collect())
        .client(client.map(str::to_string))
        .days(30)
        .ca_days(60)
        .force(force)
        .build()
        .unwrap();
    create_certs(&opts).unwrap();
}

fn serial_of(path: &Path) -> String {
    read_certificate(path)
        .unwrap()
        .serial_number()
        .to_bn()
        .unwrap()
        .to_hex_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_create_then_list_reports_hosts_and_verification() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1", "host2", "127.0.0.1"], Some("alice"), false);

    let entries = list_certs(tmp.path()).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "ca.crt",
            "ca.key",
            "client.alice.crt",
            "client.alice.key",
            "node.crt",
            "node.key"
        ]
    );
    assert!(entries.iter().all(|e| e.error().is_none()));

    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    assert_eq!(node.kind, FileKind::Certificate(Role::Node));
    let info = node.certificate().unwrap();
    assert_eq!(info.hosts.join(", "), "host1, host2, 127.0.0.1");
    assert_eq!(info.verified_ca.to_string(), "OK");
    assert_eq!(info.key_match, Some(true));
    assert_eq!(info.common_name, "Autumn Node");
    assert!(info.issuer_name.contains("CN=Autumn Root CA"));
    assert_eq!(info.algorithm, "RSA-2048");
    assert_eq!(info.sha256_digest.len(), 64);

    let client = entries
        .iter()
        .find(|e| e.file_name == "client.alice.crt")
        .unwrap();
    let info = client.certificate().unwrap();
    assert_eq!(info.common_name, "alice");
    assert_eq!(info.verified_ca, VerifyOutcome::Verified);

    for entry in entries.iter().filter(|e| matches!(e.kind, FileKind::Key(_))) {
        match &entry.details {
            EntryDetails::Key(key) => assert_eq!(key.pem_type, "PRIVATE KEY"),
            other => panic!("{}: unexpected {:?}", entry.file_name, other),
        }
    }
}

#[test]
fn test_ca_is_self_signed_authority() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);

    let ca = read_certificate(&tmp.path().join("ca.crt")).unwrap();
    assert!(ca.verify(&ca.public_key().unwrap()).unwrap());
    assert_eq!(
        ca.subject_name().to_der().unwrap(),
        ca.issuer_name().to_der().unwrap()
    );
    let text = String::from_utf8(ca.to_text().unwrap()).unwrap();
    assert!(text.contains("CA:TRUE"));

    let node = read_certificate(&tmp.path().join("node.crt")).unwrap();
    assert!(node.verify(&ca.public_key().unwrap()).unwrap());
}

#[test]
fn test_san_set_matches_input_exactly() {
    let tmp = TempDir::new().unwrap();
    let hosts = ["db-0.internal", "db-1.internal", "10.0.0.7", "::1"];
    create(tmp.path(), &hosts, None, false);

    let entries = list_certs(tmp.path()).unwrap();
    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    let listed: HashSet<&str> = node
        .certificate()
        .unwrap()
        .hosts
        .iter()
        .map(String::as_str)
        .collect();
    let expected: HashSet<&str> = hosts.iter().copied().collect();
    assert_eq!(listed, expected);
}

#[test]
fn test_rerun_without_force_leaves_files_untouched() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], Some("bob"), false);

    let snapshot: Vec<(String, Vec<u8>)> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect();

    create(tmp.path(), &["host1", "host9"], Some("bob"), false);

    for (name, contents) in snapshot {
        assert_eq!(fs::read(tmp.path().join(&name)).unwrap(), contents, "{}", name);
    }
}

#[test]
fn test_force_regenerates_with_new_serials() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], Some("bob"), false);
    let files = ["ca.crt", "node.crt", "client.bob.crt"];
    let before: Vec<String> = files.iter().map(|f| serial_of(&tmp.path().join(f))).collect();

    create(tmp.path(), &["host1"], Some("bob"), true);
    let after: Vec<String> = files.iter().map(|f| serial_of(&tmp.path().join(f))).collect();

    for (old, new) in before.iter().zip(&after) {
        assert_ne!(old, new);
    }
    let entries = list_certs(tmp.path()).unwrap();
    assert!(entries
        .iter()
        .filter_map(|e| e.certificate())
        .all(|c| c.verified_ca.is_verified()));
}

#[test]
fn test_serials_distinct_within_one_run() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], Some("carol"), false);
    let serials: HashSet<String> = ["ca.crt", "node.crt", "client.carol.crt"]
        .iter()
        .map(|f| serial_of(&tmp.path().join(f)))
        .collect();
    assert_eq!(serials.len(), 3);
}

#[test]
fn test_corrupt_file_does_not_hide_valid_entries() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);
    fs::write(
        tmp.path().join("client.broken.crt"),
        b"-----BEGIN CERTIFICATE-----\ngarbage\n-----END CERTIFICATE-----\n",
    )
    .unwrap();

    let entries = list_certs(tmp.path()).unwrap();
    let broken = entries
        .iter()
        .find(|e| e.file_name == "client.broken.crt")
        .unwrap();
    assert!(broken.error().is_some());

    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    let info = node.certificate().unwrap();
    assert_eq!(info.hosts, vec!["host1"]);
    assert_eq!(info.verified_ca, VerifyOutcome::Verified);
}

#[test]
fn test_foreign_ca_fails_verification() {
    let ours = TempDir::new().unwrap();
    let theirs = TempDir::new().unwrap();
    create(ours.path(), &["host1"], None, false);
    create(theirs.path(), &["host1"], None, false);
    fs::copy(theirs.path().join("ca.crt"), ours.path().join("ca.crt")).unwrap();

    let entries = list_certs(ours.path()).unwrap();
    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    let outcome = &node.certificate().unwrap().verified_ca;
    assert!(outcome.to_string().starts_with("FAILED: "));
}

#[test]
fn test_listing_without_verification() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);
    let entries = list_certs_with(tmp.path(), &ListOptions { verify: false }).unwrap();
    for cert in entries.iter().filter_map(|e| e.certificate()) {
        assert_eq!(cert.verified_ca, VerifyOutcome::NotAttempted);
    }
}

#[test]
fn test_listing_without_ca_is_not_attempted() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);
    fs::remove_file(tmp.path().join("ca.crt")).unwrap();

    let entries = list_certs(tmp.path()).unwrap();
    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    assert_eq!(
        node.certificate().unwrap().verified_ca,
        VerifyOutcome::NotAttempted
    );
}

#[test]
fn test_unreadable_ca_is_reported_as_failed() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);
    fs::write(tmp.path().join("ca.crt"), b"garbage").unwrap();

    let entries = list_certs(tmp.path()).unwrap();
    assert!(entries
        .iter()
        .find(|e| e.file_name == "ca.crt")
        .unwrap()
        .error()
        .is_some());

    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    let outcome = node.certificate().unwrap().verified_ca.to_string();
    assert!(
        outcome.starts_with("FAILED: CA certificate unusable"),
        "{}",
        outcome
    );
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_an_error_entry() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], None, false);
    std::os::unix::fs::symlink(
        tmp.path().join("gone"),
        tmp.path().join("client.stale.crt"),
    )
    .unwrap();

    let entries = list_certs(tmp.path()).unwrap();
    let stale = entries
        .iter()
        .find(|e| e.file_name == "client.stale.crt")
        .unwrap();
    assert!(stale.error().is_some());
    assert_eq!(stale.file_mode, "?");

    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    assert_eq!(
        node.certificate().unwrap().verified_ca,
        VerifyOutcome::Verified
    );
    assert!(entries.iter().any(|e| e.file_name == "ca.crt" && e.error().is_none()));
}

#[test]
fn test_listed_serial_and_expiry_match_certificate() {
    let tmp = TempDir::new().unwrap();
    create(tmp.path(), &["host1"], Some("dave"), false);

    let entries = list_certs(tmp.path()).unwrap();
    for entry in entries.iter().filter(|e| e.certificate().is_some()) {
        let info = entry.certificate().unwrap();
        let cert = read_certificate(&tmp.path().join(&entry.file_name)).unwrap();

        let serial_bytes = cert.serial_number().to_bn().unwrap().to_vec();
        assert_eq!(info.serial_number, hex::encode_upper(serial_bytes));
        assert!(info.serial_number.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!info.serial_number.chars().any(|c| c.is_ascii_lowercase()));

        let listed = Asn1Time::from_unix(info.expires.timestamp()).unwrap();
        let diff = cert.not_after().diff(&listed).unwrap();
        assert_eq!((diff.days, diff.secs), (0, 0), "{}", entry.file_name);
    }

    let node = entries.iter().find(|e| e.file_name == "node.crt").unwrap();
    let days_left = (node.certificate().unwrap().expires - Utc::now()).num_days();
    assert!((29..=30).contains(&days_left), "{}", days_left);
}
