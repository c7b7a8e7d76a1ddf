//! Writes a self-signed localhost certificate into `certs/` for local play.
//!
//! Run with `cargo run --manifest-path scripts/Cargo.toml`. The server picks
//! the PEM pair up on startup; without it, it generates an in-memory
//! identity whose hash changes every run, which makes browser-side
//! `serverCertificateHashes` pinning annoying to iterate on.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime};

const CERT_DIR: &str = "../certs";
const CERT_FILE: &str = "../certs/cert.pem";
const KEY_FILE: &str = "../certs/key.pem";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if Path::new(CERT_FILE).exists() && Path::new(KEY_FILE).exists() {
        println!("Certificates already exist at {}/", CERT_DIR);
        println!("Delete them first if you want to regenerate.");
        print_hashes()?;
        return Ok(());
    }

    println!("Generating development certificate for localhost...\n");

    fs::create_dir_all(CERT_DIR)?;

    let mut params = CertificateParams::new(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])?;

    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, "Derby Arena Dev");
    params
        .distinguished_name
        .push(DnType::OrganizationName, "Development");

    // Browsers cap serverCertificateHashes certs at 14 days of validity.
    let now = SystemTime::now();
    let fourteen_days = Duration::from_secs(14 * 24 * 60 * 60);
    params.not_before = now.into();
    params.not_after = (now + fourteen_days).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    fs::write(CERT_FILE, cert.pem())?;
    fs::write(KEY_FILE, key_pair.serialize_pem())?;

    println!("Certificate saved to {}", CERT_FILE);
    println!("Private key saved to {}", KEY_FILE);
    println!();

    print_hashes()?;

    Ok(())
}

fn print_hashes() -> Result<(), Box<dyn std::error::Error>> {
    let cert_pem = fs::read_to_string(CERT_FILE)?;

    let pem = pem::parse(&cert_pem)?;
    let der = pem.contents();

    // WebTransport pins the SHA-256 of the whole DER certificate.
    let cert_hash = digest(&SHA256, der);
    let cert_hash_b64 = STANDARD.encode(cert_hash.as_ref());

    // Chrome's trust-override flag wants the SubjectPublicKeyInfo hash
    // instead; shell out to openssl for that one.
    let spki_hash_b64 = get_spki_hash().unwrap_or_else(|_| cert_hash_b64.clone());

    println!("=== Certificate Hashes ===\n");

    println!("WebTransport serverCertificateHashes value:");
    println!("  {}\n", cert_hash_b64);

    println!("Chrome flag for local testing:");
    println!("  --ignore-certificate-errors-spki-list={}\n", spki_hash_b64);

    Ok(())
}

fn get_spki_hash() -> Result<String, Box<dyn std::error::Error>> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(format!(
            "openssl x509 -in {} -pubkey -noout 2>/dev/null | openssl pkey -pubin -outform der 2>/dev/null | openssl dgst -sha256 -binary | base64",
            CERT_FILE
        ))
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    } else {
        Err("Failed to compute SPKI hash".into())
    }
}
