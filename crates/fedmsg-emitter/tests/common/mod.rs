//! Shared fixtures: throwaway signing material and log capture.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rcgen::{CertificateParams, KeyPair, PKCS_ED25519};
use tempfile::TempDir;

/// Self-signed Ed25519 certificate, its key, and an unrelated second key.
pub struct SigningFixture {
    _dir: TempDir,
    pub certificate: PathBuf,
    pub key: PathBuf,
    pub other_key: PathBuf,
    pub ecdsa_key: PathBuf,
    pub dir: PathBuf,
}

pub fn signing_fixture() -> SigningFixture {
    let dir = tempfile::Builder::new()
        .prefix("fedmsg-sign")
        .tempdir()
        .expect("tempdir");

    let key = KeyPair::generate_for(&PKCS_ED25519).expect("generate key");
    let params =
        CertificateParams::new(vec!["jenkins.example.org".to_string()]).expect("cert params");
    let cert = params.self_signed(&key).expect("self-signed cert");
    let other = KeyPair::generate_for(&PKCS_ED25519).expect("generate other key");
    let ecdsa = KeyPair::generate().expect("generate ecdsa key");

    let certificate = dir.path().join("jenkins.crt");
    let key_path = dir.path().join("jenkins.key");
    let other_key = dir.path().join("other.key");
    let ecdsa_key = dir.path().join("ecdsa.key");

    fs::write(&certificate, cert.pem()).expect("write cert");
    fs::write(&key_path, key.serialize_pem()).expect("write key");
    fs::write(&other_key, other.serialize_pem()).expect("write other key");
    fs::write(&ecdsa_key, ecdsa.serialize_pem()).expect("write ecdsa key");

    SigningFixture {
        dir: dir.path().to_path_buf(),
        _dir: dir,
        certificate,
        key: key_path,
        other_key,
        ecdsa_key,
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install a thread-local subscriber writing into the returned capture.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}
