//! Message signing against an X.509 certificate / PKCS#8 key pair.
//!
//! Messages are signed with Ed25519 over their canonical JSON form (sorted
//! keys, no whitespace). The signer's certificate travels with the message,
//! so subscribers can verify without any out-of-band key exchange.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer as _, SigningKey};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use webpki::EndEntityCert;

use crate::error::SigningError;
use crate::message::Message;

const KEY_CHECK_MESSAGE: &[u8] = b"fedmsg-emitter key/certificate check";

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// The signer's certificate, as referenced from a signed message.
#[derive(Debug, Clone)]
pub struct CertificateRef {
    der: CertificateDer<'static>,
    pem: String,
    fingerprint: String,
}

impl CertificateRef {
    /// Load the first certificate from a PEM file.
    pub fn load(path: &Path) -> Result<Self, SigningError> {
        let read_error = |reason: String| SigningError::CertificateRead {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read(path).map_err(|e| read_error(e.to_string()))?;
        let (der, pem) = certificate_block(&contents).map_err(read_error)?;
        Self::from_parts(der, pem)
    }

    /// Parse a PEM certificate from memory.
    pub fn from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        let (der, pem) = certificate_block(pem).map_err(SigningError::InvalidCertificate)?;
        Self::from_parts(der, pem)
    }

    fn from_parts(der: CertificateDer<'static>, pem: String) -> Result<Self, SigningError> {
        EndEntityCert::try_from(&der)
            .map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;
        let fingerprint = hex::encode(Sha256::digest(der.as_ref()));
        Ok(Self {
            der,
            pem,
            fingerprint,
        })
    }

    /// SHA-256 fingerprint of the DER encoding, hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The certificate's PEM block as it was loaded. Other blocks in the
    /// source, such as a bundled private key, are not included.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Check an Ed25519 signature against the certificate's public key.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), SigningError> {
        let cert = EndEntityCert::try_from(&self.der)
            .map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;
        cert.verify_signature(webpki::ring::ED25519, msg, signature)
            .map_err(|e| SigningError::BadSignature(e.to_string()))
    }
}

/// A message together with its signature and the signer's certificate.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Vec<u8>,
    pub certificate: CertificateRef,
}

/// Loaded signing material. Load once, sign many.
pub struct Signer {
    key: SigningKey,
    certificate: CertificateRef,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("certificate", &self.certificate.fingerprint)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Load a certificate and its private key, and check that they belong together.
    pub fn load(
        certificate_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, SigningError> {
        let key_path = key_path.as_ref();
        let certificate = CertificateRef::load(certificate_path.as_ref())?;

        let key_der =
            PrivatePkcs8KeyDer::from_pem_file(key_path).map_err(|e| SigningError::KeyRead {
                path: key_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let key = SigningKey::from_pkcs8_der(key_der.secret_pkcs8_der())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        let signer = Self { key, certificate };
        signer.check_key_matches()?;
        debug!(fingerprint = %signer.certificate.fingerprint, "Loaded signing material");
        Ok(signer)
    }

    pub fn certificate(&self) -> &CertificateRef {
        &self.certificate
    }

    /// Sign a message. The message itself is kept unchanged inside the result.
    pub fn sign(&self, message: Message) -> Result<SignedMessage, SigningError> {
        let canonical = message.canonical_bytes()?;
        let signature = self.key.sign(&canonical).to_bytes().to_vec();
        Ok(SignedMessage {
            message,
            signature,
            certificate: self.certificate.clone(),
        })
    }

    fn check_key_matches(&self) -> Result<(), SigningError> {
        let check = self.key.sign(KEY_CHECK_MESSAGE).to_bytes();
        match self.certificate.verify(KEY_CHECK_MESSAGE, &check) {
            Ok(()) => Ok(()),
            Err(SigningError::BadSignature(_)) => Err(SigningError::KeyMismatch {
                fingerprint: self.certificate.fingerprint.clone(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Load signing material and sign one message.
pub fn sign(
    message: Message,
    certificate_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<SignedMessage, SigningError> {
    Signer::load(certificate_path, key_path)?.sign(message)
}

/// Verify a signed message against its embedded certificate.
pub fn verify(signed: &SignedMessage) -> Result<(), SigningError> {
    let canonical = signed.message.canonical_bytes()?;
    signed.certificate.verify(&canonical, &signed.signature)
}

/// Verify a signed wire body the way a subscriber would, returning the message.
pub fn verify_wire(body: &[u8]) -> Result<Message, SigningError> {
    let mut value: Value = serde_json::from_slice(body)?;
    let fields = value
        .as_object_mut()
        .ok_or_else(|| SigningError::BadSignature("message body is not an object".to_string()))?;

    let signature = take_base64(fields, "signature")?;
    let certificate_pem = take_base64(fields, "certificate")?;
    let certificate = CertificateRef::from_pem(&certificate_pem)?;

    let message: Message = serde_json::from_value(value)?;
    let canonical = message.canonical_bytes()?;
    certificate.verify(&canonical, &signature)?;
    Ok(message)
}

/// First `CERTIFICATE` block: its DER and its PEM text.
fn certificate_block(contents: &[u8]) -> Result<(CertificateDer<'static>, String), String> {
    let der = CertificateDer::from_pem_slice(contents).map_err(|e| e.to_string())?;
    let text = std::str::from_utf8(contents).map_err(|e| e.to_string())?;

    let start = text.find(PEM_BEGIN).ok_or("no certificate block")?;
    let end = text[start..]
        .find(PEM_END)
        .map(|offset| start + offset + PEM_END.len())
        .ok_or("unterminated certificate block")?;

    let mut pem = text[start..end].to_string();
    pem.push('\n');
    Ok((der, pem))
}

fn take_base64(
    fields: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<Vec<u8>, SigningError> {
    let encoded = match fields.remove(key) {
        Some(Value::String(encoded)) => encoded,
        _ => return Err(SigningError::BadSignature(format!("missing {key} field"))),
    };
    BASE64
        .decode(encoded)
        .map_err(|e| SigningError::BadSignature(format!("{key} is not base64: {e}")))
}
