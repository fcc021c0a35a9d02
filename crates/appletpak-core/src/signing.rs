//! Package signing
//!
//! A package is signed by sealing its manifest and signing the canonical
//! manifest bytes with the certificate's RSA key (PKCS#1 v1.5, SHA-1). The
//! certificate thumbprint (upper-case hex SHA-1 of the X.509 DER) becomes the
//! manifest's public key token.
//!
//! Certificates are stored as PEM: the `CERTIFICATE` block, followed by a
//! PKCS#8 `PRIVATE KEY` block when the private key is present.

use chrono::Utc;
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

use crate::error::{CoreError, Result};
use crate::manifest::Manifest;
use crate::package::Package;

/// RSA modulus size for generated certificates
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Lifetime of generated certificates
const VALIDITY_DAYS: u64 = 3 * 365;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// An X.509 certificate with its RSA key
///
/// Certificates read from a package only carry the public half.
#[derive(Debug, Clone)]
pub struct SigningCertificate {
    subject: String,
    der: Vec<u8>,
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl SigningCertificate {
    /// Generate a self-signed certificate with a fresh 2048-bit key
    pub fn generate(subject: &str) -> Result<Self> {
        Self::generate_with_bits(subject, DEFAULT_KEY_BITS)
    }

    pub fn generate_with_bits(subject: &str, bits: usize) -> Result<Self> {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| security(&format!("key generation failed: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);

        let spki_der = public_key
            .to_public_key_der()
            .map_err(|e| security(&format!("cannot encode public key: {}", e)))?;
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())
            .map_err(|e| security(&format!("cannot encode public key: {}", e)))?;
        let name = Name::from_str(subject)
            .map_err(|e| security(&format!("invalid subject '{}': {}", subject, e)))?;
        let validity = Validity::from_now(Duration::from_secs(VALIDITY_DAYS * 86_400))
            .map_err(|e| security(&format!("invalid validity: {}", e)))?;
        let serial = SerialNumber::new(&serial_bytes())
            .map_err(|e| security(&format!("invalid serial number: {}", e)))?;

        let issuer_key = pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());
        let certificate = CertificateBuilder::new(Profile::Root, serial, validity, name, spki, &issuer_key)
            .and_then(|builder| builder.build::<pkcs1v15::Signature>())
            .map_err(|e| security(&format!("cannot build certificate: {}", e)))?;
        let der = certificate
            .to_der()
            .map_err(|e| security(&format!("cannot encode certificate: {}", e)))?;

        Ok(Self {
            subject: certificate.tbs_certificate.subject.to_string(),
            der,
            public_key,
            private_key: Some(private_key),
        })
    }

    /// Read a DER encoded certificate, without private key
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let certificate =
            Certificate::from_der(der).map_err(|e| security(&format!("invalid certificate: {}", e)))?;
        let spki = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| security(&format!("invalid certificate key: {}", e)))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| security(&format!("certificate does not hold an RSA key: {}", e)))?;

        Ok(Self {
            subject: certificate.tbs_certificate.subject.to_string(),
            der: der.to_vec(),
            public_key,
            private_key: None,
        })
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Upper-case hex SHA-1 of the certificate DER
    pub fn thumbprint(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(&self.der);
        hex::encode_upper(hasher.finalize())
    }

    /// The same certificate without its private key
    pub fn public_only(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }

    pub fn to_pem(&self) -> Result<String> {
        let mut text = Certificate::from_der(&self.der)
            .and_then(|cert| cert.to_pem(LineEnding::LF))
            .map_err(|e| security(&format!("cannot encode certificate: {}", e)))?;
        if let Some(key) = &self.private_key {
            let key_pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| security(&format!("cannot encode private key: {}", e)))?;
            text.push_str(&key_pem);
        }
        Ok(text)
    }

    /// Parse a certificate block and an optional PKCS#8 private key block
    pub fn from_pem(text: &str) -> Result<Self> {
        let mut certificate = None;
        let mut private_key = None;

        for block in pem_blocks(text) {
            if block.starts_with(&format!("-----BEGIN {}-----", CERTIFICATE_LABEL)) {
                let der = Certificate::from_pem(block.as_bytes())
                    .and_then(|cert| cert.to_der())
                    .map_err(|e| security(&format!("invalid certificate PEM: {}", e)))?;
                certificate = Some(Self::from_der(&der)?);
            } else if block.starts_with(&format!("-----BEGIN {}-----", PRIVATE_KEY_LABEL)) {
                let key = RsaPrivateKey::from_pkcs8_pem(block)
                    .map_err(|e| security(&format!("invalid private key: {}", e)))?;
                private_key = Some(key);
            }
        }

        let mut certificate = certificate.ok_or_else(|| security("no CERTIFICATE block found"))?;
        if let Some(key) = private_key {
            if RsaPublicKey::from(&key) != certificate.public_key {
                return Err(security("private key does not match the certificate"));
            }
            certificate.private_key = Some(key);
        }
        Ok(certificate)
    }

    /// Save as PEM, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_pem()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_pem(&text)
    }
}

/// Positive, non-zero 16 byte serial
fn serial_bytes() -> [u8; 16] {
    use rand::RngCore;

    let mut serial = [0u8; 16];
    rand::rng().fill_bytes(&mut serial);
    serial[0] = (serial[0] & 0x7f) | 0x01;
    serial
}

/// Split a PEM bundle into its `-----BEGIN ...-----` / `-----END ...-----` blocks
fn pem_blocks(text: &str) -> Vec<&str> {
    const BEGIN: &str = "-----BEGIN ";
    const END: &str = "-----END ";

    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN) {
        let block = &rest[start..];
        let Some(end) = block.find(END) else { break };
        let Some(close) = block[end + END.len()..].find("-----") else {
            break;
        };
        let len = end + END.len() + close + "-----".len();
        blocks.push(&block[..len]);
        rest = &block[len..];
    }
    blocks
}

/// Signs and verifies packages
#[derive(Debug, Clone, Default)]
pub struct Signer {
    /// Embed the public certificate in signed packages
    pub embed_certificate: bool,
}

impl Signer {
    pub fn new(embed_certificate: bool) -> Self {
        Self { embed_certificate }
    }

    /// Sign a manifest, producing a sealed package
    ///
    /// Stamps the manifest with the current time and the certificate
    /// thumbprint before sealing.
    pub fn sign(&self, manifest: &Manifest, certificate: &SigningCertificate) -> Result<Package> {
        let key = certificate
            .private_key
            .as_ref()
            .ok_or_else(|| CoreError::NoPrivateKey {
                subject: certificate.subject.clone(),
            })?;

        let mut manifest = manifest.clone();
        manifest.timestamp = Some(Utc::now());
        manifest.public_key_token = Some(certificate.thumbprint());

        let mut package = Package::seal(&manifest)?;
        let signature = pkcs1v15::SigningKey::<Sha1>::new(key.clone())
            .try_sign(&package.manifest)
            .map_err(|e| security(&format!("signing failed: {}", e)))?;
        package.meta.signature = Some(signature.to_vec());

        if self.embed_certificate {
            package.certificate = Some(certificate.der.clone());
        }

        tracing::debug!(
            id = %package.meta.id,
            version = %package.meta.version,
            thumbprint = ?package.meta.public_key_token,
            "signed package"
        );
        Ok(package)
    }

    /// Sign an existing package again, discarding its previous signature
    pub fn resign(&self, package: &Package, certificate: &SigningCertificate) -> Result<Package> {
        let manifest = package.unpack()?;
        self.sign(&manifest, certificate)
    }

    /// Check the hash and the signature of a package
    ///
    /// The supplied certificate takes precedence over an embedded one.
    pub fn verify(&self, package: &Package, certificate: Option<&SigningCertificate>) -> Result<()> {
        if !package.verify_hash() {
            return Err(security("package hash does not match its manifest"));
        }

        let signature = package
            .meta
            .signature
            .as_deref()
            .ok_or_else(|| security("package is not signed"))?;

        let embedded;
        let certificate = match (certificate, &package.certificate) {
            (Some(cert), _) => cert,
            (None, Some(der)) => {
                embedded = SigningCertificate::from_der(der)?;
                &embedded
            }
            (None, None) => return Err(security("no certificate available to verify the package")),
        };

        if package.meta.public_key_token.as_deref() != Some(certificate.thumbprint().as_str()) {
            return Err(security("package was signed by a different certificate"));
        }

        let signature = pkcs1v15::Signature::try_from(signature)
            .map_err(|e| security(&format!("malformed signature: {}", e)))?;
        pkcs1v15::VerifyingKey::<Sha1>::new(certificate.public_key.clone())
            .verify(&package.manifest, &signature)
            .map_err(|e| security(&format!("signature verification failed: {}", e)))
    }
}

fn security(message: &str) -> CoreError {
    CoreError::Security {
        message: message.to_string(),
    }
}
