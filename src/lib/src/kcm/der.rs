//! Structural DER checks for provisioned keys and certificates
//!
//! These only confirm that the bytes are well-formed P-256 key material or
//! an X.509 certificate. Trust decisions belong to the verifier.

use crate::error::FccError;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p256::{PublicKey, SecretKey};
use x509_parser::prelude::*;

/// Parse a P-256 private key in PKCS#8 or SEC1 DER form.
pub fn parse_private_key(der: &[u8]) -> Result<SecretKey, FccError> {
    SecretKey::from_pkcs8_der(der)
        .or_else(|_| SecretKey::from_sec1_der(der))
        .map_err(|e| {
            log::debug!("Private key DER rejected: {}", e);
            FccError::InvalidParameter
        })
}

/// Parse a P-256 SubjectPublicKeyInfo.
pub fn parse_public_key(der: &[u8]) -> Result<PublicKey, FccError> {
    PublicKey::from_public_key_der(der).map_err(|e| {
        log::debug!("Public key DER rejected: {}", e);
        FccError::InvalidParameter
    })
}

/// Parse a DER certificate, rejecting trailing bytes.
pub fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, FccError> {
    let (rem, cert) = X509Certificate::from_der(der)?;
    if !rem.is_empty() {
        log::debug!("Certificate has {} trailing bytes", rem.len());
        return Err(FccError::InvalidCertificate);
    }
    Ok(cert)
}

pub fn validate_private_key(der: &[u8]) -> Result<(), FccError> {
    parse_private_key(der).map(|_| ())
}

pub fn validate_public_key(der: &[u8]) -> Result<(), FccError> {
    parse_public_key(der).map(|_| ())
}

pub fn validate_certificate(der: &[u8]) -> Result<(), FccError> {
    parse_certificate(der).map(|_| ())
}

/// Check that the certificate's subject key is the public half of `private_key`.
pub fn certificate_matches_private_key(
    cert: &X509Certificate<'_>,
    private_key: &SecretKey,
) -> Result<(), FccError> {
    let cert_key = PublicKey::from_public_key_der(cert.public_key().raw).map_err(|e| {
        log::debug!("Certificate key is not a P-256 key: {}", e);
        FccError::CertificatePublicKeyMismatch
    })?;
    if cert_key != private_key.public_key() {
        return Err(FccError::CertificatePublicKeyMismatch);
    }
    Ok(())
}

/// Issuer equals subject and the signature verifies with the certificate's own key.
pub fn is_self_signed(cert: &X509Certificate<'_>) -> bool {
    cert.issuer() == cert.subject() && cert.verify_signature(None).is_ok()
}
