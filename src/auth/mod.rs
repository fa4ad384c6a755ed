//! Credentials and request signing.
//!
//! A [`CredentialSource`] produces a [`KeyProvider`] (key id + RSA key).
//! [`client::SdkClient`] turns a key provider into the signer and
//! interceptor pair that the Functions API client attaches to every request.

pub mod client;
pub mod instance_principal;
pub mod signer;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use thiserror::Error;

pub use client::{RequestInterceptor, SdkClient};
pub use instance_principal::InstancePrincipal;
pub use signer::{HttpSignatureSigner, RequestSigner, SignError};

/// Errors from obtaining credentials or building a client.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("instance metadata request to {url} failed (is this running in OCI Cloud Shell?): {source}")]
    Metadata {
        url: String,
        source: reqwest::Error,
    },

    #[error("instance metadata request to {url} returned {status}")]
    MetadataStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid certificate: {0}")]
    Certificate(String),

    #[error("invalid private key: {0}")]
    PrivateKey(String),

    #[error("federation request failed: {0}")]
    Federation(String),

    #[error("invalid key provider: {0}")]
    InvalidKeyProvider(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

/// A signing identity: the key id sent in `keyId` and the matching RSA key.
pub trait KeyProvider: Send + Sync + fmt::Debug {
    fn key_id(&self) -> &str;

    fn private_key(&self) -> &RsaPrivateKey;
}

/// A [`KeyProvider`] whose key id and key never change.
#[derive(Clone)]
pub struct StaticKeyProvider {
    key_id: String,
    key: RsaPrivateKey,
}

impl StaticKeyProvider {
    pub fn new(key_id: impl Into<String>, key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    /// Build from a PEM key, accepting both PKCS#1 and PKCS#8 encodings.
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self, AuthError> {
        Ok(Self::new(key_id, parse_private_key(pem)?))
    }
}

impl fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyProvider")
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl KeyProvider for StaticKeyProvider {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// Parse an unencrypted RSA private key in PKCS#1 or PKCS#8 PEM form.
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, AuthError> {
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| AuthError::PrivateKey(e.to_string()))
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| AuthError::PrivateKey(e.to_string()))
    }
}

/// An ambient credential source tied to the execution environment.
///
/// Production code uses [`InstancePrincipal`]. Tests substitute a fake.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Establish credentials and return the identity to sign with.
    async fn key_provider(&self) -> Result<Arc<dyn KeyProvider>, AuthError>;
}
