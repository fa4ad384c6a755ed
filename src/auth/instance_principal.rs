//! Instance principal credentials.
//!
//! Cloud Shell runs on a compute instance whose identity certificate is
//! served by the instance metadata service. The certificate and its key are
//! exchanged at the regional auth service for a short-lived security token,
//! which is then used together with a freshly generated session key.
//!
//! Flow:
//! 1. `GET {metadata}/instance/region`, `identity/cert.pem`,
//!    `identity/key.pem`, `identity/intermediate.pem`
//! 2. Tenancy from the certificate subject (`opc-tenant:` OU)
//! 3. `POST https://auth.{region}.oraclecloud.com/v1/x509`, signed with
//!    key id `{tenancy}/fed-x509-sha256/{fingerprint}`
//! 4. Sign API requests with key id `ST${token}` and the session key

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::AUTHORIZATION;
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::signer::{HttpSignatureSigner, RequestSigner};
use super::{AuthError, CredentialSource, KeyProvider, StaticKeyProvider};
use crate::constants::{METADATA_BASE_URL, USER_AGENT, federation_url};

/// Maximum time for each metadata or federation request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const METADATA_AUTHORIZATION: &str = "Bearer Oracle";

const SESSION_KEY_BITS: usize = 2048;

/// Region short codes the metadata service may return.
const REGION_SHORT_CODES: &[(&str, &str)] = &[
    ("phx", "us-phoenix-1"),
    ("iad", "us-ashburn-1"),
    ("sjc", "us-sanjose-1"),
    ("ord", "us-chicago-1"),
    ("yyz", "ca-toronto-1"),
    ("yul", "ca-montreal-1"),
    ("fra", "eu-frankfurt-1"),
    ("ams", "eu-amsterdam-1"),
    ("zrh", "eu-zurich-1"),
    ("mrs", "eu-marseille-1"),
    ("lin", "eu-milan-1"),
    ("arn", "eu-stockholm-1"),
    ("cdg", "eu-paris-1"),
    ("mad", "eu-madrid-1"),
    ("lhr", "uk-london-1"),
    ("cwl", "uk-cardiff-1"),
    ("nrt", "ap-tokyo-1"),
    ("kix", "ap-osaka-1"),
    ("icn", "ap-seoul-1"),
    ("yny", "ap-chuncheon-1"),
    ("bom", "ap-mumbai-1"),
    ("hyd", "ap-hyderabad-1"),
    ("syd", "ap-sydney-1"),
    ("mel", "ap-melbourne-1"),
    ("sin", "ap-singapore-1"),
    ("gru", "sa-saopaulo-1"),
    ("vcp", "sa-vinhedo-1"),
    ("scl", "sa-santiago-1"),
    ("qro", "mx-queretaro-1"),
    ("jed", "me-jeddah-1"),
    ("dxb", "me-dubai-1"),
    ("mtz", "il-jerusalem-1"),
    ("jnb", "af-johannesburg-1"),
];

/// Credential source backed by the instance metadata service.
#[derive(Debug, Clone)]
pub struct InstancePrincipal {
    http: reqwest::Client,
    metadata_base: String,
    federation_url: Option<String>,
}

/// Body of the x509 federation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationRequest {
    pub certificate: String,
    pub public_key: String,
    pub intermediate_certificates: Vec<String>,
    pub purpose: &'static str,
    pub fingerprint_algorithm: &'static str,
}

#[derive(Debug, Deserialize)]
struct FederationResponse {
    token: String,
}

impl InstancePrincipal {
    pub fn new() -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(AuthError::HttpClient)?;
        Ok(Self {
            http,
            metadata_base: METADATA_BASE_URL.to_string(),
            federation_url: None,
        })
    }

    /// Point at a different metadata service (useful for testing).
    pub fn with_metadata_base(mut self, base: impl Into<String>) -> Self {
        self.metadata_base = base.into();
        self
    }

    /// Use a fixed federation endpoint instead of the regional one.
    pub fn with_federation_url(mut self, url: impl Into<String>) -> Self {
        self.federation_url = Some(url.into());
        self
    }

    async fn metadata(&self, path: &str) -> Result<String, AuthError> {
        let url = format!("{}/{path}", self.metadata_base.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, METADATA_AUTHORIZATION)
            .send()
            .await
            .map_err(|e| AuthError::Metadata {
                url: url.clone(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::MetadataStatus { url, status });
        }

        resp.text()
            .await
            .map_err(|e| AuthError::Metadata { url, source: e })
    }

    async fn federate(
        &self,
        region: &str,
        signer: &HttpSignatureSigner,
        body: &FederationRequest,
    ) -> Result<String, AuthError> {
        let url = self
            .federation_url
            .clone()
            .unwrap_or_else(|| federation_url(region));

        let mut request = self
            .http
            .post(&url)
            .json(body)
            .build()
            .map_err(|e| AuthError::Federation(format!("failed to build request: {e}")))?;
        signer
            .sign(&mut request)
            .map_err(|e| AuthError::Federation(e.to_string()))?;

        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|e| AuthError::Federation(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::Federation(format!(
                "{url} returned {status}: {text}"
            )));
        }

        let parsed: FederationResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Federation(format!("unexpected response from {url}: {e}")))?;
        if parsed.token.is_empty() {
            return Err(AuthError::Federation(format!("{url} returned an empty token")));
        }
        Ok(parsed.token)
    }
}

#[async_trait]
impl CredentialSource for InstancePrincipal {
    async fn key_provider(&self) -> Result<Arc<dyn KeyProvider>, AuthError> {
        let region = canonical_region(&self.metadata("instance/region").await?);
        let leaf_cert = self.metadata("identity/cert.pem").await?;
        let leaf_key = self.metadata("identity/key.pem").await?;
        let intermediate_cert = self.metadata("identity/intermediate.pem").await?;

        let leaf_der = certificate_der(&leaf_cert)?;
        let intermediate_der = certificate_der(&intermediate_cert)?;
        let tenancy = tenancy_from_certificate(&leaf_der)?;

        let federation_key_id = format!("{tenancy}/fed-x509-sha256/{}", fingerprint(&leaf_der));
        let federation_signer = HttpSignatureSigner::new(Arc::new(StaticKeyProvider::from_pem(
            federation_key_id,
            &leaf_key,
        )?));

        let session_key = RsaPrivateKey::new(&mut OsRng, SESSION_KEY_BITS)
            .map_err(|e| AuthError::PrivateKey(format!("failed to generate session key: {e}")))?;
        let body = federation_request(&leaf_der, &[intermediate_der], &session_key)?;

        let token = self.federate(&region, &federation_signer, &body).await?;
        debug!(%region, %tenancy, "obtained instance principal security token");

        Ok(Arc::new(StaticKeyProvider::new(
            format!("ST${token}"),
            session_key,
        )))
    }
}

/// Expand a region short code (`phx`) to its identifier (`us-phoenix-1`).
pub fn canonical_region(raw: &str) -> String {
    let region = raw.trim().to_lowercase();
    REGION_SHORT_CODES
        .iter()
        .find(|(code, _)| *code == region)
        .map(|(_, name)| name.to_string())
        .unwrap_or(region)
}

/// DER bytes of the first certificate in a PEM document.
pub fn certificate_der(pem: &str) -> Result<Vec<u8>, AuthError> {
    let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| AuthError::Certificate(format!("not a PEM certificate: {e}")))?;
    Ok(parsed.contents)
}

/// Colon-separated lowercase SHA-256 fingerprint of a DER certificate.
pub fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Tenancy OCID from the certificate subject.
///
/// Instance certificates carry it as `OU=opc-tenant:<ocid>`; older ones
/// use `O=opc-identity:<ocid>`.
pub fn tenancy_from_certificate(der: &[u8]) -> Result<String, AuthError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| AuthError::Certificate(e.to_string()))?;
    let subject = cert.subject();

    let from_ou = subject
        .iter_organizational_unit()
        .filter_map(|attr| attr.as_str().ok())
        .find_map(|value| value.strip_prefix("opc-tenant:"));
    let from_o = || {
        subject
            .iter_organization()
            .filter_map(|attr| attr.as_str().ok())
            .find_map(|value| value.strip_prefix("opc-identity:"))
    };

    from_ou
        .or_else(from_o)
        .map(str::to_string)
        .ok_or_else(|| {
            AuthError::Certificate("no tenancy (opc-tenant) in certificate subject".to_string())
        })
}

/// Build the federation request for a leaf certificate and session key.
pub fn federation_request(
    leaf_der: &[u8],
    intermediates: &[Vec<u8>],
    session_key: &RsaPrivateKey,
) -> Result<FederationRequest, AuthError> {
    let public_key = session_key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| AuthError::PrivateKey(format!("failed to encode session key: {e}")))?;

    Ok(FederationRequest {
        certificate: STANDARD.encode(leaf_der),
        public_key: STANDARD.encode(public_key.as_bytes()),
        intermediate_certificates: intermediates.iter().map(|d| STANDARD.encode(d)).collect(),
        purpose: "DEFAULT",
        fingerprint_algorithm: "SHA256",
    })
}
