//! OCI HTTP request signatures.
//!
//! Implements version 1 of the OCI signing scheme (draft-cavage HTTP
//! signatures with `rsa-sha256`). Every request signs `date`,
//! `(request-target)` and `host`. Requests with a body (POST, PUT, PATCH)
//! also sign `content-length`, `content-type` and `x-content-sha256`.
//! An `opc-obo-token` header is signed when present.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HOST, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Method, Request, Url};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::KeyProvider;

pub const HEADER_CONTENT_SHA256: &str = "x-content-sha256";
pub const HEADER_OBO_TOKEN: &str = "opc-obo-token";

const REQUEST_TARGET: &str = "(request-target)";
const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Errors from signing a request.
#[derive(Error, Debug)]
pub enum SignError {
    #[error("request URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid value for header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("cannot sign {0} request with a streaming body")]
    StreamingBody(Method),

    #[error("failed to sign request: {0}")]
    Signing(String),
}

/// Attaches authentication material to outgoing requests.
pub trait RequestSigner: Send + Sync {
    /// Identity placed in the `keyId` signature parameter.
    fn key_id(&self) -> &str;

    fn sign(&self, request: &mut Request) -> Result<(), SignError>;
}

/// Signs requests with the key of a [`KeyProvider`].
#[derive(Debug, Clone)]
pub struct HttpSignatureSigner {
    key_provider: Arc<dyn KeyProvider>,
}

impl HttpSignatureSigner {
    pub fn new(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self { key_provider }
    }

    fn sign_bytes(&self, data: &[u8]) -> Result<String, SignError> {
        let signing_key = SigningKey::<Sha256>::new(self.key_provider.private_key().clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| SignError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

impl RequestSigner for HttpSignatureSigner {
    fn key_id(&self) -> &str {
        self.key_provider.key_id()
    }

    fn sign(&self, request: &mut Request) -> Result<(), SignError> {
        let method = request.method().clone();
        let url = request.url().clone();
        let host = host_header(&url)?;

        let body = if has_body(&method) {
            let bytes = match request.body() {
                None => Vec::new(),
                Some(body) => body
                    .as_bytes()
                    .ok_or_else(|| SignError::StreamingBody(method.clone()))?
                    .to_vec(),
            };
            Some(bytes)
        } else {
            None
        };

        let headers = request.headers_mut();
        if !headers.contains_key(DATE) {
            headers.insert(DATE, header_value(DATE.as_str(), &http_date(Utc::now()))?);
        }
        if !headers.contains_key(HOST) {
            headers.insert(HOST, header_value(HOST.as_str(), &host)?);
        }

        let mut signed = vec!["date", REQUEST_TARGET, "host"];

        if let Some(body) = &body {
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
            }
            if !headers.contains_key(HEADER_CONTENT_SHA256) {
                let digest = STANDARD.encode(Sha256::digest(body));
                headers.insert(
                    HeaderName::from_static(HEADER_CONTENT_SHA256),
                    header_value(HEADER_CONTENT_SHA256, &digest)?,
                );
            }
            signed.extend(["content-length", "content-type", HEADER_CONTENT_SHA256]);
        }

        if headers.contains_key(HEADER_OBO_TOKEN) {
            signed.push(HEADER_OBO_TOKEN);
        }

        let to_sign = signing_string(&method, &url, headers, &signed)?;
        let signature = self.sign_bytes(to_sign.as_bytes())?;

        let authorization = format!(
            "Signature version=\"1\",headers=\"{}\",keyId=\"{}\",algorithm=\"rsa-sha256\",signature=\"{}\"",
            signed.join(" "),
            self.key_id(),
            signature,
        );
        headers.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &authorization)?);

        Ok(())
    }
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// `Host` header value: host plus any non-default port.
fn host_header(url: &Url) -> Result<String, SignError> {
    let host = url
        .host_str()
        .ok_or_else(|| SignError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, SignError> {
    HeaderValue::from_str(value).map_err(|e| SignError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// RFC 7231 date, as the `date` header expects.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the newline-joined `name: value` string covered by the signature.
pub(crate) fn signing_string(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    signed: &[&str],
) -> Result<String, SignError> {
    let mut lines = Vec::with_capacity(signed.len());
    for name in signed {
        if *name == REQUEST_TARGET {
            let mut target = url.path().to_string();
            if let Some(query) = url.query() {
                target.push('?');
                target.push_str(query);
            }
            lines.push(format!(
                "{REQUEST_TARGET}: {} {target}",
                method.as_str().to_lowercase()
            ));
            continue;
        }
        let value = headers
            .get(*name)
            .ok_or_else(|| SignError::InvalidHeader {
                name: name.to_string(),
                reason: "header missing".to_string(),
            })?
            .to_str()
            .map_err(|e| SignError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        lines.push(format!("{name}: {value}"));
    }
    Ok(lines.join("\n"))
}
