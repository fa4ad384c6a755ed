//! Signer and interceptor construction for a key provider.

use std::fmt;
use std::sync::Arc;

use reqwest::Request;
use reqwest::header::{HeaderName, HeaderValue};

use super::signer::{HEADER_OBO_TOKEN, HttpSignatureSigner, RequestSigner, SignError};
use super::{AuthError, KeyProvider};

/// Hook run on every outgoing request before it is signed.
pub type RequestInterceptor = Arc<dyn Fn(&mut Request) -> Result<(), SignError> + Send + Sync>;

/// An interceptor that leaves requests untouched.
pub fn passthrough_interceptor() -> RequestInterceptor {
    Arc::new(|_request: &mut Request| -> Result<(), SignError> { Ok(()) })
}

/// The signing half of an API client: what every request goes through
/// before it is dispatched.
#[derive(Clone)]
pub struct SdkClient {
    pub signer: Arc<dyn RequestSigner>,
    pub interceptor: RequestInterceptor,
}

impl SdkClient {
    /// Build a client that signs with `key_provider` and forwards `obo_token`.
    ///
    /// An empty `obo_token` yields a pass-through interceptor; otherwise
    /// the interceptor sets `opc-obo-token` on each request.
    pub fn with_obo_token(
        key_provider: Arc<dyn KeyProvider>,
        obo_token: &str,
    ) -> Result<Self, AuthError> {
        if key_provider.key_id().trim().is_empty() {
            return Err(AuthError::InvalidKeyProvider("key id is empty".to_string()));
        }

        let interceptor: RequestInterceptor = if obo_token.is_empty() {
            passthrough_interceptor()
        } else {
            let value = HeaderValue::from_str(obo_token).map_err(|e| {
                AuthError::InvalidKeyProvider(format!("OBO token is not a valid header value: {e}"))
            })?;
            Arc::new(move |request: &mut Request| -> Result<(), SignError> {
                request
                    .headers_mut()
                    .insert(HeaderName::from_static(HEADER_OBO_TOKEN), value.clone());
                Ok(())
            })
        };

        Ok(Self {
            signer: Arc::new(HttpSignatureSigner::new(key_provider)),
            interceptor,
        })
    }
}

impl fmt::Debug for SdkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkClient").finish_non_exhaustive()
    }
}
