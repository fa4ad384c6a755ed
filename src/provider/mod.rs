//! Cloud Shell provider resolution.
//!
//! Turns a layered configuration plus the process environment into a
//! [`ProviderHandle`]: the API endpoint, compartment scope and a request
//! signer backed by the ambient instance credentials.

pub mod endpoint;
pub mod layers;

use std::fmt;
use std::sync::Arc;

use reqwest::Request;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::auth::{
    AuthError, CredentialSource, InstancePrincipal, RequestInterceptor, RequestSigner, SdkClient,
    SignError,
};
use crate::config::ConfigSource;
use crate::constants::{
    CFG_API_URL, CFG_COMPARTMENT_ID, CFG_DISABLE_CERTS, CFG_PROFILE, ENV_PROFILE, USER_AGENT,
};
use crate::env::Env;
use crate::profile::{self, PassphraseSource, ProfileError};

pub use endpoint::{canonical_api_url, select_api_url};
pub use layers::{EnvLayer, ProfileLayer, Setting, SettingLayer};

/// Errors from resolving a provider. None of them are retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("could not derive {setting} from either config or environment (set {})", .setting.env_var())]
    MissingValue { setting: Setting },

    #[error("failed to load profile configuration: {0}")]
    ConfigLoad(#[from] ProfileError),

    #[error("invalid API URL '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("failed to obtain Cloud Shell credentials: {0}")]
    Credential(#[from] AuthError),
}

/// Everything resolution decides before credentials are involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSettings {
    /// Active profile name, empty when none was selected.
    pub profile: String,
    pub region: String,
    pub tenancy_id: String,
    pub delegation_token_file: String,
    pub api_url: Url,
    pub compartment_id: String,
    pub disable_certs: bool,
}

/// An authenticated provider, owned by the caller for the session.
#[derive(Clone)]
pub struct ProviderHandle {
    pub api_url: Url,
    pub signer: Arc<dyn RequestSigner>,
    pub interceptor: RequestInterceptor,
    pub disable_certs: bool,
    pub compartment_id: String,
}

impl ProviderHandle {
    /// HTTP client for dispatching requests built from this handle.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.disable_certs)
            .build()
    }

    /// Run the interceptor, then sign. Headers the interceptor adds are
    /// covered by the signature.
    pub fn prepare(&self, request: &mut Request) -> Result<(), SignError> {
        (self.interceptor)(request)?;
        self.signer.sign(request)
    }

    /// Resolve `path` against the API URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_url.join(path).map_err(|e| ProviderError::Url {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("api_url", &self.api_url.as_str())
            .field("disable_certs", &self.disable_certs)
            .field("compartment_id", &self.compartment_id)
            .finish_non_exhaustive()
    }
}

/// Resolves providers against an injected credential source.
pub struct Resolver<C> {
    credentials: C,
    env: Env,
}

impl Resolver<InstancePrincipal> {
    /// Production wiring: real environment, instance metadata credentials.
    pub fn instance_principal() -> Result<Self, ProviderError> {
        Ok(Self::new(InstancePrincipal::new()?, Env::real()))
    }
}

impl<C> Resolver<C> {
    pub fn new(credentials: C, env: Env) -> Self {
        Self { credentials, env }
    }

    /// Resolve everything up to, but not including, credentials.
    ///
    /// `passphrase` is forwarded to [`profile::load_profile`], which ignores
    /// it; it is kept for forward compatibility and slated for removal.
    pub fn settings(
        &self,
        config: &dyn ConfigSource,
        passphrase: &dyn PassphraseSource,
    ) -> Result<ProviderSettings, ProviderError> {
        let profile = self
            .env
            .non_empty(ENV_PROFILE)
            .unwrap_or_else(|| config.get_string(CFG_PROFILE));

        let profile_layer = if profile.is_empty() {
            debug!("no profile selected");
            ProfileLayer::empty()
        } else {
            debug!(%profile, "loading profile");
            let seed = profile::load_profile(&profile, passphrase, &self.env)?;
            ProfileLayer::new(format!("profile:{profile}"), seed)
        };

        let env_layer = EnvLayer::new(&self.env);
        let chain: [&dyn SettingLayer; 2] = [&env_layer, &profile_layer];
        let resolved = layers::resolve_all(&chain)?;

        let api_url = canonical_api_url(&select_api_url(
            &config.get_string(CFG_API_URL),
            &resolved.region,
        ))?;
        debug!(api_url = %api_url, "API URL resolved");

        let compartment_id = Some(config.get_string(CFG_COMPARTMENT_ID))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| resolved.tenancy_id.clone());

        Ok(ProviderSettings {
            profile,
            region: resolved.region,
            tenancy_id: resolved.tenancy_id,
            delegation_token_file: resolved.delegation_token_file,
            api_url,
            compartment_id,
            disable_certs: config.get_bool(CFG_DISABLE_CERTS),
        })
    }
}

impl<C: CredentialSource> Resolver<C> {
    /// Resolve a full [`ProviderHandle`].
    ///
    /// The credential source is only consulted once every setting is
    /// present and the API URL is valid.
    pub async fn resolve(
        &self,
        config: &dyn ConfigSource,
        passphrase: &dyn PassphraseSource,
    ) -> Result<ProviderHandle, ProviderError> {
        let settings = self.settings(config, passphrase)?;

        let key_provider = self.credentials.key_provider().await?;
        let client = SdkClient::with_obo_token(key_provider, "")?;

        Ok(ProviderHandle {
            api_url: settings.api_url,
            signer: client.signer,
            interceptor: client.interceptor,
            disable_certs: settings.disable_certs,
            compartment_id: settings.compartment_id,
        })
    }
}

/// Resolve a provider using instance principal credentials and the real
/// process environment.
pub async fn new_cloud_shell_provider(
    config: &dyn ConfigSource,
    passphrase: &dyn PassphraseSource,
) -> Result<ProviderHandle, ProviderError> {
    Resolver::instance_principal()?
        .resolve(config, passphrase)
        .await
}
