//! Ordered setting layers for region, tenancy and delegation token file.
//!
//! Each layer answers for some subset of [`Setting`]s. The resolver asks
//! the layers in priority order and takes the first non-empty answer.

use std::fmt;

use tracing::debug;

use super::ProviderError;
use crate::constants::{ENV_DELEGATION_TOKEN_FILE, ENV_REGION, ENV_TENANCY};
use crate::env::Env;
use crate::profile::ResolvedConfig;

/// A required value of the Cloud Shell configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Region,
    Tenancy,
    DelegationTokenFile,
}

impl Setting {
    /// Environment variable that overrides this setting.
    pub fn env_var(self) -> &'static str {
        match self {
            Setting::Region => ENV_REGION,
            Setting::Tenancy => ENV_TENANCY,
            Setting::DelegationTokenFile => ENV_DELEGATION_TOKEN_FILE,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Region => write!(f, "region"),
            Setting::Tenancy => write!(f, "tenancy ID"),
            Setting::DelegationTokenFile => write!(f, "delegation token filepath"),
        }
    }
}

/// One named source of settings.
pub trait SettingLayer {
    fn name(&self) -> &str;

    /// Value for `setting`, or `None` if this layer has none.
    fn get(&self, setting: Setting) -> Option<String>;
}

/// Environment overrides (`OCI_CLI_REGION` and friends).
#[derive(Debug, Clone)]
pub struct EnvLayer<'a> {
    env: &'a Env,
}

impl<'a> EnvLayer<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }
}

impl SettingLayer for EnvLayer<'_> {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, setting: Setting) -> Option<String> {
        self.env.non_empty(setting.env_var())
    }
}

/// Values seeded from a profile (or empty when no profile is active).
#[derive(Debug, Clone, Default)]
pub struct ProfileLayer {
    name: String,
    config: ResolvedConfig,
}

impl ProfileLayer {
    pub fn new(name: impl Into<String>, config: ResolvedConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Layer used when no profile is selected.
    pub fn empty() -> Self {
        Self::new("profile", ResolvedConfig::default())
    }
}

impl SettingLayer for ProfileLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, setting: Setting) -> Option<String> {
        let value = match setting {
            Setting::Region => &self.config.region,
            Setting::Tenancy => &self.config.tenancy_id,
            Setting::DelegationTokenFile => &self.config.delegation_token_file,
        };
        Some(value.clone()).filter(|v| !v.is_empty())
    }
}

/// First non-empty value for `setting` across `layers`, highest priority first.
pub fn resolve_setting(
    layers: &[&dyn SettingLayer],
    setting: Setting,
) -> Result<String, ProviderError> {
    for layer in layers {
        if let Some(value) = layer.get(setting) {
            debug!(setting = %setting, layer = layer.name(), "setting resolved");
            return Ok(value);
        }
    }
    Err(ProviderError::MissingValue { setting })
}

/// Resolve all three settings in order, stopping at the first missing one.
pub fn resolve_all(layers: &[&dyn SettingLayer]) -> Result<ResolvedConfig, ProviderError> {
    let region = resolve_setting(layers, Setting::Region)?;
    let tenancy_id = resolve_setting(layers, Setting::Tenancy)?;
    let delegation_token_file = resolve_setting(layers, Setting::DelegationTokenFile)?;
    Ok(ResolvedConfig {
        tenancy_id,
        region,
        delegation_token_file,
    })
}
