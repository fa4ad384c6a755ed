//! Profile-based seed values for Cloud Shell resolution.
//!
//! A named profile in the OCI config file (located through
//! `OCI_CLI_CONFIG_FILE`) provides the initial region and tenancy. The
//! delegation token path is never read from the profile.

pub mod parser;

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::constants::{
    DEFAULT_DELEGATION_TOKEN_FILE, ENV_CONFIG_FILE, PROFILE_KEY_REGION, PROFILE_KEY_TENANCY,
};
use crate::env::Env;

pub use parser::{Profile, ProfileFile, ProfileParseError};

/// Errors from loading a profile or extracting values from it.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse profile file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: ProfileParseError,
    },

    #[error("can not read {key} from configuration: no profile file found (set OCI_CLI_CONFIG_FILE)")]
    NoConfiguration { key: &'static str },

    #[error(
        "can not read {key} from configuration: {path} does not contain profile '{profile}' (available: {available})"
    )]
    MissingProfile {
        key: &'static str,
        profile: String,
        path: PathBuf,
        available: String,
    },

    #[error("can not read {key} from configuration: profile '{profile}' in {path} has no value")]
    MissingKey {
        key: &'static str,
        profile: String,
        path: PathBuf,
    },
}

/// The three values Cloud Shell authentication needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub tenancy_id: String,
    pub region: String,
    pub delegation_token_file: String,
}

/// Supplies a passphrase for an encrypted private key.
pub trait PassphraseSource: Send + Sync {
    /// Passphrase for the key identified by `key_id`, if one is available.
    fn passphrase(&self, key_id: &str) -> Option<String>;
}

/// A [`PassphraseSource`] that never has a passphrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassphrase;

impl PassphraseSource for NoPassphrase {
    fn passphrase(&self, _key_id: &str) -> Option<String> {
        None
    }
}

/// Where profile lookups are answered from.
///
/// `Unset` stands in when no profile file exists. Every lookup on it fails,
/// which surfaces the missing file when a value is first extracted.
#[derive(Debug, Clone)]
pub enum ProfileSource {
    Unset,
    File {
        path: PathBuf,
        profile: String,
        contents: ProfileFile,
    },
}

impl ProfileSource {
    /// Read and parse `path` if it exists, selecting `profile`.
    pub fn open(path: Option<PathBuf>, profile: &str) -> Result<Self, ProfileError> {
        let Some(path) = path.filter(|p| p.is_file()) else {
            debug!(profile, "no profile file, using unset configuration");
            return Ok(Self::Unset);
        };

        let content = std::fs::read_to_string(&path).map_err(|e| ProfileError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let contents = ProfileFile::parse(&content).map_err(|e| ProfileError::ParseFile {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = %path.display(), profile, "loaded profile file");
        Ok(Self::File {
            path,
            profile: profile.to_string(),
            contents,
        })
    }

    fn value(&self, key: &'static str) -> Result<String, ProfileError> {
        match self {
            Self::Unset => Err(ProfileError::NoConfiguration { key }),
            Self::File {
                path,
                profile,
                contents,
            } => {
                let section =
                    contents
                        .profile(profile)
                        .ok_or_else(|| ProfileError::MissingProfile {
                            key,
                            profile: profile.clone(),
                            path: path.clone(),
                            available: available_profiles(contents),
                        })?;
                section
                    .get(key)
                    .map(str::to_string)
                    .ok_or_else(|| ProfileError::MissingKey {
                        key,
                        profile: profile.clone(),
                        path: path.clone(),
                    })
            }
        }
    }

    pub fn region(&self) -> Result<String, ProfileError> {
        self.value(PROFILE_KEY_REGION)
    }

    pub fn tenancy_ocid(&self) -> Result<String, ProfileError> {
        self.value(PROFILE_KEY_TENANCY)
    }
}

fn available_profiles(contents: &ProfileFile) -> String {
    let names = contents.profile_names();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Load the seed [`ResolvedConfig`] for `profile_name`.
///
/// A missing profile file is not an error here; the first extraction fails
/// instead, with the same error type a malformed file would produce.
///
/// Deprecated: `_passphrase` is inert, since the delegation-token flow never
/// decrypts a private key. It is kept only for forward compatibility with
/// existing callers and is slated for removal.
pub fn load_profile(
    profile_name: &str,
    _passphrase: &dyn PassphraseSource,
    env: &Env,
) -> Result<ResolvedConfig, ProfileError> {
    let path = env.non_empty(ENV_CONFIG_FILE).map(PathBuf::from);
    let source = ProfileSource::open(path, profile_name)?;

    let region = source.region()?;
    let tenancy_id = source.tenancy_ocid()?;

    Ok(ResolvedConfig {
        tenancy_id,
        region,
        delegation_token_file: DEFAULT_DELEGATION_TOKEN_FILE.to_string(),
    })
}
