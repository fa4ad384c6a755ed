//! Environment variable abstraction for testability.
//!
//! Production code uses [`Env::real()`] which delegates to [`std::env::var`].
//! Tests use [`Env::from_vars()`] backed by a `HashMap`, so resolution can be
//! exercised without mutating the process environment.

use std::collections::HashMap;

/// Environment variable reader.
///
/// Cloud Shell exports its overrides as plain variables, and an exported
/// but empty variable means "not set". [`Env::non_empty`] encodes that rule.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Create an `Env` that reads from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Create an `Env` backed by explicit key-value pairs.
    pub fn from_vars(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// An environment with no variables at all.
    pub fn empty() -> Self {
        Self {
            overrides: Some(HashMap::new()),
        }
    }

    /// Look up an environment variable by name.
    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.overrides {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// Look up a variable, treating an empty value the same as an unset one.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).ok().filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_env_reads_cargo_manifest_dir() {
        let env = Env::real();
        assert!(env.var("CARGO_MANIFEST_DIR").is_ok());
    }

    #[test]
    fn from_vars_returns_set_values() {
        let env = Env::from_vars([("OCI_CLI_REGION", "us-phoenix-1")]);
        assert_eq!(env.var("OCI_CLI_REGION").unwrap(), "us-phoenix-1");
        assert!(env.var("OCI_CLI_TENANCY").is_err());
    }

    #[test]
    fn empty_value_is_not_set() {
        let env = Env::from_vars([("OCI_CLI_PROFILE", "")]);
        assert!(env.var("OCI_CLI_PROFILE").is_ok());
        assert_eq!(env.non_empty("OCI_CLI_PROFILE"), None);
    }

    #[test]
    fn empty_env_has_nothing() {
        let env = Env::empty();
        assert!(env.var("HOME").is_err());
        assert_eq!(env.non_empty("HOME"), None);
    }
}
