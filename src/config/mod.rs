//! Layered configuration lookup.
//!
//! The CLI's settings come from several named layers (flags, a context
//! file) queried in priority order. The resolver only sees the
//! [`ConfigSource`] trait, so callers can plug in any backing store.

pub mod loader;

pub use loader::{ConfigError, ConfigLayer, LayeredConfig};

/// Read-only key lookup over a layered configuration.
///
/// Unset keys read as an empty string or `false`, never as an error.
pub trait ConfigSource: Send + Sync {
    /// String value for `key`, or `""` when no layer sets it.
    fn get_string(&self, key: &str) -> String;

    /// Boolean value for `key`, or `false` when unset or unparseable.
    fn get_bool(&self, key: &str) -> bool;
}
