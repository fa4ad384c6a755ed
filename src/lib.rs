//! cloudshell-provider: endpoint and request-signing configuration for
//! CLIs running inside OCI Cloud Shell (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod auth;
pub mod config;
pub mod constants;
pub mod env;
pub mod profile;
pub mod provider;
