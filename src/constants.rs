//! App-wide constants.
//!
//! Centralises the tool name, config keys, environment variable names,
//! and endpoint templates so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "cloudshell-provider";

/// Crate version, as reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent sent with every request the crate makes itself.
pub const USER_AGENT: &str = concat!("cloudshell-provider/", env!("CARGO_PKG_VERSION"));

/// Directory name under `~/.config/` for the global context file.
pub const CONFIG_DIR: &str = "cloudshell-provider";

/// Global context filename inside [`CONFIG_DIR`].
pub const CONTEXT_FILENAME: &str = "context.toml";

/// Functions API endpoint, `{region}` is replaced with the resolved region.
pub const FUNCTIONS_API_URL_TEMPLATE: &str = "https://functions.{region}.oci.oraclecloud.com";

/// Where Cloud Shell mounts the delegation token. Profiles cannot override it yet.
pub const DEFAULT_DELEGATION_TOKEN_FILE: &str = "/etc/oci/delegation_token";

// ── Config source keys ──────────────────────────────────────────────

pub const CFG_PROFILE: &str = "oracle.profile";
pub const CFG_API_URL: &str = "api-url";
pub const CFG_COMPARTMENT_ID: &str = "oracle.compartment-id";
pub const CFG_DISABLE_CERTS: &str = "oracle.disable-certs";

// ── Profile file keys ───────────────────────────────────────────────

pub const PROFILE_KEY_REGION: &str = "region";
pub const PROFILE_KEY_TENANCY: &str = "tenancy";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROFILE: &str = "OCI_CLI_PROFILE";
pub const ENV_REGION: &str = "OCI_CLI_REGION";
pub const ENV_TENANCY: &str = "OCI_CLI_TENANCY";
pub const ENV_DELEGATION_TOKEN_FILE: &str = "OCI_CLI_DELEGATION_TOKEN_FILE";
pub const ENV_CONFIG_FILE: &str = "OCI_CLI_CONFIG_FILE";

// ── Instance principal endpoints ────────────────────────────────────

/// Base URL of the instance metadata service (v2).
pub const METADATA_BASE_URL: &str = "http://169.254.169.254/opc/v2";

/// Federation endpoint, `{region}` is replaced with the instance region.
pub const FEDERATION_URL_TEMPLATE: &str = "https://auth.{region}.oraclecloud.com/v1/x509";

/// Render the Functions API URL for a region.
pub fn functions_api_url(region: &str) -> String {
    FUNCTIONS_API_URL_TEMPLATE.replace("{region}", region)
}

/// Render the federation endpoint for a region.
pub fn federation_url(region: &str) -> String {
    FEDERATION_URL_TEMPLATE.replace("{region}", region)
}
