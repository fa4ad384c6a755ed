//! Clap argument types and the flag configuration layer.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use cloudshell_provider::config::ConfigLayer;
use cloudshell_provider::constants::{
    CFG_API_URL, CFG_COMPARTMENT_ID, CFG_DISABLE_CERTS, CFG_PROFILE,
};

/// Resolve OCI Cloud Shell endpoint and request-signing configuration.
#[derive(Parser, Debug)]
#[command(
    name = "cloudshell-provider",
    version = cloudshell_provider::constants::VERSION,
    about = "Resolve OCI Cloud Shell endpoint and request-signing configuration"
)]
pub struct Cli {
    /// OCI config profile to seed region and tenancy from (overridden by OCI_CLI_PROFILE).
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Explicit API URL instead of the regional Functions endpoint.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Compartment to operate in (default: the tenancy).
    #[arg(long, global = true, value_name = "OCID")]
    pub compartment_id: Option<String>,

    /// Skip TLS certificate validation for API calls.
    #[arg(long, global = true, default_value_t = false)]
    pub disable_certs: bool,

    /// Context file (default: ~/.config/cloudshell-provider/context.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub context: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Show resolved settings without contacting the credential service.
    Show(ShowArgs),

    /// Resolve credentials and report the signing identity.
    Verify,

    /// Sign a request and print its headers.
    Sign(SignArgs),
}

/// Arguments for the `show` subcommand.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// HTTP method (GET, POST, ...).
    pub method: String,

    /// Absolute URL, or a path resolved against the API URL.
    pub url: String,

    /// Request body (sent as application/json).
    #[arg(long)]
    pub body: Option<String>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Highest-priority config layer, built from the global flags.
    ///
    /// `--disable-certs` only enters the layer when given, so a context
    /// file can still enable it.
    pub fn flags_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::new("flags");
        layer.set_opt(CFG_PROFILE, self.profile.clone());
        layer.set_opt(CFG_API_URL, self.api_url.clone());
        layer.set_opt(CFG_COMPARTMENT_ID, self.compartment_id.clone());
        if self.disable_certs {
            layer.set(CFG_DISABLE_CERTS, "true");
        }
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cloudshell-provider").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn show_defaults_to_text() {
        let cli = parse(&["show"]);
        match cli.command {
            Command::Show(args) => assert_eq!(args.format, OutputFormat::Text),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["show", "--format", "json", "--profile", "CS", "--disable-certs"]);
        assert_eq!(cli.profile.as_deref(), Some("CS"));
        assert!(cli.disable_certs);
    }

    #[test]
    fn flags_layer_only_contains_given_flags() {
        let cli = parse(&["--api-url", "http://localhost:8080", "verify"]);
        let layer = cli.flags_layer();
        assert_eq!(layer.name(), "flags");
        assert_eq!(layer.get(CFG_API_URL), Some("http://localhost:8080"));
        assert_eq!(layer.get(CFG_PROFILE), None);
        assert_eq!(layer.get(CFG_DISABLE_CERTS), None);
    }

    #[test]
    fn disable_certs_flag_sets_true() {
        let cli = parse(&["--disable-certs", "verify"]);
        assert_eq!(cli.flags_layer().get(CFG_DISABLE_CERTS), Some("true"));
    }

    #[test]
    fn sign_takes_method_url_and_body() {
        let cli = parse(&["sign", "POST", "/20181201/applications", "--body", "{}"]);
        match cli.command {
            Command::Sign(args) => {
                assert_eq!(args.method, "POST");
                assert_eq!(args.url, "/20181201/applications");
                assert_eq!(args.body.as_deref(), Some("{}"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = Cli::try_parse_from(["cloudshell-provider", "show", "--format", "yaml"]);
        assert!(result.is_err());
    }
}
