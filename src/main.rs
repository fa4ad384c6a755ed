//! cloudshell-provider: OCI Cloud Shell endpoint and signing resolution.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! error propagation and user-facing messages.

mod cli;

use cloudshell_provider::config::LayeredConfig;
use cloudshell_provider::profile::NoPassphrase;
use cloudshell_provider::provider::Resolver;

use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use reqwest::{Method, Request};
use tracing_subscriber::EnvFilter;

use cli::args::{Cli, Command, OutputFormat, SignArgs};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = LayeredConfig::load(cli.flags_layer(), cli.context.as_deref())
        .context("failed to load configuration")?;
    let resolver = Resolver::instance_principal()?;

    match cli.command {
        Command::Show(args) => run_show(&resolver, &config, args.format),
        Command::Verify => run_verify(&resolver, &config).await,
        Command::Sign(args) => run_sign(&resolver, &config, args).await,
    }
}

type CloudShellResolver = Resolver<cloudshell_provider::auth::InstancePrincipal>;

/// Print the settings resolution would use, without credentials.
fn run_show(
    resolver: &CloudShellResolver,
    config: &LayeredConfig,
    format: OutputFormat,
) -> Result<()> {
    let settings = resolver
        .settings(config, &NoPassphrase)
        .context("failed to resolve Cloud Shell settings")?;

    match format {
        OutputFormat::Text => print!("{}", cli::render_settings(&settings)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&settings)?),
    }
    Ok(())
}

/// Resolve a full provider and report what it will sign as.
async fn run_verify(resolver: &CloudShellResolver, config: &LayeredConfig) -> Result<()> {
    let handle = resolver
        .resolve(config, &NoPassphrase)
        .await
        .context("failed to resolve Cloud Shell provider")?;

    println!("{} {}", "✓".green().bold(), "credentials resolved".bold());
    println!(
        "  {:<13}{}",
        "key id:".cyan(),
        cli::key_id_prefix(handle.signer.key_id())
    );
    println!("  {:<13}{}", "api url:".cyan(), handle.api_url);
    println!("  {:<13}{}", "compartment:".cyan(), handle.compartment_id);
    if handle.disable_certs {
        println!("  {}", "TLS certificate validation is disabled".yellow());
    }
    Ok(())
}

/// Sign a request with the resolved provider and print its headers.
async fn run_sign(
    resolver: &CloudShellResolver,
    config: &LayeredConfig,
    args: SignArgs,
) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;
    if args.body.is_some() && matches!(method, Method::GET | Method::HEAD | Method::DELETE) {
        bail!("--body is not allowed for {method} requests");
    }

    let handle = resolver
        .resolve(config, &NoPassphrase)
        .await
        .context("failed to resolve Cloud Shell provider")?;
    let url = handle.endpoint(&args.url)?;

    let mut request = Request::new(method, url);
    if let Some(body) = args.body {
        *request.body_mut() = Some(body.into());
    }
    handle.prepare(&mut request).context("failed to sign request")?;

    println!("{} {}", request.method(), request.url());
    for (name, value) in request.headers() {
        let value = value.to_str().unwrap_or("<binary>");
        println!("{}: {}", name.as_str().cyan(), value);
    }
    Ok(())
}
