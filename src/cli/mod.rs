//! CLI command definitions and output helpers.
//!
//! Uses clap derive macros for argument definitions.

pub mod args;

use colored::Colorize;

use cloudshell_provider::provider::ProviderSettings;

/// Number of key id characters shown by `verify`. Session key ids embed a
/// bearer token, so the rest is elided.
pub const KEY_ID_PREFIX_LEN: usize = 12;

/// Human-readable rendering of resolved settings.
pub fn render_settings(settings: &ProviderSettings) -> String {
    let profile = if settings.profile.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        settings.profile.clone()
    };
    let disable_certs = if settings.disable_certs {
        "yes".yellow().to_string()
    } else {
        "no".to_string()
    };

    let rows = [
        ("profile:", profile),
        ("region:", settings.region.clone()),
        ("tenancy:", settings.tenancy_id.clone()),
        ("token file:", settings.delegation_token_file.clone()),
        ("api url:", settings.api_url.to_string()),
        ("compartment:", settings.compartment_id.clone()),
        ("disable certs:", disable_certs),
    ];

    let mut out = String::new();
    for (label, value) in rows {
        out.push_str(&format!("  {:<15}{}\n", label.cyan(), value));
    }
    out
}

/// Shorten a key id for display.
pub fn key_id_prefix(key_id: &str) -> String {
    match key_id.char_indices().nth(KEY_ID_PREFIX_LEN) {
        Some((idx, _)) => format!("{}...", &key_id[..idx]),
        None => key_id.to_string(),
    }
}
