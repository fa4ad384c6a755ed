//! API URL selection and canonicalization.

use url::Url;

use super::ProviderError;
use crate::constants::functions_api_url;

/// The configured URL verbatim, or the regional Functions endpoint.
pub fn select_api_url(configured: &str, region: &str) -> String {
    if configured.is_empty() {
        functions_api_url(region)
    } else {
        configured.to_string()
    }
}

/// Normalize an API URL into the single form used for dispatch.
///
/// A bare `host[:port][/path]` is taken as `http`. Parsing lower-cases the
/// scheme and host, drops default ports and turns an empty path into `/`.
pub fn canonical_api_url(raw: &str) -> Result<Url, ProviderError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|e| ProviderError::Url {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::Url {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ProviderError::Url {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}
