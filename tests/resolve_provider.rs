//! Integration tests for provider resolution.
//!
//! Drives the public API the way the binary does: a flag layer plus a TOML
//! context file, an OCI profile file on disk and a substituted environment.
//! Credentials come from a mock source so no metadata service is needed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pretty_assertions::assert_eq;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;

use cloudshell_provider::auth::{AuthError, CredentialSource, KeyProvider, StaticKeyProvider};
use cloudshell_provider::config::{ConfigLayer, LayeredConfig};
use cloudshell_provider::env::Env;
use cloudshell_provider::profile::{NoPassphrase, ProfileError};
use cloudshell_provider::provider::{ProviderError, Resolver, Setting};

const KEY_PEM: &str = include_str!("fixtures/instance_key.pem");

/// A credential source that hands out the fixture key and counts calls.
struct MockCredentials {
    key: Arc<StaticKeyProvider>,
    calls: Arc<AtomicUsize>,
}

impl MockCredentials {
    fn new() -> Self {
        Self {
            key: Arc::new(StaticKeyProvider::from_pem("ST$mock-token", KEY_PEM).unwrap()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CredentialSource for MockCredentials {
    async fn key_provider(&self) -> Result<Arc<dyn KeyProvider>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.key.clone())
    }
}

/// Helper: write an OCI config file into `dir`.
fn write_profile(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("oci_config");
    std::fs::write(&path, content).unwrap();
    path
}

/// Helper: write a context TOML file into `dir`.
fn write_context(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("context.toml");
    std::fs::write(&path, content).unwrap();
    path
}

/// Pull `field="value"` out of an Authorization header.
fn auth_field(header: &str, field: &str) -> String {
    let marker = format!("{field}=\"");
    let start = header.find(&marker).unwrap() + marker.len();
    let end = header[start..].find('"').unwrap();
    header[start..start + end].to_string()
}

/// Rebuild the signing string from the signed header list and check the
/// signature against the fixture's public key.
fn assert_signature_valid(request: &Request, key: &StaticKeyProvider) {
    let header = request.headers()[AUTHORIZATION].to_str().unwrap().to_string();
    let mut lines = Vec::new();
    for name in auth_field(&header, "headers").split(' ') {
        if name == "(request-target)" {
            let mut target = request.url().path().to_string();
            if let Some(query) = request.url().query() {
                target.push('?');
                target.push_str(query);
            }
            lines.push(format!(
                "(request-target): {} {target}",
                request.method().as_str().to_lowercase()
            ));
        } else {
            let value = request.headers()[name].to_str().unwrap();
            lines.push(format!("{name}: {value}"));
        }
    }

    let sig_bytes = STANDARD.decode(auth_field(&header, "signature")).unwrap();
    let signature = Signature::try_from(sig_bytes.as_slice()).unwrap();
    let verifying_key = VerifyingKey::<Sha256>::new(key.private_key().to_public_key());
    verifying_key
        .verify(lines.join("\n").as_bytes(), &signature)
        .expect("signature should verify");
}

// ---------------------------------------------------------------------------
// Layered resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn context_profile_and_env_combine() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = write_profile(
        dir.path(),
        "[DEFAULT]\nregion=us-ashburn-1\ntenancy=ocid1.tenancy.oc1..default\n\n\
         [CS]\nregion=eu-frankfurt-1\ntenancy=ocid1.tenancy.oc1..cs\n",
    );
    let context_path = write_context(
        dir.path(),
        "[oracle]\nprofile = \"CS\"\ncompartment-id = \"ocid1.compartment.oc1..ctx\"\n",
    );

    let config = LayeredConfig::load(ConfigLayer::new("flags"), Some(&context_path)).unwrap();
    let env = Env::from_vars([
        ("OCI_CLI_CONFIG_FILE", profile_path.display().to_string()),
        ("OCI_CLI_REGION", "us-phoenix-1".to_string()),
    ]);

    let creds = MockCredentials::new();
    let calls = creds.calls.clone();
    let resolver = Resolver::new(creds, env);

    let settings = resolver.settings(&config, &NoPassphrase).unwrap();
    assert_eq!(settings.profile, "CS");
    assert_eq!(settings.region, "us-phoenix-1");
    assert_eq!(settings.tenancy_id, "ocid1.tenancy.oc1..cs");
    assert_eq!(settings.delegation_token_file, "/etc/oci/delegation_token");
    assert_eq!(
        settings.api_url.as_str(),
        "https://functions.us-phoenix-1.oci.oraclecloud.com/"
    );
    assert_eq!(settings.compartment_id, "ocid1.compartment.oc1..ctx");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "settings never fetches credentials");

    let handle = resolver.resolve(&config, &NoPassphrase).await.unwrap();
    assert_eq!(handle.api_url, settings.api_url);
    assert_eq!(handle.compartment_id, settings.compartment_id);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn flags_override_context_file() {
    let dir = tempfile::tempdir().unwrap();
    let context_path = write_context(
        dir.path(),
        "api-url = \"https://context.example.com\"\n\n[oracle]\ndisable-certs = false\n",
    );
    let flags = ConfigLayer::new("flags")
        .with("api-url", "http://localhost:8080")
        .with("oracle.disable-certs", "true");

    let config = LayeredConfig::load(flags, Some(&context_path)).unwrap();
    let env = Env::from_vars([
        ("OCI_CLI_REGION", "us-phoenix-1"),
        ("OCI_CLI_TENANCY", "ocid1.tenancy.oc1..aaa"),
        ("OCI_CLI_DELEGATION_TOKEN_FILE", "/etc/oci/delegation_token"),
    ]);

    let resolver = Resolver::new(MockCredentials::new(), env);
    let handle = resolver.resolve(&config, &NoPassphrase).await.unwrap();

    assert_eq!(handle.api_url.as_str(), "http://localhost:8080/");
    assert!(handle.disable_certs);
    assert_eq!(handle.compartment_id, "ocid1.tenancy.oc1..aaa");
}

#[tokio::test]
async fn override_always_wins_over_profile_seed() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = write_profile(
        dir.path(),
        "[CS]\nregion=eu-frankfurt-1\ntenancy=ocid1.tenancy.oc1..profile\n",
    );

    let config = LayeredConfig::new().with_layer(ConfigLayer::new("flags").with("oracle.profile", "CS"));
    let cases = [
        ("OCI_CLI_REGION", "ap-tokyo-1"),
        ("OCI_CLI_TENANCY", "ocid1.tenancy.oc1..env"),
        ("OCI_CLI_DELEGATION_TOKEN_FILE", "/run/token"),
    ];

    for (var, value) in cases {
        let env = Env::from_vars([
            ("OCI_CLI_CONFIG_FILE", profile_path.display().to_string()),
            (var, value.to_string()),
        ]);
        let resolver = Resolver::new(MockCredentials::new(), env);
        let settings = resolver.settings(&config, &NoPassphrase).unwrap();

        let resolved = match var {
            "OCI_CLI_REGION" => settings.region,
            "OCI_CLI_TENANCY" => settings.tenancy_id,
            _ => settings.delegation_token_file,
        };
        assert_eq!(resolved, value, "{var} should override the profile");
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_missing_setting_is_named_and_skips_credentials() {
    let all = [
        ("OCI_CLI_REGION", "us-phoenix-1", Setting::Region),
        ("OCI_CLI_TENANCY", "ocid1.tenancy.oc1..aaa", Setting::Tenancy),
        ("OCI_CLI_DELEGATION_TOKEN_FILE", "/etc/oci/delegation_token", Setting::DelegationTokenFile),
    ];

    for (skip, _, expected) in all {
        let env = Env::from_vars(
            all.iter()
                .filter(|(name, _, _)| *name != skip)
                .map(|(name, value, _)| (*name, *value)),
        );
        let creds = MockCredentials::new();
        let calls = creds.calls.clone();
        let resolver = Resolver::new(creds, env);

        let err = resolver
            .resolve(&LayeredConfig::new(), &NoPassphrase)
            .await
            .unwrap_err();
        match err {
            ProviderError::MissingValue { setting } => assert_eq!(setting, expected),
            other => panic!("expected MissingValue, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn missing_config_file_surfaces_as_config_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let env = Env::from_vars([(
        "OCI_CLI_CONFIG_FILE",
        dir.path().join("does-not-exist").display().to_string(),
    )]);
    let config = LayeredConfig::new().with_layer(ConfigLayer::new("flags").with("oracle.profile", "CS"));

    let resolver = Resolver::new(MockCredentials::new(), env);
    let err = resolver.resolve(&config, &NoPassphrase).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::ConfigLoad(ProfileError::NoConfiguration { key: "region" })
    ));
}

#[tokio::test]
async fn profile_env_var_selects_profile_without_config() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = write_profile(dir.path(), "[OTHER]\nregion=r\ntenancy=t\n");
    let env = Env::from_vars([
        ("OCI_CLI_CONFIG_FILE", profile_path.display().to_string()),
        ("OCI_CLI_PROFILE", "CS".to_string()),
    ]);

    let resolver = Resolver::new(MockCredentials::new(), env);
    let err = resolver
        .resolve(&LayeredConfig::new(), &NoPassphrase)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("'CS'"));
}

#[test]
fn unreadable_context_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = LayeredConfig::load(ConfigLayer::new("flags"), Some(&dir.path().join("missing.toml")))
        .unwrap_err();
    assert!(err.to_string().contains("missing.toml"));
}

// ---------------------------------------------------------------------------
// Signing through the handle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handle_signs_get_and_post_requests() {
    let env = Env::from_vars([
        ("OCI_CLI_REGION", "us-phoenix-1"),
        ("OCI_CLI_TENANCY", "ocid1.tenancy.oc1..aaa"),
        ("OCI_CLI_DELEGATION_TOKEN_FILE", "/etc/oci/delegation_token"),
    ]);
    let creds = MockCredentials::new();
    let key = creds.key.clone();
    let resolver = Resolver::new(creds, env);
    let handle = resolver
        .resolve(&LayeredConfig::new(), &NoPassphrase)
        .await
        .unwrap();

    let url = handle
        .endpoint("/20181201/applications?compartmentId=ocid1.tenancy.oc1..aaa")
        .unwrap();
    let mut get = Request::new(Method::GET, url.clone());
    handle.prepare(&mut get).unwrap();
    let auth = get.headers()[AUTHORIZATION].to_str().unwrap();
    assert!(auth.contains("headers=\"date (request-target) host\""));
    assert!(auth.contains("keyId=\"ST$mock-token\""));
    assert!(get.headers().get("opc-obo-token").is_none());
    assert_signature_valid(&get, &key);

    let mut post = Request::new(Method::POST, url);
    *post.body_mut() = Some(r#"{"displayName":"app"}"#.into());
    handle.prepare(&mut post).unwrap();
    let auth = post.headers()[AUTHORIZATION].to_str().unwrap();
    assert!(auth.contains("content-length content-type x-content-sha256"));
    assert!(post.headers().contains_key("x-content-sha256"));
    assert_signature_valid(&post, &key);
}
