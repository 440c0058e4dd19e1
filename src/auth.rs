//! OAuth2 authentication and Gmail API hub construction

use google_gmail1::common::GetToken;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, TriageError};

/// The only scope triage needs: read, relabel and trash, no permanent deletion
pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Initialize the Gmail API hub.
///
/// Runs the installed-app flow on first use (opens a browser), persists the
/// token to `token_cache_path` and pre-fetches a token for [`MODIFY_SCOPE`] so
/// later calls never trigger a second consent prompt.
pub async fn initialize_gmail_hub(credentials_path: &Path, token_cache_path: &Path) -> Result<GmailHub> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| {
            TriageError::AuthError(format!(
                "Failed to read credentials from {}: {}",
                credentials_path.display(),
                e
            ))
        })?;

    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    auth.token(&[MODIFY_SCOPE])
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }

    gmail_hub(auth)
}

/// Crypto backend for TLS connections, matching the one installed in `main`
fn crypto_provider() -> rustls::crypto::CryptoProvider {
    #[cfg(not(windows))]
    {
        rustls::crypto::aws_lc_rs::default_provider()
    }
    #[cfg(windows)]
    {
        rustls::crypto::ring::default_provider()
    }
}

/// Build a Gmail hub that obtains tokens from `auth` and trusts the
/// platform's root certificates
pub fn gmail_hub<A>(auth: A) -> Result<GmailHub>
where
    A: GetToken + 'static,
{
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_native_roots(crypto_provider())
        .map_err(|e| TriageError::AuthError(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build();
    Ok(hub_over(connector, auth))
}

/// Build a Gmail hub with a caller-supplied TLS configuration
pub fn gmail_hub_with_tls<A>(auth: A, tls: rustls::ClientConfig) -> GmailHub
where
    A: GetToken + 'static,
{
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .build();
    hub_over(connector, auth)
}

/// TLS client configuration trusting only `roots`
pub fn tls_config(roots: rustls::RootCertStore) -> Result<rustls::ClientConfig> {
    Ok(rustls::ClientConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TriageError::AuthError(format!("Unsupported TLS configuration: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

// HTTP/1 only; google-gmail1 behaves better with it
fn hub_over<A>(
    connector: hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    auth: A,
) -> GmailHub
where
    A: GetToken + 'static,
{
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(connector);
    Gmail::new(client, auth)
}

/// Credential structure matching Google's OAuth2 credentials JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub installed: InstalledApp,
}

/// Installed application credentials (desktop/CLI app)
#[derive(Debug, Serialize, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub project_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

/// Check that a credentials file exists and has the installed-app shape.
///
/// Used before starting the browser flow so a wrong file fails fast with a
/// readable message.
pub async fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        TriageError::AuthError(format!(
            "Cannot read credentials file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        TriageError::AuthError(format!(
            "{} is not an installed-app OAuth client file: {}",
            path.display(),
            e
        ))
    })
}

/// Restrict the token cache to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
