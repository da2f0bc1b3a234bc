//! OAuth2 credential bootstrap for the Gmail API

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::{Path, PathBuf};

use crate::error::{Result, TriageError};

/// Scopes requested for every token
///
/// - gmail.modify: read/write access, used for search, get and delete
/// - gmail.readonly: message bodies
/// - gmail.metadata: headers and labels
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.metadata",
];

pub const DEFAULT_CLIENT_SECRETS_FILE: &str = "credentials/client_secret.json";
pub const DEFAULT_TOKEN_FILE: &str = "credentials/token.json";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// An access token valid for [`REQUIRED_SCOPES`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Unix timestamp (seconds) at which the token expires, if known
    pub expires_at: Option<i64>,
    pub scopes: Vec<String>,
}

/// Source of valid Gmail credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a credential valid for [`REQUIRED_SCOPES`], refreshing or
    /// running the consent flow as needed.
    ///
    /// Fails with [`TriageError::MissingClientSecrets`] when the client
    /// secrets file does not exist.
    async fn ensure_token(&self) -> Result<Credential>;

    /// Where the token is cached
    fn token_path(&self) -> &Path;
}

/// Desktop-app OAuth flow backed by `yup-oauth2`
///
/// A cached token is reused and refreshed transparently; without one the
/// browser consent flow runs and its result is persisted to `token_path`.
#[derive(Debug, Clone)]
pub struct InstalledFlowProvider {
    client_secrets_path: PathBuf,
    token_path: PathBuf,
}

impl InstalledFlowProvider {
    pub fn new(client_secrets_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secrets_path: client_secrets_path.into(),
            token_path: token_path.into(),
        }
    }

    pub fn client_secrets_path(&self) -> &Path {
        &self.client_secrets_path
    }

    /// Build a Gmail hub whose token is already cached with the required scopes
    pub async fn hub(&self) -> Result<GmailHub> {
        let (_, hub) = self.authenticate().await?;
        Ok(hub)
    }

    async fn authenticate(&self) -> Result<(Credential, GmailHub)> {
        if !self.client_secrets_path.exists() {
            return Err(TriageError::MissingClientSecrets(
                self.client_secrets_path.clone(),
            ));
        }

        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let secret = yup_oauth2::read_application_secret(&self.client_secrets_path)
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to read client secrets: {}", e)))?;

        // HTTPRedirect opens a browser and listens on a local port for the redirect
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&self.token_path)
        .build()
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        // Request all scopes up front so later calls never trigger a second consent
        let token = auth
            .token(REQUIRED_SCOPES)
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| TriageError::AuthError("Token response had no access token".to_string()))?
            .to_string();

        let credential = Credential {
            access_token,
            expires_at: token.expiration_time().map(|t| t.unix_timestamp()),
            scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        if self.token_path.exists() {
            secure_token_file(&self.token_path).await?;
        }

        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .map_err(|e| {
                        TriageError::AuthError(format!("Failed to load TLS roots: {}", e))
                    })?
                    .https_or_http()
                    .enable_http1()
                    .build(),
            );

        Ok((credential, Gmail::new(client, auth)))
    }
}

#[async_trait]
impl CredentialProvider for InstalledFlowProvider {
    async fn ensure_token(&self) -> Result<Credential> {
        let (credential, _) = self.authenticate().await?;
        tracing::debug!("Token ready, cached at {:?}", self.token_path);
        Ok(credential)
    }

    fn token_path(&self) -> &Path {
        &self.token_path
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_missing_client_secrets_is_distinguishable() {
        let dir = TempDir::new().unwrap();
        let provider = InstalledFlowProvider::new(
            dir.path().join("client_secret.json"),
            dir.path().join("credentials/token.json"),
        );

        let err = provider.ensure_token().await.unwrap_err();
        match err {
            TriageError::MissingClientSecrets(path) => {
                assert!(path.ends_with("client_secret.json"));
            }
            other => panic!("expected MissingClientSecrets, got {:?}", other),
        }

        // Nothing is created before the secrets check passes
        assert!(!dir.path().join("credentials").exists());
    }

    #[tokio::test]
    async fn test_malformed_client_secrets_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let secrets = dir.path().join("client_secret.json");
        tokio::fs::write(&secrets, "not json").await.unwrap();

        let provider = InstalledFlowProvider::new(&secrets, dir.path().join("creds/token.json"));
        let err = provider.ensure_token().await.unwrap_err();

        assert!(matches!(err, TriageError::AuthError(_)));
        assert!(dir.path().join("creds").is_dir());
    }

    #[tokio::test]
    async fn test_secure_token_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "test content")
            .await
            .unwrap();

        secure_token_file(temp_file.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(temp_file.path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn test_scopes_constants() {
        assert_eq!(REQUIRED_SCOPES.len(), 3);
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.modify"));
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.readonly"));
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.metadata"));
    }
}
