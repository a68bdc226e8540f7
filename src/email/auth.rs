//! Token storage and the authorization handshake
//!
//! Tokens are opaque secret blobs with an expiry timestamp, saved and
//! loaded per account through a serialization-agnostic `TokenStore`.
//! The interactive handshake is the only operation in the system that
//! blocks on a human-paced event; it has no timeout by design, and a
//! denied or abandoned consent reports as an Authorization error.

use crate::error::AssistantError;
use crate::models::AccountToken;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Short stable identifier for a token, safe to log. Never the secret.
pub fn token_fingerprint(token: &AccountToken) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.access_secret.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

//
// ================= Token Store =================
//

pub trait TokenStore: Send + Sync {
    fn save(&self, account: &str, token: &AccountToken) -> Result<()>;
    fn load(&self, account: &str) -> Result<Option<AccountToken>>;
    fn delete(&self, account: &str) -> Result<()>;
}

/// One JSON blob per account under a credentials directory.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, account: &str) -> PathBuf {
        let sanitized: String = account
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}_token.json", sanitized))
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, account: &str, token: &AccountToken) -> Result<()> {
        let path = self.path(account);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(token)?;
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        debug!(
            account = %account,
            fingerprint = %token_fingerprint(token),
            "Token saved"
        );
        Ok(())
    }

    fn load(&self, account: &str) -> Result<Option<AccountToken>> {
        let path = self.path(account);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A corrupt blob is recoverable: treat it as absent and re-auth.
        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(account = %account, error = %e, "Stored token is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    fn delete(&self, account: &str) -> Result<()> {
        let path = self.path(account);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//
// ================= Authenticator =================
//

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Interactive browser-consent handshake. Blocks until the user
    /// completes or denies consent.
    async fn authorize_interactive(&self, account: &str) -> Result<AccountToken>;

    /// Silent refresh using the token's refresh credential.
    async fn refresh(&self, token: &AccountToken) -> Result<AccountToken>;
}

/// OAuth authorization-code flow against the provider's consent and
/// token endpoints, with a loopback redirect listener.
pub struct OAuthAuthenticator {
    client: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

impl OAuthAuthenticator {
    pub fn new(client_id: String, client_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            client_id,
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scope: "https://www.googleapis.com/auth/gmail.readonly".to_string(),
        }
    }

    /// Build from `MAIL_CLIENT_ID` / `MAIL_CLIENT_SECRET`, if configured.
    pub fn from_env() -> Option<Self> {
        let client_id = env::var("MAIL_CLIENT_ID").ok()?;
        let client_secret = env::var("MAIL_CLIENT_SECRET").ok()?;
        if client_id.trim().is_empty() {
            return None;
        }
        Some(Self::new(client_id, client_secret))
    }

    async fn exchange(&self, params: &[(&str, &str)]) -> Result<AccountToken> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AssistantError::Authorization(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Authorization(format!(
                "Token endpoint rejected the request: {}",
                body
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            AssistantError::Authorization(format!("Invalid token response: {}", e))
        })?;

        Ok(AccountToken {
            access_secret: parsed.access_token,
            refresh_secret: parsed.refresh_token,
            expiry: Utc::now() + ChronoDuration::seconds(parsed.expires_in.max(0)),
        })
    }

    /// Wait for the browser redirect carrying the authorization code.
    /// No timeout: the user may take arbitrarily long, and closing the
    /// browser or denying consent surfaces as an Authorization error.
    async fn wait_for_redirect(listener: &TcpListener) -> Result<String> {
        loop {
            let (mut socket, _addr) = listener.accept().await?;

            let mut buffer = [0u8; 4096];
            let read = socket.read(&mut buffer).await?;
            let request = String::from_utf8_lossy(&buffer[..read]);
            let Some(line) = request.lines().next() else {
                continue;
            };

            if query_param(line, "error").is_some() {
                let _ = socket
                    .write_all(deny_page().as_bytes())
                    .await;
                return Err(AssistantError::Authorization(
                    "User denied consent".to_string(),
                ));
            }

            if let Some(code) = query_param(line, "code") {
                let _ = socket.write_all(success_page().as_bytes()).await;
                return Ok(code);
            }

            // Favicon probes and other noise: answer and keep waiting.
            let _ = socket.write_all(success_page().as_bytes()).await;
        }
    }
}

fn query_param(request_line: &str, key: &str) -> Option<String> {
    // "GET /?code=abc&scope=... HTTP/1.1"
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}

fn success_page() -> &'static str {
    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
     <html><body><h3>Authorization complete.</h3>You can close this tab.</body></html>"
}

fn deny_page() -> &'static str {
    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
     <html><body><h3>Authorization denied.</h3>You can close this tab.</body></html>"
}

#[async_trait]
impl Authenticator for OAuthAuthenticator {
    async fn authorize_interactive(&self, account: &str) -> Result<AccountToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let consent_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.auth_url, self.client_id, redirect_uri, self.scope
        );

        info!(account = %account, "Interactive authorization required");
        println!("==================================================");
        println!("LOGIN REQUIRED for '{}'", account);
        println!("Open this URL in a browser and approve access:");
        println!("{}", consent_url);
        println!("==================================================");

        let code = Self::wait_for_redirect(&listener).await?;

        let token = self
            .exchange(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;

        info!(
            account = %account,
            fingerprint = %token_fingerprint(&token),
            "Authorization complete"
        );
        Ok(token)
    }

    async fn refresh(&self, token: &AccountToken) -> Result<AccountToken> {
        let refresh_secret = token.refresh_secret.clone().ok_or_else(|| {
            AssistantError::Authorization("No refresh credential stored".to_string())
        })?;

        let mut refreshed = self
            .exchange(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        // Providers often omit the refresh credential on refresh; keep
        // the one we already hold.
        if refreshed.refresh_secret.is_none() {
            refreshed.refresh_secret = Some(refresh_secret);
        }
        Ok(refreshed)
    }
}

/// Stand-in used when no OAuth client is configured: every handshake
/// reports an Authorization error naming the missing configuration.
pub struct UnconfiguredAuthenticator;

#[async_trait]
impl Authenticator for UnconfiguredAuthenticator {
    async fn authorize_interactive(&self, account: &str) -> Result<AccountToken> {
        Err(AssistantError::Authorization(format!(
            "Cannot authorize '{}': MAIL_CLIENT_ID / MAIL_CLIENT_SECRET not configured",
            account
        )))
    }

    async fn refresh(&self, _token: &AccountToken) -> Result<AccountToken> {
        Err(AssistantError::Authorization(
            "MAIL_CLIENT_ID / MAIL_CLIENT_SECRET not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(secret: &str) -> AccountToken {
        AccountToken {
            access_secret: secret.to_string(),
            refresh_secret: Some("refresh".to_string()),
            expiry: Utc::now() + ChronoDuration::hours(1),
        }
    }

    #[test]
    fn test_file_token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path()).unwrap();

        assert!(store.load("personal").unwrap().is_none());

        let original = token("secret-blob");
        store.save("personal", &original).unwrap();

        let loaded = store.load("personal").unwrap().unwrap();
        assert_eq!(loaded.access_secret, original.access_secret);
        assert_eq!(loaded.refresh_secret, original.refresh_secret);

        store.delete("personal").unwrap();
        assert!(store.load("personal").unwrap().is_none());
        // Deleting twice is fine.
        store.delete("personal").unwrap();
    }

    #[test]
    fn test_corrupt_token_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("school_token.json"), "not json").unwrap();
        assert!(store.load("school").unwrap().is_none());
    }

    #[test]
    fn test_account_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path()).unwrap();

        store.save("work/../evil", &token("s")).unwrap();
        // The blob landed inside the credentials dir, nowhere else.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_fingerprint_is_not_the_secret() {
        let t = token("super-secret-value");
        let fp = token_fingerprint(&t);
        assert_eq!(fp.len(), 12);
        assert!(!t.access_secret.contains(&fp));
    }

    #[test]
    fn test_query_param_parsing() {
        let line = "GET /?code=abc123&scope=mail HTTP/1.1";
        assert_eq!(query_param(line, "code").as_deref(), Some("abc123"));
        assert_eq!(query_param(line, "scope").as_deref(), Some("mail"));
        assert!(query_param(line, "error").is_none());
        assert!(query_param("GET / HTTP/1.1", "code").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_authenticator_reports_authorization_error() {
        let auth = UnconfiguredAuthenticator;
        let result = auth.authorize_interactive("personal").await;
        assert!(matches!(result, Err(AssistantError::Authorization(_))));
    }
}
