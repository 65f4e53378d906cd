//! Installed-app OAuth with PKCE, plus the credential state machine that
//! decides between reuse, refresh and fresh consent.

use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::credentials::{ClientSecrets, Credential, CredentialState, CredentialStore};
use super::{YouTubeError, api_error};
use crate::constants::YOUTUBE_UPLOAD_SCOPE;

/// Hands out a currently valid access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, YouTubeError>;
}

#[derive(Clone)]
pub struct OAuthClient {
    secrets: ClientSecrets,
    http: Client,
}

impl OAuthClient {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            http: Client::new(),
        }
    }

    /// Generate PKCE code verifier and challenge
    fn generate_pkce() -> (String, String) {
        let verifier_bytes: [u8; 32] = rand::rng().random();
        let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let hash = hasher.finalize();
        let code_challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash);

        (code_verifier, code_challenge)
    }

    fn generate_state() -> String {
        let bytes: [u8; 16] = rand::rng().random();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn authorize_url(&self, redirect_uri: &str, scopes: &[&str]) -> AuthorizeRequest {
        let state = Self::generate_state();
        let (code_verifier, code_challenge) = Self::generate_pkce();

        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            self.secrets.auth_uri,
            percent_encode(&self.secrets.client_id),
            percent_encode(redirect_uri),
            percent_encode(&scopes.join(" ")),
            percent_encode(&state),
            percent_encode(&code_challenge)
        );

        AuthorizeRequest {
            url,
            state,
            code_verifier,
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, YouTubeError> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        self.token_request(&params).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, YouTubeError> {
        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, YouTubeError> {
        let resp = self
            .http
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(resp.json().await?)
    }

    /// Run the consent flow against a one-shot loopback listener.
    pub async fn consent(&self, scopes: &[&str]) -> Result<TokenResponse, YouTubeError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let request = self.authorize_url(&redirect_uri, scopes);

        println!("Open this URL in a browser to authorize uploads:\n\n{}\n", request.url);
        log::info!("[oauth] Waiting for consent redirect on {}", redirect_uri);

        let (mut stream, _) = listener.accept().await?;
        let (reader, mut writer) = stream.split();
        let mut request_line = String::new();
        BufReader::new(reader).read_line(&mut request_line).await?;

        let outcome = parse_redirect(&request_line);
        let page = if outcome.is_ok() {
            "Authorization received. You can close this window."
        } else {
            "Authorization failed. Check the terminal."
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            page.len(),
            page
        );
        if let Err(e) = writer.write_all(response.as_bytes()).await {
            log::warn!("[oauth] Could not answer the browser: {}", e);
        }

        let (code, state) = outcome?;
        if state != request.state {
            return Err(YouTubeError::Auth("state mismatch in consent redirect".into()));
        }

        self.exchange_code(&code, &request.code_verifier, &redirect_uri)
            .await
    }
}

/// Pull `code` and `state` out of `GET /?code=..&state=.. HTTP/1.1`.
fn parse_redirect(request_line: &str) -> Result<(String, String), YouTubeError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| YouTubeError::Auth("malformed consent redirect".into()))?;
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_encoding::percent_decode_str(value)
            .decode_utf8_lossy()
            .to_string();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(YouTubeError::Auth(format!("consent denied: {}", error)));
    }
    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(YouTubeError::Auth("consent redirect without code".into())),
    }
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[derive(Debug)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Token source backed by `youtube_credentials.json`. Client secrets are
/// only read when a refresh or consent actually needs them.
pub struct OAuthTokenSource {
    secrets_path: PathBuf,
    store: CredentialStore,
    allow_consent: bool,
}

impl OAuthTokenSource {
    pub fn new(secrets_path: impl Into<PathBuf>, store: CredentialStore, allow_consent: bool) -> Self {
        Self {
            secrets_path: secrets_path.into(),
            store,
            allow_consent,
        }
    }

    async fn client(&self) -> Result<OAuthClient, YouTubeError> {
        Ok(OAuthClient::new(ClientSecrets::load(&self.secrets_path).await?))
    }

    /// Keep the previous refresh token when Google does not send a new one.
    fn credential_from(token: TokenResponse, previous_refresh: Option<String>) -> Credential {
        Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            scopes: token.scope.split_whitespace().map(str::to_string).collect(),
        }
    }

    async fn persist(&self, credential: &Credential) {
        if let Err(e) = self.store.save(credential).await {
            log::error!("[oauth] {}", e);
        }
    }

    async fn obtain_by_consent(&self) -> Result<String, YouTubeError> {
        if !self.allow_consent || !std::io::stdin().is_terminal() {
            return Err(YouTubeError::Auth(
                "no valid credentials and no terminal for interactive consent".into(),
            ));
        }

        let token = self.client().await?.consent(&[YOUTUBE_UPLOAD_SCOPE]).await?;
        let credential = Self::credential_from(token, None);
        self.persist(&credential).await;
        log::info!("[oauth] Consent complete, credentials saved");
        Ok(credential.access_token)
    }
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    async fn access_token(&self) -> Result<String, YouTubeError> {
        let stored = self.store.load().await;

        match CredentialState::of(stored.as_ref(), Utc::now()) {
            CredentialState::Valid { access_token } => Ok(access_token),
            CredentialState::Expired { refresh_token } => {
                let refreshed = match self.client().await {
                    Ok(client) => client.refresh_token(&refresh_token).await,
                    Err(e) => Err(e),
                };
                match refreshed {
                    Ok(token) => {
                        let credential = Self::credential_from(token, Some(refresh_token));
                        self.persist(&credential).await;
                        log::info!("[oauth] Access token refreshed");
                        Ok(credential.access_token)
                    }
                    Err(e) => {
                        log::warn!("[oauth] Refresh failed, falling back to consent: {}", e);
                        self.obtain_by_consent().await
                    }
                }
            }
            CredentialState::Missing => self.obtain_by_consent().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(ClientSecrets {
            client_id: "client-1".into(),
            client_secret: "secret".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
        })
    }

    #[test]
    fn test_authorize_url_has_pkce_and_scope() {
        let req = client().authorize_url("http://127.0.0.1:8080/", &[YOUTUBE_UPLOAD_SCOPE]);

        assert!(req.url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(req.url.contains("code_challenge_method=S256"));
        assert!(req.url.contains("client_id=client%2D1"));
        assert!(req.url.contains("youtube%2Eupload"));
        assert!(req.url.contains(&format!("state={}", percent_encode(&req.state))));
        // 32 random bytes, base64url without padding
        assert_eq!(req.code_verifier.len(), 43);
    }

    #[test]
    fn test_parse_redirect() {
        let (code, state) =
            parse_redirect("GET /?state=abc%2D1&code=4%2F0Ab&scope=x HTTP/1.1\r\n").unwrap();
        assert_eq!(code, "4/0Ab");
        assert_eq!(state, "abc-1");

        assert!(parse_redirect("GET /?error=access_denied&state=s HTTP/1.1").is_err());
        assert!(parse_redirect("GET / HTTP/1.1").is_err());
        assert!(parse_redirect("").is_err());
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let token = TokenResponse {
            access_token: "new".into(),
            expires_in: 3600,
            refresh_token: None,
            scope: YOUTUBE_UPLOAD_SCOPE.into(),
        };
        let credential = OAuthTokenSource::credential_from(token, Some("old-rt".into()));
        assert_eq!(credential.refresh_token.as_deref(), Some("old-rt"));
        assert_eq!(credential.scopes, vec![YOUTUBE_UPLOAD_SCOPE.to_string()]);
    }

    #[tokio::test]
    async fn test_valid_stored_credential_is_used_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds.json"));
        store
            .save(&Credential {
                access_token: "stored".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
                scopes: vec![],
            })
            .await
            .unwrap();

        // no client secrets on disk: a valid credential must not need them
        let source = OAuthTokenSource::new(dir.path().join("client_secrets.json"), store, false);
        assert_eq!(source.access_token().await.unwrap(), "stored");
    }

    #[tokio::test]
    async fn test_missing_credential_without_consent_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds.json"));
        let source = OAuthTokenSource::new(dir.path().join("client_secrets.json"), store, false);

        assert!(matches!(
            source.access_token().await,
            Err(YouTubeError::Auth(_))
        ));
    }
}
