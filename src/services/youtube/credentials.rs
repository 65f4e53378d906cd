use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::YouTubeError;
use crate::storage;

/// Tokens are treated as expired this long before Google says so.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    /// Nothing usable on disk; only interactive consent helps
    Missing,
    Expired { refresh_token: String },
    Valid { access_token: String },
}

impl CredentialState {
    /// Expired without a refresh token counts as missing.
    pub fn of(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        let Some(credential) = credential else {
            return CredentialState::Missing;
        };

        if credential.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now {
            return CredentialState::Valid {
                access_token: credential.access_token.clone(),
            };
        }

        match &credential.refresh_token {
            Some(token) if !token.is_empty() => CredentialState::Expired {
                refresh_token: token.clone(),
            },
            _ => CredentialState::Missing,
        }
    }
}

/// `youtube_credentials.json` on disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An unreadable file is logged and treated as absent.
    pub async fn load(&self) -> Option<Credential> {
        match storage::read_json(&self.path).await {
            Ok(credential) => credential,
            Err(e) => {
                log::warn!(
                    "[oauth] Ignoring unreadable credentials {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub async fn save(&self, credential: &Credential) -> Result<(), YouTubeError> {
        storage::write_json(&self.path, credential)
            .await
            .map_err(|e| YouTubeError::Auth(format!("could not persist credentials: {}", e)))
    }
}

/// The "installed" section of a Google client secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecrets,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientSecrets {
    pub async fn load(path: &Path) -> Result<Self, YouTubeError> {
        let file: Option<ClientSecretsFile> = storage::read_json(path)
            .await
            .map_err(|e| YouTubeError::Auth(format!("bad client secrets {}: {}", path.display(), e)))?;
        file.map(|f| f.installed).ok_or_else(|| {
            YouTubeError::Auth(format!(
                "client secrets not found at {}; download them from the Google Cloud console",
                path.display()
            ))
        })
    }
}
