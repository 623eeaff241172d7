//! The cached Office 365 token: a TOML file next to the config, refreshed on load.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use ha365_core::error::SyncError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::outlook::auth::{OAuthClient, TokenResponse};

/// Refresh this long before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 300;

pub struct Session {
    path: PathBuf,
    data: SessionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl SessionData {
    /// `previous_refresh` is kept when the server did not rotate the refresh token.
    fn from_tokens(tokens: TokenResponse, previous_refresh: Option<&str>) -> Result<Self> {
        let refresh_token = tokens
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!("No refresh token returned; is the offline_access scope granted?")
            })?;

        Ok(SessionData {
            access_token: tokens.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        })
    }
}

impl Session {
    /// Store freshly issued tokens at `path`.
    pub fn create(path: &Path, tokens: TokenResponse) -> Result<Self> {
        let session = Session {
            path: path.to_path_buf(),
            data: SessionData::from_tokens(tokens, None)?,
        };
        session.save()?;
        Ok(session)
    }

    /// Load the session at `path` and refresh it if it is (nearly) expired.
    pub async fn load_valid(path: &Path, oauth: &OAuthClient) -> Result<Self> {
        let mut session = Self::load(path)?;

        if session.is_expired() {
            debug!("Access token expired, refreshing");
            session.refresh(oauth).await?;
        }

        Ok(session)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::Authentication(format!(
                "no token cache at {}. Sign in with:\n  ha365-sync auth",
                path.display()
            ))
            .into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token cache from {}", path.display()))?;

        let data: SessionData = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse token cache from {}", path.display()))?;

        Ok(Session {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(&self.data).context("Failed to serialize session")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token cache to {}", self.path.display()))?;

        // Owner-only, the file holds a refresh token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", self.path.display()))?;
        }

        Ok(())
    }

    pub fn access_token(&self) -> &str {
        &self.data.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.data.expires_at
    }

    fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.data.expires_at
    }

    async fn refresh(&mut self, oauth: &OAuthClient) -> Result<()> {
        let tokens = oauth.refresh(&self.data.refresh_token).await?;

        self.data = SessionData::from_tokens(tokens, Some(&self.data.refresh_token))?;
        self.save()?;

        info!("Refreshed Office 365 access token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha365_core::config::Office365Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tokens(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in,
        }
    }

    fn oauth(authority: &str) -> OAuthClient {
        let config = Office365Config {
            client_id: "client".to_string(),
            client_secret: None,
            tenant_id: "common".to_string(),
            calendar_id: "primary".to_string(),
            user_principal_name: None,
            token_cache: None,
        };
        OAuthClient::new_with_authority(&config, authority)
    }

    #[test]
    fn test_create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.toml");

        Session::create(&path, tokens("abc", Some("r1"), 3600)).unwrap();
        let loaded = Session::load(&path).unwrap();

        assert_eq!(loaded.access_token(), "abc");
        assert!(!loaded.is_expired());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.toml");
        Session::create(&path, tokens("abc", Some("r1"), 3600)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_cache_asks_for_auth() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::load(&dir.path().join("absent.toml")).err().unwrap();

        assert!(err.downcast_ref::<SyncError>().unwrap().is_authentication());
        assert!(err.to_string().contains("ha365-sync auth"));
    }

    #[test]
    fn test_missing_refresh_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Session::create(&dir.path().join("t.toml"), tokens("abc", None, 3600)).is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_and_saved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.toml");
        Session::create(&path, tokens("stale", Some("keep-me"), 0)).unwrap();

        let session = Session::load_valid(&path, &oauth(&mock_server.uri())).await.unwrap();
        assert_eq!(session.access_token(), "fresh");

        let reloaded = Session::load(&path).unwrap();
        assert_eq!(reloaded.access_token(), "fresh");
        assert_eq!(reloaded.data.refresh_token, "keep-me");
    }
}
