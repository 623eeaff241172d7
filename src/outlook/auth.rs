//! OAuth 2.0 device-code login and token refresh against the Microsoft identity platform.

use std::time::Duration;

use anyhow::{Context, Result};
use ha365_core::config::Office365Config;
use ha365_core::error::SyncError;
use serde::Deserialize;
use tracing::{debug, info};

const AUTHORITY: &str = "https://login.microsoftonline.com";

pub const SCOPES: &str = "offline_access Calendars.ReadWrite";

/// Extra seconds added to the poll interval when the server says `slow_down`.
const SLOW_DOWN_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct OAuthClient {
    client: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: Option<String>,
}

impl OAuthClient {
    pub fn new(config: &Office365Config) -> Self {
        Self::new_with_authority(config, AUTHORITY)
    }

    pub fn new_with_authority(config: &Office365Config, authority: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            authority: authority.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.authority, self.tenant_id, name)
    }

    fn with_client_credentials<'a>(&'a self, mut form: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        form.push(("client_id", self.client_id.as_str()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form
    }

    pub async fn request_device_code(&self) -> Result<DeviceCode> {
        let response = self
            .client
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", SCOPES)])
            .send()
            .await
            .context("Failed to request a device code")?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Device code request rejected: {}", describe_error(&text));
        }

        response
            .json()
            .await
            .context("Failed to parse device code response")
    }

    /// Poll the token endpoint until the user has entered the code, or it expires.
    pub async fn poll_for_token(&self, device: &DeviceCode) -> Result<TokenResponse> {
        let mut interval = Duration::from_secs(device.interval.max(1));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);

        loop {
            tokio::time::sleep(interval).await;

            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("The device code expired before sign-in completed");
            }

            let form = self.with_client_credentials(vec![
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", device.device_code.as_str()),
            ]);

            let response = self
                .client
                .post(self.endpoint("token"))
                .form(&form)
                .send()
                .await
                .context("Failed to poll for token")?;

            if response.status().is_success() {
                return response.json().await.context("Failed to parse token response");
            }

            let text = response.text().await.unwrap_or_default();
            let error: TokenErrorResponse = serde_json::from_str(&text)
                .with_context(|| format!("Unexpected token response: {text}"))?;

            match error.error.as_str() {
                "authorization_pending" => debug!("Waiting for sign-in"),
                "slow_down" => interval += Duration::from_secs(SLOW_DOWN_SECS),
                _ => anyhow::bail!(
                    "Sign-in failed: {}",
                    error.error_description.unwrap_or(error.error)
                ),
            }
        }
    }

    /// Full interactive login: show the code, open the browser, wait.
    pub async fn device_login(&self) -> Result<TokenResponse> {
        let device = self.request_device_code().await?;

        eprintln!();
        match &device.message {
            Some(message) => eprintln!("{message}"),
            None => eprintln!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            ),
        }
        eprintln!();

        if open::that(&device.verification_uri).is_err() {
            eprintln!("(Could not open browser automatically, please open the URL above)");
        }

        let tokens = self.poll_for_token(&device).await?;
        info!("Signed in to Office 365");

        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// A rejected refresh token means the user has to sign in again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let form = self.with_client_credentials(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", SCOPES),
        ]);

        let response = self
            .client
            .post(self.endpoint("token"))
            .form(&form)
            .send()
            .await
            .context("Failed to send refresh request")?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.context("Failed to parse refresh response");
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            return Err(SyncError::Authentication(format!(
                "token refresh rejected ({})",
                describe_error(&text)
            ))
            .into());
        }

        anyhow::bail!("Token refresh failed with {status}: {}", describe_error(&text))
    }
}

fn describe_error(text: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(text) {
        Ok(error) => error.error_description.unwrap_or(error.error),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Office365Config {
        Office365Config {
            client_id: "client-123".to_string(),
            client_secret: None,
            tenant_id: "common".to_string(),
            calendar_id: "primary".to_string(),
            user_principal_name: None,
            token_cache: None,
        }
    }

    #[tokio::test]
    async fn test_refresh_returns_new_tokens() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=client-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "refresh_token": "rotated",
                "expires_in": 3600
            })))
            .mount(&mock_server)
            .await;

        let oauth = OAuthClient::new_with_authority(&config(), &mock_server.uri());
        let tokens = oauth.refresh("old").await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_an_authentication_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "AADSTS70008: The refresh token has expired"
            })))
            .mount(&mock_server)
            .await;

        let oauth = OAuthClient::new_with_authority(&config(), &mock_server.uri());
        let err = oauth.refresh("stale").await.unwrap_err();

        let sync_error = err.downcast_ref::<SyncError>().unwrap();
        assert!(sync_error.is_authentication());
        assert!(err.to_string().contains("AADSTS70008"));
    }

    #[tokio::test]
    async fn test_device_code_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/devicecode"))
            .and(body_string_contains("Calendars.ReadWrite"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 5
            })))
            .mount(&mock_server)
            .await;

        let oauth = OAuthClient::new_with_authority(&config(), &mock_server.uri());
        let device = oauth.request_device_code().await.unwrap();

        assert_eq!(device.user_code, "ABCD-EFGH");
        assert_eq!(device.interval, 5);
    }
}
