pub mod auth;
pub mod health;
pub mod init;
pub mod purge;
pub mod run;
pub mod status;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use ha365_core::config::SyncConfig;
use ha365_core::error::SyncError;

use crate::homeassistant::HomeAssistantClient;
use crate::outlook::OutlookCalendar;
use crate::outlook::api::GraphClient;
use crate::outlook::auth::OAuthClient;
use crate::outlook::session::Session;

const AUTH_HINT: &str = "Office 365 sign-in required. Run:\n  ha365-sync auth";

/// Both ends of a sync, ready to use.
pub struct Clients {
    pub source: HomeAssistantClient,
    pub destination: OutlookCalendar,
}

pub fn load_config(path: &Path) -> Result<SyncConfig> {
    SyncConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Build both clients, refreshing the Office 365 token when needed.
///
/// With `interactive`, a missing token cache starts the device-code login first.
pub async fn connect(config: &SyncConfig, interactive: bool) -> Result<Clients> {
    let timezone = config.timezone()?;
    let token_path = config.token_cache_path()?;
    let oauth = OAuthClient::new(&config.office365);

    if interactive && !token_path.exists() {
        auth::login(config).await?;
    }

    let session = Session::load_valid(&token_path, &oauth)
        .await
        .map_err(explain)?;
    let graph = GraphClient::new(session.access_token(), &config.office365);

    Ok(Clients {
        source: HomeAssistantClient::new(
            &config.home_assistant.url,
            &config.home_assistant.token,
            timezone,
        ),
        destination: OutlookCalendar::new(graph, config.prefixes(), timezone),
    })
}

/// Attach the sign-in hint to authentication failures.
pub fn explain(err: anyhow::Error) -> anyhow::Error {
    if is_authentication(&err) {
        err.context(AUTH_HINT)
    } else {
        err
    }
}

pub fn is_authentication(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_authentication)
}
