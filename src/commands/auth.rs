use anyhow::Result;
use ha365_core::config::SyncConfig;
use owo_colors::OwoColorize;

use crate::outlook::auth::OAuthClient;
use crate::outlook::session::Session;

pub async fn run(config: &SyncConfig) -> Result<()> {
    println!("Authenticating with Office 365...");

    let session = login(config).await?;

    println!(
        "\n{} Token saved (valid until {}).",
        "✓".green(),
        session.expires_at().format("%Y-%m-%d %H:%M UTC")
    );
    println!("\nRun `ha365-sync sync` to sync your calendars.");

    Ok(())
}

/// Device-code sign-in; the tokens are written to the configured cache.
pub async fn login(config: &SyncConfig) -> Result<Session> {
    let oauth = OAuthClient::new(&config.office365);
    let tokens = oauth.device_login().await?;

    Session::create(&config.token_cache_path()?, tokens)
}
