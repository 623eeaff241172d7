use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;

use super::{connect, load_config};

/// Check config, token cache, Home Assistant and the Office 365 calendar in turn.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = match load_config(config_path) {
        Ok(config) => {
            pass(&format!("Config loaded from {}", config_path.display()));
            config
        }
        Err(e) => return fail(&format!("{e:#}")),
    };

    let token_path = config.token_cache_path()?;
    if token_path.exists() {
        pass(&format!("Token cache found at {}", token_path.display()));
    } else {
        return fail(&format!(
            "No Office 365 token at {}. Run `ha365-sync auth`",
            token_path.display()
        ));
    }

    let clients = match connect(&config, false).await {
        Ok(clients) => clients,
        Err(e) => return fail(&format!("{e:#}")),
    };

    match clients.source.test_connection().await {
        Ok(()) => pass(&format!("Home Assistant reachable at {}", config.home_assistant.url)),
        Err(e) => return fail(&e.to_string()),
    }

    match clients.destination.name().await {
        Ok(name) => pass(&format!("Office 365 calendar: {name}")),
        Err(e) => return fail(&e.to_string()),
    }

    println!("\nAll checks passed.");
    Ok(())
}

fn pass(message: &str) {
    println!("{} {}", "✓".green(), message);
}

fn fail(message: &str) -> Result<()> {
    println!("{} {}", "✗".red(), message);
    anyhow::bail!("Health check failed")
}
