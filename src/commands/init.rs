use std::path::Path;

use anyhow::Result;
use ha365_core::config::SyncConfig;

pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it",
            path.display()
        );
    }

    SyncConfig::create_default_config(path)?;

    println!("Wrote {}", path.display());
    println!("\nFill in the Home Assistant token and Office 365 client id, then run:");
    println!("  ha365-sync auth");

    Ok(())
}
