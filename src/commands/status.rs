use anyhow::Result;
use chrono::Utc;
use ha365_core::config::SyncConfig;
use ha365_core::cycle::plan_cycle;
use ha365_core::reconcile::ReconcileSettings;
use owo_colors::OwoColorize;

use super::{connect, explain};
use crate::render::PlanRender;
use crate::utils::tui;

/// Show what the next sync would do, without changing anything.
pub async fn run(config: &SyncConfig, verbose: bool) -> Result<()> {
    let clients = connect(config, false).await?;
    let settings = ReconcileSettings::from_config(config, Utc::now());

    let spinner = tui::create_spinner("Comparing calendars".to_string());
    let result = plan_cycle(
        &clients.source,
        &clients.destination,
        &config.sync.ha_calendars,
        &settings,
    )
    .await;
    spinner.finish_and_clear();

    let planned = result.map_err(|e| explain(e.into()))?;

    println!("{}", planned.plan.render(&settings.prefixes, verbose));

    if !planned.skipped.is_empty() {
        println!();
        for reason in &planned.skipped {
            println!("   {} {}", "!".yellow(), reason.to_string().dimmed());
        }
    }

    if !planned.plan.is_empty() {
        println!("\nRun `ha365-sync sync` to apply these changes.");
    }

    Ok(())
}
