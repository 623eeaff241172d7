use anyhow::Result;
use chrono::Utc;
use dialoguer::Confirm;
use ha365_core::adapter::Destination;
use ha365_core::config::SyncConfig;
use ha365_core::reconcile::{OperationPlan, apply_plan};
use owo_colors::OwoColorize;

use super::{connect, explain};
use crate::render::{PlanRender, Render};
use crate::utils::tui;

/// Delete every managed event in the sync window.
pub async fn run(config: &SyncConfig, yes: bool) -> Result<()> {
    let clients = connect(config, false).await?;
    let window = config.window(Utc::now());
    let prefixes = config.prefixes();

    let spinner = tui::create_spinner("Listing synced events".to_string());
    let result = clients.destination.list_managed_events(&window).await;
    spinner.finish_and_clear();

    let mut managed = result.map_err(|e| explain(e.into()))?;

    if managed.is_empty() {
        println!("{}", "No synced events to delete.".dimmed());
        return Ok(());
    }

    managed.sort_by(|a, b| (a.start, &a.destination_id).cmp(&(b.start, &b.destination_id)));
    let plan = OperationPlan {
        to_delete: managed,
        ..OperationPlan::default()
    };

    println!("{}", plan.render(&prefixes, true));
    println!();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} synced events from Office 365?",
                plan.to_delete.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let report = apply_plan(&clients.destination, &plan, &prefixes).await;
    println!("{}", report.render());

    if !report.is_clean() {
        anyhow::bail!("{} deletion(s) failed", report.failed());
    }

    Ok(())
}
