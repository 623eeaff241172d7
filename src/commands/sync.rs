use anyhow::Result;
use chrono::Utc;
use ha365_core::config::SyncConfig;
use ha365_core::cycle::{CycleReport, run_cycle};
use ha365_core::error::SyncError;
use ha365_core::reconcile::ReconcileSettings;

use super::{Clients, connect, explain};
use crate::render::Render;
use crate::utils::tui;

pub async fn run(config: &SyncConfig, interactive: bool) -> Result<()> {
    let clients = connect(config, interactive).await?;
    let report = sync_once(config, &clients).await?;

    println!("{}", report.render());

    if report.sync.has_auth_failure() {
        return Err(explain(
            SyncError::Authentication("Office 365 rejected the access token".into()).into(),
        ));
    }

    if !report.succeeded() {
        anyhow::bail!("{} operation(s) failed", report.sync.failed());
    }

    Ok(())
}

/// One cycle with a fresh window.
pub async fn sync_once(config: &SyncConfig, clients: &Clients) -> Result<CycleReport> {
    let settings = ReconcileSettings::from_config(config, Utc::now());

    let spinner = tui::create_spinner("Syncing Home Assistant to Office 365".to_string());
    let result = run_cycle(
        &clients.source,
        &clients.destination,
        &config.sync.ha_calendars,
        &settings,
    )
    .await;
    spinner.finish_and_clear();

    result.map_err(|e| explain(e.into()))
}
