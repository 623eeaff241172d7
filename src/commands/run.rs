use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use ha365_core::config::SyncConfig;
use ha365_core::cycle::{CycleReport, run_cycle};
use ha365_core::reconcile::ReconcileSettings;
use ha365_core::retry::RetryPolicy;
use tracing::{error, info, warn};

use super::{connect, explain, is_authentication};

/// Sync forever, backing off after failures, until Ctrl-C or SIGTERM.
pub async fn run(config: &SyncConfig, interval: Option<Duration>) -> Result<()> {
    let mut policy = RetryPolicy::from_env()?;
    if let Some(interval) = interval {
        policy = policy.with_interval(interval);
    }

    info!(
        interval = %humantime::format_duration(policy.interval),
        max_retries = policy.max_retries,
        backoff = %humantime::format_duration(policy.backoff),
        "Starting continuous sync"
    );

    let mut consecutive_failures: u32 = 0;

    loop {
        match cycle(config).await {
            Ok(report) if report.succeeded() => consecutive_failures = 0,
            Ok(report) => {
                consecutive_failures = one_more(consecutive_failures);
                if report.sync.has_auth_failure() {
                    error!("Office 365 rejected the access token. Run `ha365-sync auth`");
                }
                for failure in &report.sync.failures {
                    warn!("{failure}");
                }
            }
            Err(e) if is_authentication(&e) => {
                consecutive_failures = one_more(consecutive_failures);
                error!("{e:#}");
            }
            Err(e) => {
                consecutive_failures = one_more(consecutive_failures);
                warn!("Sync cycle failed: {e:#}");
            }
        }

        let delay = policy.delay_after(consecutive_failures);
        info!(
            consecutive_failures,
            "Next sync in {}",
            humantime::format_duration(delay)
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_signal() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Failure count after another failed cycle; pinned at the maximum.
fn one_more(consecutive_failures: u32) -> u32 {
    consecutive_failures.saturating_add(1)
}

/// Connect and sync once. Clients are rebuilt so the token is refreshed between cycles.
async fn cycle(config: &SyncConfig) -> Result<CycleReport> {
    let clients = connect(config, false).await?;
    let settings = ReconcileSettings::from_config(config, Utc::now());

    run_cycle(
        &clients.source,
        &clients.destination,
        &config.sync.ha_calendars,
        &settings,
    )
    .await
    .map_err(|e| explain(e.into()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
