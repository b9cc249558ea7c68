use anyhow::Context;
use smartnode_core::api::{ApiClient, ApiReadiness};
use smartnode_core::config::{Config, WarnLevel};
use smartnode_core::executor::UnimplementedStaker;
use smartnode_core::{CancellationToken, Scheduler, SchedulerConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(dir: &Path) -> anyhow::Result<()> {
    let config = Config::load(dir).context("failed to load config")?;

    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => warn!("config: {}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let task = &config.tasks.stake_prelaunch;
    if !task.enabled {
        warn!("stake_prelaunch task is disabled, nothing to run");
        return Ok(());
    }

    let client = Arc::new(ApiClient::from_config(&config.api)?);
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        // The readiness gate resolves the node account; until the API
        // answers, cycles are skipped.
        let shutdown = CancellationToken::new();
        let readiness = Arc::new(
            ApiReadiness::from_config(Arc::clone(&client), &config.readiness)
                .with_account(config.node.account),
        );
        let handle = Scheduler::new(
            SchedulerConfig::from_task(&config.tasks.stake_prelaunch),
            client,
            Arc::new(UnimplementedStaker),
            readiness,
        )
        .with_cancel_token(shutdown.child_token())
        .start();

        shutdown_signal().await;
        info!("shutting down");
        shutdown.cancel();
        handle.stop().await.context("scheduler did not stop cleanly")?;
        anyhow::Ok(())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
