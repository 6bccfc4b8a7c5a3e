pub mod activity;
pub mod config;
pub mod counter;
pub mod dashboard;
pub mod logging;
pub mod selection;
pub mod store;
pub mod transport;

use crate::activity::{ActivityLog, LogKind};
use crate::config::{resolve_config_path, AppConfig};
use crate::counter::WindowCounter;
use crate::dashboard::console::{run_console, ConsoleExit};
use crate::dashboard::Dashboard;
use crate::selection::{run_signal_loop, SeededRandom, SelectionCoordinator};
use crate::store::SqliteStore;
use crate::transport::{run_event_pump, MqttSource};
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tokio::io::BufReader;

pub async fn run() -> anyhow::Result<()> {
    logging::init();

    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let database_url = config.resolve_database_url();
    let store = Arc::new(
        SqliteStore::open(&database_url)
            .await
            .with_context(|| format!("opening database {}", database_url))?,
    );
    if config.seed_demo {
        store.seed_demo().await.context("seeding demo patient")?;
    }

    let mut coordinator = SelectionCoordinator::new(store.clone(), store.clone())
        .with_record_timeout(config.record_timeout());
    if let Some(seed) = config.random_seed {
        tracing::info!("[App] Using fixed random seed {}", seed);
        coordinator = coordinator.with_random(Arc::new(SeededRandom::new(seed)));
    }
    let coordinator = Arc::new(coordinator);

    let log = ActivityLog::new(config.log_capacity);
    let (counter, signals) = WindowCounter::spawn(config.counter);

    let signal_task = tokio::spawn(run_signal_loop(
        coordinator.clone(),
        signals,
        log.clone(),
        config.counter.window_secs,
    ));

    let source = MqttSource::new(
        &config.broker_host,
        config.broker_port,
        &config.channel,
        config.reconnect_delay(),
    );
    let pump_task = tokio::spawn(run_event_pump(source, counter.clone(), log.clone()));

    let dashboard = Dashboard::new(coordinator, counter, log.clone()).with_history(store);
    match dashboard.refresh().await {
        Ok(subjects) if subjects.is_empty() => {
            log.push(LogKind::Info, "No patients in the database yet.");
        }
        Ok(subjects) => tracing::info!("[App] Loaded {} patients", subjects.len()),
        Err(e) => tracing::error!("[App] Initial patient load failed: {}", e),
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let exit = run_console(&dashboard, stdin, tokio::io::stdout())
        .await
        .context("console I/O")?;
    hold_until_shutdown(exit, ctrl_c()).await;

    // The pump holds a counter handle and never finishes on its own.
    pump_task.abort();
    drop(dashboard);
    let _ = pump_task.await;
    if let Err(e) = signal_task.await {
        tracing::error!("[App] Signal loop failed: {}", e);
    }
    tracing::info!("[App] Shutdown complete");
    Ok(())
}

/// `quit` returns at once. Closed input leaves the monitor running until
/// `shutdown` resolves.
async fn hold_until_shutdown<F>(exit: ConsoleExit, shutdown: F)
where
    F: Future<Output = ()>,
{
    if exit == ConsoleExit::EndOfInput {
        tracing::info!("[App] Console input closed, monitoring until Ctrl-C");
        shutdown.await;
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[App] Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[App] Ctrl-C received");
}
