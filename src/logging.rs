//! Logging bootstrap.
//!
//! Installs a `tracing` subscriber once per process. The filter comes from
//! `RUST_LOG` when set, else `DEFAULT_FILTER`. Repeated calls are no-ops.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sqlx=warn,rumqttc=warn";

static INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // Another subscriber may already be installed (e.g. by a test
        // harness); keep that one.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
        tracing::info!(
            "[App] blister-monitor {} ({})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );
    });
}
