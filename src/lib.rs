pub mod cache;
pub mod classify;
pub mod compliance;
pub mod config;
pub mod context;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod policy;
pub mod resolver;
pub mod safety;
pub mod store;
pub mod transport;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for an embedding process.
///
/// Host processes that manage their own subscriber can skip this and
/// install their own.
pub fn init_telemetry() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Peduli engine v{}", config::ENGINE_VERSION);
}
