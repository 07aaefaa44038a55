use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Honours `RUST_LOG`; falls back to `info` when it is unset or invalid.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
