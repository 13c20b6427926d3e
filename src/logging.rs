//! Development-time tracing setup
//!
//! The engine logs through `tracing` everywhere; embedders that already run
//! a subscriber should skip this and install their own.

/// Initialize a stderr tracing subscriber from `RUST_LOG`
///
/// Defaults to `warn` when the variable is unset. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
