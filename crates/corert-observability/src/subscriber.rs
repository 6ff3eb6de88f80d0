use tracing_subscriber::{fmt, EnvFilter};

/// Installs the process-wide `tracing` subscriber: an env-filter
/// (`RUST_LOG`, defaulting to `info`) over a compact formatter — the
/// shape every deployed binary built from the teacher's crates wires up
/// for itself (library crates never install one). Idempotent: a second
/// call is a harmless no-op if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).compact().try_init();
}
