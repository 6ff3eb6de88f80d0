//! Ambient process-entry concerns (SPEC_FULL.md §2.3): the `tracing`
//! subscriber a deployed binary installs for itself, and the
//! process-level `RuntimeConfig` every service process loads once at
//! start. Library crates never depend on this one — only a process
//! entry point does.

mod runtime_config;
mod subscriber;

pub use runtime_config::{RuntimeConfig, RuntimeConfigError};
pub use subscriber::init_tracing;
