//! Cascaded cancellation contexts for task drain, resource close, and
//! force-exit (spec.md §3 `ShutdownProgress`, §4.12 Shutdown Coordinator
//! / C12).

mod cancel_context;
mod process;
mod task_counter;

pub use cancel_context::CancelContext;
pub use process::{Process, ShutdownHandler, ShutdownProgress};
pub use task_counter::{TaskCounter, TaskGuard};
