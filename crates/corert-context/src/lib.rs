//! Goroutine-local slot and Request Tracker (spec.md C5 + C6).

mod operation;
mod request;
pub mod slot;
mod tracker;

pub use operation::Operation;
pub use request::{Request, RequestKind, RequestPayload};
pub use slot::{spawn_tracked, Slot};
pub use tracker::{Current, RequestTracker};
