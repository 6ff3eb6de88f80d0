//! Opaque `Value[T]` factories tied to per-service configuration blobs,
//! with test-time overrides (spec.md §4.11, Configuration Values / C11).

mod store;
mod test_scope;
mod value;

pub use store::Blobs;
pub use test_scope::{TestHandle, TestScopeGuard, TestTree};
pub use value::{ConfigStore, Value, ValueId, ValueMeta};
