//! Small primitives shared by the runtime core crates.
//!
//! This crate has no dependency on any other core crate so that it can sit
//! at the bottom of the dependency graph, the same role `libdd-common` plays
//! for the teacher workspace.

mod opt;
mod panics;

pub use opt::Opt;
pub use panics::bug;
