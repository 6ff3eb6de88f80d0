//! Lazy virtual concatenation of memory, padding, and file-backed byte
//! vectors as a single `Read + Seek` (spec.md §4.14), so a tar stream can
//! be assembled header-by-header without materializing the whole archive
//! in memory.

mod tarvec;
mod vector;

pub use tarvec::TarVec;
pub use vector::{FileVector, MemVector, PaddingVector, Vector};
