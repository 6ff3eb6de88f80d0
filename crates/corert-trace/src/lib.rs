//! Trace Event Log, event ids, and upload framing (spec.md C4).
//!
//! Owns the in-memory, length-prefixed binary event buffer for the life of
//! one root operation. Mutating calls take a single internal lock
//! ([`TraceEventLog::add`]); suspension never happens inside it.

mod anchor;
mod event_type;
mod log;
mod upload;
mod wire;

pub use anchor::Anchor;
pub use event_type::{EventType, PointKind};
pub use log::TraceEventLog;
pub use upload::{new_client, ship, upload as upload_once, UploadClient, UploadError, UPLOAD_TIMEOUT};
pub use wire::{build_upload_headers, frame_stream, sign_auth_header, unframe_stream, UploadHeaders, MAGIC, VERSION};
