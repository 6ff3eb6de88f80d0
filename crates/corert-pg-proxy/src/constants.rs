/// Postgres v3 protocol constants the proxy needs to recognize on the
/// wire (spec.md §4.13, §6).
pub const SSL_REQUEST_CODE: u32 = 80877103;
pub const CANCEL_REQUEST_CODE: u32 = 80877102;
pub const STARTUP_V3_CODE: u32 = 196608;

/// Messages longer than 1 MiB are rejected (spec.md §6).
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;
