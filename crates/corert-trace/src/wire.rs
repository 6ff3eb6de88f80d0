//! Trace stream framing and the HTTP headers used to ship a batch to the
//! platform collector (spec.md §6).

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use corert_ids::TraceID;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Fixed magic prefix of a trace stream, ahead of the version byte.
pub const MAGIC: &[u8; 4] = b"ENTR";

/// Current trace wire format version; echoed in the
/// `X-Encore-Trace-Version` upload header.
pub const VERSION: u8 = 1;

/// Prefixes `events` (the concatenated bytes from one or more
/// `TraceEventLog::get_and_clear` calls) with the fixed magic header and
/// version byte, producing one self-delimited trace stream.
pub fn frame_stream(events: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + events.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(events);
    out
}

/// Splits a framed stream back into its version byte and event bytes;
/// `None` if the magic prefix doesn't match.
pub fn unframe_stream(stream: &[u8]) -> Option<(u8, &[u8])> {
    let rest = stream.strip_prefix(MAGIC.as_slice())?;
    let (version, events) = rest.split_first()?;
    Some((*version, events))
}

/// The fixed set of HTTP headers sent alongside a trace upload.
pub struct UploadHeaders {
    pub app_id: String,
    pub env_id: String,
    pub deploy_id: String,
    pub app_commit: String,
    pub trace_id: TraceID,
    pub trace_version: u8,
    /// RFC1123, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
    pub date: String,
    pub auth: String,
}

/// Computes `X-Encore-Auth`:
/// `base64raw(be32(keyID) || HMAC-SHA256(key, date || \x00 || path))`.
pub fn sign_auth_header(key_id: u32, key: &[u8], date: &str, path: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(date.as_bytes());
    mac.update(&[0u8]);
    mac.update(path.as_bytes());
    let tag = mac.finalize().into_bytes();

    let mut signed = Vec::with_capacity(4 + tag.len());
    signed.extend_from_slice(&key_id.to_be_bytes());
    signed.extend_from_slice(&tag);
    URL_SAFE_NO_PAD.encode(signed)
}

/// Builds the full header set for uploading `trace_id`'s bytes at `date`
/// against endpoint `path`, signing with `(key_id, key)`.
#[allow(clippy::too_many_arguments)]
pub fn build_upload_headers(
    app_id: &str,
    env_id: &str,
    deploy_id: &str,
    app_commit: &str,
    trace_id: TraceID,
    date: String,
    path: &str,
    key_id: u32,
    key: &[u8],
) -> UploadHeaders {
    let auth = sign_auth_header(key_id, key, &date, path);
    UploadHeaders {
        app_id: app_id.to_string(),
        env_id: env_id.to_string(),
        deploy_id: deploy_id.to_string(),
        app_commit: app_commit.to_string(),
        trace_id,
        trace_version: VERSION,
        date,
        auth,
    }
}

impl UploadHeaders {
    /// `X-Encore-Trace-ID`: base64 raw-std of the 16 trace id bytes.
    pub fn trace_id_header(&self) -> String {
        STANDARD_NO_PAD.encode(self.trace_id.0)
    }

    pub fn as_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-Encore-App-ID", self.app_id.clone()),
            ("X-Encore-Env-ID", self.env_id.clone()),
            ("X-Encore-Deploy-ID", self.deploy_id.clone()),
            ("X-Encore-App-Commit", self.app_commit.clone()),
            ("X-Encore-Trace-ID", self.trace_id_header()),
            ("X-Encore-Trace-Version", self.trace_version.to_string()),
            ("Date", self.date.clone()),
            ("X-Encore-Auth", self.auth.clone()),
        ]
    }
}
