//! Best-effort HTTPS shipment of a framed trace stream to the platform
//! collector (spec.md §4.4, §6, §7): one POST per batch, a 5-second
//! deadline on the whole attempt, no retry — a failed upload logs and the
//! batch is dropped.

use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::wire::{frame_stream, UploadHeaders};

/// Deadline on one upload attempt (spec.md §4.13: "trace upload (5 s)").
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

pub type UploadClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Builds the shared HTTPS client every trace upload in this process
/// reuses; cheap to clone, not cheap to build, so callers build one at
/// startup (mirrors `new_default_client` in the teacher's `libdd-common`).
pub fn new_client() -> UploadClient {
    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_only()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new()).build(https)
}

/// Why an upload attempt didn't land; every variant is logged and
/// swallowed by [`ship`], never propagated — trace delivery is best-effort.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to build the upload request: {0}")]
    Build(#[from] http::Error),
    #[error("upload request failed: {0}")]
    Network(#[from] hyper_util::client::legacy::Error),
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("collector rejected the upload with status {0}")]
    Rejected(StatusCode),
}

/// Frames `events` and POSTs them to `collector_url` with `headers`,
/// bounded by [`UPLOAD_TIMEOUT`]. Returns the error instead of logging it,
/// so callers that want the stderr-fallback behavior of spec.md §7 call
/// [`ship`] instead; this is the testable, non-swallowing half.
pub async fn upload(
    client: &UploadClient,
    collector_url: &str,
    headers: &UploadHeaders,
    events: &[u8],
) -> Result<(), UploadError> {
    let body = frame_stream(events);
    let mut builder = Request::post(collector_url);
    for (name, value) in headers.as_pairs() {
        builder = builder.header(name, value);
    }
    let request = builder.body(Full::new(Bytes::from(body)))?;

    let attempt = client.request(request);
    let response = tokio::time::timeout(UPLOAD_TIMEOUT, attempt)
        .await
        .map_err(|_| UploadError::Timeout(UPLOAD_TIMEOUT))??;

    if !response.status().is_success() {
        return Err(UploadError::Rejected(response.status()));
    }
    Ok(())
}

/// Ships `events` to `collector_url`, logging and dropping the batch on
/// any failure (spec.md §7: "Trace upload failures log to stderr and drop
/// the batch (traces are best-effort)"). Never returns an error — there is
/// nothing a caller could usefully do with one.
pub async fn ship(client: &UploadClient, collector_url: &str, headers: &UploadHeaders, events: &[u8]) {
    if let Err(err) = upload(client, collector_url, headers, events).await {
        tracing::error!(
            error = %err,
            trace_id = %headers.trace_id,
            bytes = events.len(),
            "trace upload failed, dropping batch"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corert_ids::TraceID;

    fn headers() -> UploadHeaders {
        crate::wire::build_upload_headers(
            "app1",
            "env1",
            "deploy1",
            "commit1",
            TraceID::zero(),
            "Tue, 15 Nov 1994 08:12:31 GMT".to_string(),
            "/trace/upload",
            1,
            b"key",
        )
    }

    #[tokio::test]
    async fn upload_to_an_unroutable_host_fails_fast_with_a_network_error() {
        let client = new_client();
        let err = upload(&client, "https://127.0.0.1.invalid/trace/upload", &headers(), b"events")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Network(_) | UploadError::Build(_)));
    }

    #[tokio::test]
    async fn ship_never_panics_on_a_failed_upload() {
        let client = new_client();
        ship(&client, "https://127.0.0.1.invalid/trace/upload", &headers(), b"events").await;
    }
}
