//! Audio asset delivery with Range support and large-file streaming.
//!
//! Response matrix:
//! - backing storage unavailable: 503
//! - asset missing: 404
//! - `Range` header: single byte range, capped at 5 MiB, 206 with exact
//!   `Content-Range`/`Content-Length`; malformed or unsatisfiable: 416
//! - no `Range`, asset over 30 MiB: chunked 1 MiB streaming without
//!   `Content-Length`, so playback can start before the asset is read
//! - no `Range`, small asset: full body with `Content-Length` and
//!   `Content-Disposition: inline`
//!
//! Mid-stream read errors after headers are sent cannot become a
//! different status code; the stream ends early. That is inherent to
//! streaming responses, and buffering to avoid it would defeat streaming.

use super::range::parse_range;
use crate::storage::LocalObjectStore;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Maximum bytes served for a single Range request, even when the client
/// asked for more.
pub const MAX_RANGE_BYTES: u64 = 5 * 1024 * 1024;

/// Assets above this size are streamed instead of buffered.
pub const LARGE_FILE_BYTES: u64 = 30 * 1024 * 1024;

/// Chunk size for streamed delivery.
pub const STREAM_CHUNK_BYTES: usize = 1024 * 1024;

const CONTENT_TYPE_AUDIO: &str = "audio/mpeg";

/// Build the audio response for a resource, honoring an optional `Range`
/// header value.
pub async fn audio_response(
    store: &LocalObjectStore,
    resource_id: &str,
    range_header: Option<&str>,
) -> Response {
    if !store.available() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
    }

    let path = store.audio_path(resource_id);
    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "Audio not found").into_response();
        }
        Err(e) => {
            warn!("Cannot stat {}: {}", path.display(), e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
        }
    };

    if let Some(header_value) = range_header {
        return match parse_range(header_value, size) {
            Some(range) => {
                let range = range.clamp_len(MAX_RANGE_BYTES);
                serve_range(&path, range, size).await
            }
            None => {
                let mut response =
                    (StatusCode::RANGE_NOT_SATISFIABLE, "Invalid range").into_response();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_RANGE, value);
                }
                response
            }
        };
    }

    if size > LARGE_FILE_BYTES {
        serve_streamed(&path, size).await
    } else {
        serve_full(&path, size).await
    }
}

/// 206 with the requested (possibly truncated) window.
async fn serve_range(path: &std::path::Path, range: super::range::ByteRange, size: u64) -> Response {
    debug!(
        "Serving range {} of {} ({} bytes)",
        range.content_range(size),
        path.display(),
        range.len()
    );

    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            warn!("Cannot open {}: {}", path.display(), e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
        }
    };

    if let Err(e) = file.seek(SeekFrom::Start(range.start)).await {
        warn!("Seek failed on {}: {}", path.display(), e);
        return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
    }

    let mut buf = vec![0u8; range.len() as usize];
    if let Err(e) = file.read_exact(&mut buf).await {
        warn!("Read failed on {}: {}", path.display(), e);
        return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
    }

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_AUDIO)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_RANGE, range.content_range(size))
        .header(header::CONTENT_LENGTH, range.len().to_string())
        .body(Body::from(buf))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Chunked streaming without Content-Length for large assets.
async fn serve_streamed(path: &std::path::Path, size: u64) -> Response {
    debug!("Streaming {} ({} bytes) in chunks", path.display(), size);

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            warn!("Cannot open {}: {}", path.display(), e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
        }
    };

    let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_BYTES);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_AUDIO)
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Full-body delivery for small assets.
async fn serve_full(path: &std::path::Path, size: u64) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable").into_response();
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_AUDIO)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CONTENT_DISPOSITION, "inline")
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStore;
    use axum::body::to_bytes;

    async fn store_with_asset(resource_id: &str, bytes: &[u8]) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put(&format!("{}/audio.mp3", resource_id), bytes)
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_asset_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let response = audio_response(&store, "nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unavailable_storage_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("never-created"));

        let response = audio_response(&store, "s1", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_range_request_returns_exact_window() {
        let (_dir, store) = store_with_asset("s1", &vec![7u8; 1000]).await;

        let response = audio_response(&store, "s1", Some("bytes=0-99")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 0-99/1000"
        );
        assert_eq!(
            response.headers().get(header::ACCEPT_RANGES).unwrap(),
            "bytes"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "100"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 100);
    }

    #[tokio::test]
    async fn test_oversized_range_truncated_to_cap() {
        let size = MAX_RANGE_BYTES + 4096;
        let (_dir, store) = store_with_asset("s1", &vec![1u8; size as usize]).await;

        let response = audio_response(&store, "s1", Some(&format!("bytes=0-{}", size - 1))).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

        // Content-Range reflects the truncated window, not the request
        let expected = format!("bytes 0-{}/{}", MAX_RANGE_BYTES - 1, size);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            expected.as_str()
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len() as u64, MAX_RANGE_BYTES);
    }

    #[tokio::test]
    async fn test_malformed_range_is_416() {
        let (_dir, store) = store_with_asset("s1", &vec![0u8; 100]).await;

        let response = audio_response(&store, "s1", Some("bytes=banana")).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */100"
        );
    }

    #[tokio::test]
    async fn test_small_asset_served_inline_with_length() {
        let (_dir, store) = store_with_asset("s1", &vec![9u8; 2048]).await;

        let response = audio_response(&store, "s1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "2048"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "inline"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 2048);
    }
}
