//! Byte-for-byte serving of the raw asset.
//!
//! Directory paths are never answered with an index file and trailing-slash
//! mismatches are never redirected.

use crate::error::{Error, Result};
use crate::media_type::MediaType;
use crate::path::SafePath;
use crate::source::AssetSource;
use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::Full;
use std::io;
use std::path::Path;

/// Reads `root + P` and answers with its bytes.
pub async fn serve<S: AssetSource>(
    source: &S,
    root: &Path,
    path: &SafePath,
    media_type: &MediaType,
) -> Result<Response<Full<Bytes>>> {
    let file = path.under(root);

    match source.read(&file).await {
        Ok(bytes) => Ok(asset_response(bytes, media_type)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(file)),
        Err(source) => Err(Error::Read { path: file, source }),
    }
}

/// 200 response carrying `bytes` with type and length headers.
pub(crate) fn asset_response(bytes: Bytes, media_type: &MediaType) -> Response<Full<Bytes>> {
    let len = bytes.len();
    let mut response = Response::new(Full::new(bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, media_type.header_value());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

/// Plain-text response for a pipeline failure.
pub(crate) fn error_response(error: &Error) -> Response<Full<Bytes>> {
    status_response(error.status())
}

pub(crate) fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut response = Response::new(Full::new(Bytes::from_static(reason.as_bytes())));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(reason.len()));
    response
}
