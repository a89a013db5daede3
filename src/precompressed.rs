//! Lookup of brotli-precompressed siblings of static assets.
//!
//! For a request path `P` the precompressed variant lives at `P.br` under the
//! same root and holds the brotli-compressed bytes of `P`. Producing those
//! files is a build step outside this crate.

use crate::codec::{AcceptEncoding, Codec};
use crate::fallback::asset_response;
use crate::media_type::{Compressible, MediaType};
use crate::path::SafePath;
use crate::source::AssetSource;
use bytes::Bytes;
use http::{HeaderValue, Response, header};
use http_body_util::Full;
use std::io;
use std::path::Path;

/// File name suffix of precompressed siblings.
pub const BROTLI_SUFFIX: &str = ".br";

/// Outcome of probing for a precompressed sibling.
#[derive(Debug)]
pub enum Probe {
    /// Client or media type not eligible; the filesystem was not touched.
    Skipped,
    /// The sibling exists; holds its bytes verbatim.
    Found(Bytes),
    /// No sibling exists.
    Missing,
    /// The sibling could not be read.
    Failed(io::Error),
}

impl Probe {
    /// Only a found sibling ends the chain.
    pub fn is_found(&self) -> bool {
        matches!(self, Probe::Found(_))
    }
}

/// Probes for `P.br` when the client accepts brotli and `P` is compressible.
pub async fn locate<S, P>(
    source: &S,
    root: &Path,
    path: &SafePath,
    media_type: &MediaType,
    accepted: AcceptEncoding,
    policy: &P,
) -> Probe
where
    S: AssetSource,
    P: Compressible + ?Sized,
{
    if !accepted.accepts(Codec::Brotli) || !media_type.is_compressible(policy) {
        return Probe::Skipped;
    }

    match source.read(&path.under_with_suffix(root, BROTLI_SUFFIX)).await {
        Ok(bytes) => Probe::Found(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Probe::Missing,
        Err(e) => Probe::Failed(e),
    }
}

/// Response for a found sibling: the type of `P`, encoded as brotli.
pub fn respond(bytes: Bytes, media_type: &MediaType) -> Response<Full<Bytes>> {
    let mut response = asset_response(bytes, media_type);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_ENCODING,
        HeaderValue::from_static(Codec::Brotli.content_encoding()),
    );
    headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    response
}
