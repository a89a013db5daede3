use crate::codec::AcceptEncoding;
use crate::error::Error;
use crate::fallback::{self, error_response, status_response};
use crate::media_type::{Compressible, MediaType, NarrowPolicy};
use crate::path::SafePath;
use crate::precompressed::{self, Probe};
use crate::source::{AssetSource, FsSource};
use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, trace, warn};

/// Future returned by [`ServeStatic`].
pub type StaticFuture =
    Pin<Box<dyn Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send>>;

/// Result of one stage of the static chain.
///
/// A stage either finishes the request or hands its state to the next stage.
enum Flow<T> {
    Done(Response<Full<Bytes>>),
    Next(T),
}

/// A terminal Tower service serving files below a static root.
///
/// Each request runs the chain: path safety check, precompressed lookup,
/// then the raw file. Exactly one response is produced per request.
///
/// The request path is used as-is, without percent-decoding: `/my%20file.css`
/// looks for a file literally named `my%20file.css`. Decode upstream if
/// assets have names that need escaping.
pub struct ServeStatic<P = NarrowPolicy, S = FsSource> {
    inner: Arc<Inner<P, S>>,
}

struct Inner<P, S> {
    root: PathBuf,
    policy: P,
    source: S,
}

impl ServeStatic {
    /// Serves files below `root` from the filesystem with the narrow policy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_parts(root, NarrowPolicy, FsSource)
    }
}

impl<P, S> ServeStatic<P, S> {
    /// Creates a service with an explicit policy and asset source.
    pub fn with_parts(root: impl Into<PathBuf>, policy: P, source: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                policy,
                source,
            }),
        }
    }

    /// Directory the request paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

impl<P, S> Clone for ServeStatic<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S> fmt::Debug for ServeStatic<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeStatic")
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}

impl<P, S> Inner<P, S>
where
    P: Compressible,
    S: AssetSource,
{
    async fn serve(
        &self,
        method: &Method,
        request_path: &str,
        accepted: AcceptEncoding,
    ) -> Response<Full<Bytes>> {
        if method != Method::GET && method != Method::HEAD {
            let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let path = match check_path(request_path) {
            Flow::Done(response) => return response,
            Flow::Next(path) => path,
        };
        let media_type = MediaType::from_path(path.as_str());

        if let Flow::Done(response) = self.try_precompressed(&path, &media_type, accepted).await {
            return response;
        }

        match fallback::serve(&self.source, &self.root, &path, &media_type).await {
            Ok(response) => {
                debug!(path = path.as_str(), "served static asset");
                response
            }
            Err(err @ Error::NotFound(_)) => {
                debug!(path = path.as_str(), "static asset not found");
                error_response(&err)
            }
            Err(err) => {
                warn!(error = %err, "static asset unreadable");
                error_response(&err)
            }
        }
    }

    async fn try_precompressed(
        &self,
        path: &SafePath,
        media_type: &MediaType,
        accepted: AcceptEncoding,
    ) -> Flow<()> {
        let probe = precompressed::locate(
            &self.source,
            &self.root,
            path,
            media_type,
            accepted,
            &self.policy,
        )
        .await;

        match probe {
            Probe::Found(bytes) => {
                debug!(path = path.as_str(), "served precompressed asset");
                Flow::Done(precompressed::respond(bytes, media_type))
            }
            Probe::Skipped | Probe::Missing => Flow::Next(()),
            // absence or unreadability of a sibling is expected; fall through
            Probe::Failed(e) => {
                trace!(path = path.as_str(), error = %e, "precompressed sibling unreadable");
                Flow::Next(())
            }
        }
    }
}

fn check_path(request_path: &str) -> Flow<SafePath> {
    match SafePath::new(request_path) {
        Ok(path) => Flow::Next(path),
        Err(err) => {
            debug!(error = %err, "rejected static path");
            Flow::Done(error_response(&err))
        }
    }
}

impl<P, S, ReqBody> Service<Request<ReqBody>> for ServeStatic<P, S>
where
    P: Compressible + Send + Sync + 'static,
    S: AssetSource,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = StaticFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let accepted = AcceptEncoding::from_headers(req.headers());

        Box::pin(async move {
            let response = inner.serve(&method, &path, accepted).await;
            if method == Method::HEAD {
                let (parts, _) = response.into_parts();
                return Ok(Response::from_parts(parts, Full::new(Bytes::new())));
            }
            Ok(response)
        })
    }
}
