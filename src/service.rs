use crate::codec::{AcceptEncoding, Codec};
use crate::future::ResponseFuture;
use http::Request;
use http_body::Body;
use std::task::{Context, Poll};
use tower::{BoxError, Service};

/// A Tower service that compresses in-memory response bodies.
#[derive(Debug, Clone)]
pub struct CompressionService<S> {
    inner: S,
    codec: Codec,
    min_size: usize,
}

impl<S> CompressionService<S> {
    /// Creates a new compression service wrapping the given inner service.
    pub fn new(inner: S, codec: Codec, min_size: usize) -> Self {
        Self {
            inner,
            codec,
            min_size,
        }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: Into<BoxError>,
    ResBody: Body,
    ResBody::Error: Into<BoxError>,
{
    type Response = http::Response<crate::body::CompressionBody<ResBody>>;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let accepted = AcceptEncoding::from_headers(req.headers());

        let inner = self.inner.call(req);

        ResponseFuture::new(inner, accepted, self.codec, self.min_size)
    }
}
