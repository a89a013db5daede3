use crate::body::{CompressionBody, extend_from_buf};
use crate::codec::{AcceptEncoding, Codec};
use crate::error::Error;
use bytes::{Bytes, BytesMut};
use http::{Response, header};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::task::JoinHandle;
use tower::BoxError;
use tracing::warn;

/// Encodes a fully buffered body with the given codec.
pub(crate) type Encode = fn(Codec, &[u8]) -> io::Result<Bytes>;

fn encode(codec: Codec, input: &[u8]) -> io::Result<Bytes> {
    codec.compress(input)
}

pin_project! {
    /// Future for compression service responses.
    ///
    /// Runs `HANDLING -> BODY_SET -> COMPRESSING -> SENT`, skipping
    /// compression when the body does not qualify.
    pub struct ResponseFuture<F, B> {
        #[pin]
        state: State<F, B>,
        accepted: AcceptEncoding,
        codec: Codec,
        min_size: usize,
        encode: Encode,
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F, B> {
        Handling {
            #[pin]
            inner: F,
        },
        Buffering {
            head: Response<()>,
            #[pin]
            body: B,
            buf: BytesMut,
        },
        Compressing {
            head: Response<()>,
            original: Bytes,
            task: JoinHandle<io::Result<Bytes>>,
        },
        Sent,
    }
}

impl<F, B> ResponseFuture<F, B> {
    pub(crate) fn new(inner: F, accepted: AcceptEncoding, codec: Codec, min_size: usize) -> Self {
        Self {
            state: State::Handling { inner },
            accepted,
            codec,
            min_size,
            encode,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_encode(mut self, encode: Encode) -> Self {
        self.encode = encode;
        self
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    E: Into<BoxError>,
    B: Body,
    B::Error: Into<BoxError>,
{
    type Output = Result<Response<CompressionBody<B>>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            match this.state.as_mut().project() {
                StateProj::Handling { inner } => {
                    let response = match ready!(inner.poll(cx)) {
                        Ok(response) => response,
                        Err(e) => return Poll::Ready(Err(e.into())),
                    };
                    let (parts, body) = response.into_parts();
                    let head = Response::from_parts(parts, ());

                    if !should_buffer(&head, &body, *this.accepted, *this.codec, *this.min_size) {
                        this.state.set(State::Sent);
                        return Poll::Ready(Ok(head.map(|()| CompressionBody::passthrough(body))));
                    }

                    this.state.set(State::Buffering {
                        head,
                        body,
                        buf: BytesMut::new(),
                    });
                }

                StateProj::Buffering { head, body, buf } => {
                    match ready!(body.poll_frame(cx)) {
                        Some(Ok(frame)) => {
                            // trailers cannot follow a buffered body
                            if let Ok(data) = frame.into_data() {
                                extend_from_buf(buf, data);
                            }
                        }
                        Some(Err(e)) => {
                            this.state.set(State::Sent);
                            return Poll::Ready(Err(e.into()));
                        }
                        None => {
                            let head = mem::take(head);
                            let original = mem::take(buf).freeze();

                            if original.len() <= *this.min_size {
                                this.state.set(State::Sent);
                                return Poll::Ready(Ok(finish(head, original, None)));
                            }

                            let (codec, encode) = (*this.codec, *this.encode);
                            let input = original.clone();
                            let task = tokio::task::spawn_blocking(move || encode(codec, &input));
                            this.state.set(State::Compressing {
                                head,
                                original,
                                task,
                            });
                        }
                    }
                }

                StateProj::Compressing {
                    head,
                    original,
                    task,
                } => {
                    let codec = *this.codec;
                    let result = match ready!(Pin::new(task).poll(cx)) {
                        Ok(result) => result,
                        Err(join_error) => Err(io::Error::other(join_error)),
                    };
                    let head = mem::take(head);

                    let response = match result {
                        Ok(compressed) => finish(head, compressed, Some(codec)),
                        Err(source) => {
                            let err = Error::Compression { codec, source };
                            warn!(error = %err, cause = %source_of(&err), "sending body uncompressed");
                            finish(head, mem::take(original), None)
                        }
                    };

                    this.state.set(State::Sent);
                    return Poll::Ready(Ok(response));
                }

                StateProj::Sent => panic!("ResponseFuture polled after completion"),
            }
        }
    }
}

/// Decides, before reading the body, whether it is worth buffering.
fn should_buffer<B: Body>(
    head: &Response<()>,
    body: &B,
    accepted: AcceptEncoding,
    codec: Codec,
    min_size: usize,
) -> bool {
    let headers = head.headers();

    accepted.accepts(codec)
        && !body.is_end_stream()
        && !has_content_encoding(headers)
        && !has_content_range(headers)
        && !is_at_most_min_size(headers, body, min_size)
}

/// Attaches the final body, marking it as encoded with `codec` if given.
fn finish<B>(
    head: Response<()>,
    data: Bytes,
    codec: Option<Codec>,
) -> Response<CompressionBody<B>> {
    let (mut parts, ()) = head.into_parts();

    if let Some(codec) = codec {
        parts.headers.insert(
            header::CONTENT_ENCODING,
            header::HeaderValue::from_static(codec.content_encoding()),
        );

        // Ranges over the identity representation no longer apply
        parts.headers.remove(header::ACCEPT_RANGES);

        add_vary_accept_encoding(&mut parts.headers);
    }

    parts
        .headers
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(data.len()));

    Response::from_parts(parts, CompressionBody::buffered(data))
}

fn source_of(err: &Error) -> String {
    std::error::Error::source(err)
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Checks if Content-Encoding header is already present.
fn has_content_encoding(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_ENCODING)
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Adds `accept-encoding` to `Vary` unless it, or `*`, is already listed.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    let covered = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|name| name == "*" || name.eq_ignore_ascii_case("accept-encoding"));

    if !covered {
        headers.append(
            header::VARY,
            header::HeaderValue::from_static("accept-encoding"),
        );
    }
}

/// Checks if a known body length is at or below the minimum size.
///
/// Prefers the body's exact size hint over a declared Content-Length.
fn is_at_most_min_size<B: Body>(headers: &header::HeaderMap, body: &B, min_size: usize) -> bool {
    let declared = || {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    };

    body.size_hint()
        .exact()
        .or_else(declared)
        .is_some_and(|len| len <= min_size as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body::Frame;
    use http_body_util::{BodyExt, Empty, Full};
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::future::{Ready, ready};
    use std::io::Read;

    /// A body of unknown length that yields predefined chunks.
    struct ChunkedBody {
        chunks: VecDeque<Bytes>,
    }

    impl ChunkedBody {
        fn new<I: IntoIterator<Item = String>>(chunks: I) -> Self {
            Self {
                chunks: chunks.into_iter().map(Bytes::from).collect(),
            }
        }
    }

    impl Body for ChunkedBody {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Ready(self.chunks.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }

    fn text(len: usize) -> String {
        "<p>lorem ipsum dolor sit amet</p>\n"
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    fn make_response<I>(body: String, headers: I) -> Response<Full<Bytes>>
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        for (name, value) in headers {
            response
                .headers_mut()
                .append(name, header::HeaderValue::from_static(value));
        }
        response
    }

    fn future_for<B>(
        response: Response<B>,
        accept: &str,
        codec: Codec,
    ) -> ResponseFuture<Ready<Result<Response<B>, Infallible>>, B> {
        ResponseFuture::new(
            ready(Ok(response)),
            AcceptEncoding::parse(accept),
            codec,
            crate::DEFAULT_MIN_SIZE,
        )
    }

    async fn run<B>(
        response: Response<B>,
        accept: &str,
        codec: Codec,
    ) -> (http::response::Parts, Bytes)
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let response = future_for(response, accept, codec).await.unwrap();
        let (parts, body) = response.into_parts();
        (parts, body.collect().await.unwrap().to_bytes())
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(data)
            .read_to_end(&mut decoded)
            .unwrap();
        decoded
    }

    fn unbrotli(data: &[u8]) -> Vec<u8> {
        let mut decoded = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut decoded)
            .unwrap();
        decoded
    }

    #[tokio::test]
    async fn test_gzip_round_trip() {
        let body = text(4000);
        let response = make_response(body.clone(), [("content-type", "text/html")]);
        let (parts, data) = run(response, "gzip", Codec::Gzip).await;

        assert_eq!(parts.headers[header::CONTENT_ENCODING], "gzip");
        assert_eq!(parts.headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(
            parts.headers[header::CONTENT_LENGTH],
            data.len().to_string().as_str()
        );
        assert_eq!(gunzip(&data), body.as_bytes());
    }

    #[tokio::test]
    async fn test_brotli_round_trip() {
        let body = text(4000);
        let response = make_response(body.clone(), []);
        let (parts, data) = run(response, "gzip, br", Codec::Brotli).await;

        assert_eq!(parts.headers[header::CONTENT_ENCODING], "br");
        assert_eq!(unbrotli(&data), body.as_bytes());
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let (parts, data) = run(make_response(text(256), []), "gzip", Codec::Gzip).await;
        assert!(parts.headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(data, Bytes::from(text(256)));

        let (parts, data) = run(make_response(text(257), []), "gzip", Codec::Gzip).await;
        assert_eq!(parts.headers[header::CONTENT_ENCODING], "gzip");
        assert_eq!(gunzip(&data), text(257).as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_length_is_measured_after_buffering() {
        let response = Response::new(ChunkedBody::new([text(60), text(40)]));
        let (parts, data) = run(response, "gzip", Codec::Gzip).await;

        assert!(parts.headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(parts.headers[header::CONTENT_LENGTH], "100");
        assert_eq!(data.len(), 100);
    }

    #[tokio::test]
    async fn test_chunked_body_round_trip() {
        let chunks = [text(300), text(500), text(700)];
        let expected = chunks.concat();
        let response = Response::new(ChunkedBody::new(chunks));
        let (parts, data) = run(response, "br", Codec::Brotli).await;

        assert_eq!(parts.headers[header::CONTENT_ENCODING], "br");
        assert_eq!(unbrotli(&data), expected.as_bytes());
    }

    #[tokio::test]
    async fn test_no_compress_without_accept_encoding() {
        let response = future_for(make_response(text(1000), []), "", Codec::Gzip)
            .await
            .unwrap();

        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_only_configured_codec_is_used() {
        let response = future_for(make_response(text(1000), []), "br", Codec::Gzip)
            .await
            .unwrap();

        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
    }

    #[tokio::test]
    async fn test_empty_body_is_left_alone() {
        let mut response = Response::new(Empty::<Bytes>::new());
        *response.status_mut() = http::StatusCode::BAD_REQUEST;
        let response = future_for(response, "gzip", Codec::Gzip).await.unwrap();

        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn test_no_compress_when_content_encoding_present() {
        let response = make_response(text(1000), [("content-encoding", "br")]);
        let response = future_for(response, "br", Codec::Brotli).await.unwrap();

        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    }

    #[tokio::test]
    async fn test_no_compress_range_response() {
        let response = make_response(text(1000), [("content-range", "bytes 0-999/5000")]);
        let response = future_for(response, "gzip", Codec::Gzip).await.unwrap();

        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
    }

    #[tokio::test]
    async fn test_declared_small_length_skips_buffering() {
        let mut response = Response::new(ChunkedBody::new([text(1000)]));
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from(10usize));
        let response = future_for(response, "gzip", Codec::Gzip).await.unwrap();

        assert!(matches!(response.body(), CompressionBody::Passthrough { .. }));
    }

    #[tokio::test]
    async fn test_vary_header_added() {
        let (parts, _) = run(make_response(text(1000), []), "gzip", Codec::Gzip).await;
        assert_eq!(parts.headers[header::VARY], "accept-encoding");
    }

    #[tokio::test]
    async fn test_vary_header_appended() {
        let response = make_response(text(1000), [("vary", "origin")]);
        let (parts, _) = run(response, "gzip", Codec::Gzip).await;

        let vary_values: Vec<_> = parts
            .headers
            .get_all(header::VARY)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(vary_values, vec!["origin", "accept-encoding"]);
    }

    #[tokio::test]
    async fn test_vary_header_star_not_modified() {
        let response = make_response(text(1000), [("vary", "*")]);
        let (parts, _) = run(response, "gzip", Codec::Gzip).await;
        assert_eq!(parts.headers.get_all(header::VARY).iter().count(), 1);
        assert_eq!(parts.headers[header::VARY], "*");
    }

    fn failing_encode(_codec: Codec, _input: &[u8]) -> io::Result<Bytes> {
        Err(io::Error::other("encoder rejected input"))
    }

    fn panicking_encode(_codec: Codec, _input: &[u8]) -> io::Result<Bytes> {
        panic!("encoder crashed")
    }

    async fn run_failing(encode: Encode) {
        let body = text(1000);
        let mut response = make_response(
            body.clone(),
            [("content-type", "text/html"), ("accept-ranges", "bytes")],
        );
        *response.status_mut() = http::StatusCode::CREATED;

        let response = future_for(response, "gzip", Codec::Gzip)
            .with_encode(encode)
            .await
            .unwrap();
        let (parts, data) = response.into_parts();
        let data = data.collect().await.unwrap().to_bytes();

        assert_eq!(parts.status, http::StatusCode::CREATED);
        assert!(parts.headers.get(header::CONTENT_ENCODING).is_none());
        assert!(parts.headers.get(header::VARY).is_none());
        assert_eq!(parts.headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(parts.headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(parts.headers[header::CONTENT_LENGTH], "1000");
        assert_eq!(data, Bytes::from(body));
    }

    #[tokio::test]
    async fn test_encoder_error_sends_original_body() {
        run_failing(failing_encode).await;
    }

    #[tokio::test]
    async fn test_encoder_panic_sends_original_body() {
        run_failing(panicking_encode).await;
    }

    #[tokio::test]
    async fn test_accept_ranges_removed_only_when_compressing() {
        let response = make_response(text(1000), [("accept-ranges", "bytes")]);
        let (parts, _) = run(response, "gzip", Codec::Gzip).await;
        assert!(parts.headers.get(header::ACCEPT_RANGES).is_none());

        let response = make_response(text(100), [("accept-ranges", "bytes")]);
        let (parts, _) = run(response, "gzip", Codec::Gzip).await;
        assert_eq!(parts.headers[header::ACCEPT_RANGES], "bytes");
    }

    #[test]
    fn test_vary_not_duplicated() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::VARY, "Origin, Accept-Encoding".parse().unwrap());
        add_vary_accept_encoding(&mut headers);
        assert_eq!(headers.get_all(header::VARY).iter().count(), 1);
    }
}
