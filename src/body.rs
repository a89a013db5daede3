use bytes::{Buf, Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A response body produced by the compression layer.
    ///
    /// Either the fully buffered (and possibly compressed) bytes, or the
    /// handler's body passed through unchanged.
    #[project = CompressionBodyProj]
    #[derive(Debug)]
    #[allow(missing_docs)]
    pub enum CompressionBody<B> {
        /// Buffered body, sent as a single frame.
        Buffered {
            data: Option<Bytes>,
        },
        /// Passthrough body without buffering.
        Passthrough {
            #[pin]
            inner: B,
        },
    }
}

impl<B> CompressionBody<B> {
    /// Creates a body that yields `data` as one frame.
    pub fn buffered(data: Bytes) -> Self {
        Self::Buffered {
            data: (!data.is_empty()).then_some(data),
        }
    }

    /// Creates a passthrough body without compression.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CompressionBodyProj::Buffered { data } => {
                Poll::Ready(data.take().map(|data| Ok(Frame::data(data))))
            }
            CompressionBodyProj::Passthrough { inner } => {
                // Pass through frames, converting data to Bytes
                match inner.poll_frame(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Ready(Some(Ok(frame))) => {
                        let frame = frame.map_data(|mut data| {
                            let len = data.remaining();
                            data.copy_to_bytes(len)
                        });
                        Poll::Ready(Some(Ok(frame)))
                    }
                    Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Buffered { data } => data.is_none(),
            CompressionBody::Passthrough { inner } => inner.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            CompressionBody::Buffered { data } => {
                SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            CompressionBody::Passthrough { inner } => inner.size_hint(),
        }
    }
}

/// Appends every byte of `data` to `buf`.
pub(crate) fn extend_from_buf<D: Buf>(buf: &mut BytesMut, mut data: D) {
    while data.has_remaining() {
        let chunk = data.chunk();
        let len = chunk.len();
        buf.extend_from_slice(chunk);
        data.advance(len);
    }
}
