use crate::codec::Codec;
use crate::service::CompressionService;
use tower::Layer;

/// Default minimum body size for compression.
///
/// Bodies of exactly this many bytes or fewer are sent uncompressed.
pub const DEFAULT_MIN_SIZE: usize = 256;

/// A Tower layer that compresses dynamic response bodies.
///
/// A single codec is configured per layer; it is used whenever the client
/// lists it in `Accept-Encoding`.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    codec: Codec,
    min_size: usize,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// Brotli in text mode, with a minimum size of 256 bytes.
    pub fn new() -> Self {
        Self {
            codec: Codec::Brotli,
            min_size: DEFAULT_MIN_SIZE,
        }
    }

    /// Sets the codec bodies are compressed with.
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Only bodies strictly longer than this value are compressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.codec, self.min_size)
    }
}
