use bytes::{Bytes, BytesMut};
use compression_codecs::{
    EncodeV2,
    brotli::{BrotliEncoder, params::EncoderParams as BrotliParams},
    gzip::GzipEncoder,
};
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http::HeaderMap;
use http::header::ACCEPT_ENCODING;
use std::fmt;
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// Gzip level used for dynamic bodies.
const GZIP_LEVEL: i32 = 6;

/// Supported compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Brotli compression, tuned for text.
    Brotli,
    /// Gzip compression.
    Gzip,
}

impl Codec {
    /// Returns the Content-Encoding header value for this codec.
    pub fn content_encoding(&self) -> &'static str {
        match self {
            Codec::Brotli => "br",
            Codec::Gzip => "gzip",
        }
    }

    /// Parses a codec name as used in configuration and `Accept-Encoding`.
    pub fn from_name(name: &str) -> Option<Codec> {
        match name.trim().to_ascii_lowercase().as_str() {
            "br" | "brotli" => Some(Codec::Brotli),
            "gzip" | "x-gzip" => Some(Codec::Gzip),
            _ => None,
        }
    }

    /// Creates a new encoder for this codec.
    fn encoder(&self) -> Box<dyn EncodeV2 + Send> {
        match self {
            Codec::Brotli => Box::new(BrotliEncoder::new(BrotliParams::default().text_mode())),
            Codec::Gzip => Box::new(GzipEncoder::new(Level::Precise(GZIP_LEVEL).into())),
        }
    }

    /// Compresses a complete in-memory body.
    pub fn compress(&self, input: &[u8]) -> io::Result<Bytes> {
        let mut encoder = self.encoder();
        let mut scratch = vec![0u8; OUTPUT_BUFFER_SIZE];
        let mut compressed = BytesMut::with_capacity(input.len() / 2);
        let mut input_buf = PartialBuffer::new(input);

        while input_buf.written_len() < input.len() {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);

            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::other(format!(
                    "{self} encoder made no progress"
                )));
            }
        }

        loop {
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            let done = encoder.finish(&mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);
            if done {
                break;
            }
        }

        Ok(compressed.freeze())
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_encoding())
    }
}

/// The set of codecs a client declared in `Accept-Encoding`.
///
/// Only answers "is codec X acceptable"; there is no preference ordering
/// between codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptEncoding {
    brotli: bool,
    gzip: bool,
}

impl AcceptEncoding {
    /// A client that accepts no content coding besides identity.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Collects every `Accept-Encoding` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let joined = headers
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&joined)
    }

    /// Parses an Accept-Encoding header value.
    ///
    /// The header value is expected to be comma-separated encodings with optional
    /// quality values (e.g., "gzip, br;q=1.0, identity;q=0.5").
    pub fn parse(header: &str) -> Self {
        // explicit entries win over `*`
        let mut brotli = None;
        let mut gzip = None;
        let mut wildcard = false;

        for part in header.split(',') {
            let (encoding, quality) = parse_encoding_with_quality(part.trim());
            let acceptable = quality > 0.0;

            if encoding == "*" {
                wildcard = acceptable;
                continue;
            }

            match Codec::from_name(encoding) {
                Some(Codec::Brotli) => brotli = Some(acceptable),
                Some(Codec::Gzip) => gzip = Some(acceptable),
                None => {}
            }
        }

        Self {
            brotli: brotli.unwrap_or(wildcard),
            gzip: gzip.unwrap_or(wildcard),
        }
    }

    /// Returns whether the client accepts the given codec.
    pub fn accepts(&self, codec: Codec) -> bool {
        match codec {
            Codec::Brotli => self.brotli,
            Codec::Gzip => self.gzip,
        }
    }
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.splitn(2, ';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .next()
        .and_then(|q| {
            let q = q.trim();
            if q.starts_with("q=") || q.starts_with("Q=") {
                q[2..].trim().parse::<f32>().ok()
            } else {
                None
            }
        })
        .unwrap_or(1.0);

    (encoding, quality)
}
