//! HTTP delivery middleware for Tower: precompressed static assets and
//! best-effort compression of dynamic bodies.
//!
//! Two independent paths share one encoding-negotiation policy:
//!
//! - [`ServeStatic`] answers static requests. It rejects paths containing
//!   `..`, serves `P.br` when the client accepts brotli and `P` has a
//!   compressible media type, and otherwise serves `P` byte-for-byte.
//! - [`CompressionLayer`] wraps handlers that produce in-memory bodies and
//!   compresses them with one configured codec.
//!
//! # Example
//!
//! ```ignore
//! use precompressed_delivery::{CompressionLayer, Config};
//! use tower::ServiceBuilder;
//!
//! let config = Config::from_env()?;
//! let assets = config.serve_static();
//! let pages = ServiceBuilder::new()
//!     .layer(config.compression_layer())
//!     .service(my_handlers);
//! ```
//!
//! # Static Rules
//!
//! - A path containing a literal `..` is answered 404 before any file access
//! - The precompressed sibling is only probed when the client accepts `br`
//!   and the media type passes the [`Compressible`] policy
//! - A missing or unreadable sibling silently falls through to the raw file
//! - Directories are never served: no index file, no trailing-slash redirect
//!
//! # Dynamic Compression Rules
//!
//! The layer will **not** compress responses when:
//! - The client does not accept the configured codec
//! - The body is empty
//! - `Content-Encoding` or `Content-Range` is already set
//! - The body is 256 bytes or shorter (see [`CompressionLayer::min_size`])
//!
//! A failed compression is logged and the original body is sent instead.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to the codec used
//! - `Content-Length` header is set to the compressed length
//! - `Accept-Ranges` header is removed
//! - `Vary` header includes `Accept-Encoding`

#![deny(missing_docs)]

mod body;
mod codec;
pub mod config;
pub mod demo;
mod error;
mod fallback;
mod future;
mod layer;
pub mod media_type;
mod path;
pub mod precompressed;
mod serve_static;
mod service;
mod source;

pub use body::CompressionBody;
pub use codec::{AcceptEncoding, Codec};
pub use config::Config;
pub use error::{Error, Result};
pub use future::ResponseFuture;
pub use layer::{CompressionLayer, DEFAULT_MIN_SIZE};
pub use media_type::{BroadPolicy, Compressible, MediaType, NarrowPolicy, PolicyKind};
pub use path::SafePath;
pub use serve_static::{ServeStatic, StaticFuture};
pub use service::CompressionService;
pub use source::{AssetSource, FsSource};
