//! Media type resolution and compressibility policies.

use http::HeaderValue;
use mime_guess::Mime;
use std::path::Path;

/// Content type sent for paths whose extension has no known mapping.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media type of a request path, derived from its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// The extension maps to a known type.
    Known(Mime),
    /// No extension, or one with no known mapping.
    Unknown,
}

impl MediaType {
    /// Resolves the media type of a path. Never fails and performs no I/O.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match mime_guess::from_path(path).first() {
            Some(mime) => MediaType::Known(mime),
            None => MediaType::Unknown,
        }
    }

    /// The bare type without parameters, e.g. `text/css`.
    pub fn essence(&self) -> &str {
        match self {
            MediaType::Known(mime) => mime.essence_str(),
            MediaType::Unknown => OCTET_STREAM,
        }
    }

    /// Value for the `Content-Type` header.
    pub fn header_value(&self) -> HeaderValue {
        match self {
            MediaType::Known(mime) => HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM)),
            MediaType::Unknown => HeaderValue::from_static(OCTET_STREAM),
        }
    }

    /// Whether `policy` considers this type worth compressing.
    ///
    /// Unknown types are never compressible.
    pub fn is_compressible<P: Compressible + ?Sized>(&self, policy: &P) -> bool {
        match self {
            MediaType::Known(mime) => policy.is_compressible(mime.essence_str()),
            MediaType::Unknown => false,
        }
    }
}

/// Decides whether a media type benefits from compression.
///
/// Implementations receive the type essence (no parameters), lowercased.
pub trait Compressible {
    /// Returns whether responses of `media_type` should be compressed.
    fn is_compressible(&self, media_type: &str) -> bool;
}

/// `text/*` plus an explicit allow-list of structured formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrowPolicy;

const NARROW_ALLOW_LIST: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/xml",
    "image/svg+xml",
];

impl Compressible for NarrowPolicy {
    fn is_compressible(&self, media_type: &str) -> bool {
        media_type.starts_with("text/") || NARROW_ALLOW_LIST.contains(&media_type)
    }
}

/// `text/*`, every `application/*`, and `image/svg+xml`.
///
/// Also matches binary application types such as PDFs and archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadPolicy;

impl Compressible for BroadPolicy {
    fn is_compressible(&self, media_type: &str) -> bool {
        media_type.starts_with("text/")
            || media_type.starts_with("application/")
            || media_type == "image/svg+xml"
    }
}

impl<F> Compressible for F
where
    F: Fn(&str) -> bool,
{
    fn is_compressible(&self, media_type: &str) -> bool {
        self(media_type)
    }
}

/// Runtime selection between the two built-in policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyKind {
    /// See [`NarrowPolicy`].
    #[default]
    Narrow,
    /// See [`BroadPolicy`].
    Broad,
}

impl PolicyKind {
    /// Parses `narrow` or `broad`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "narrow" => Some(PolicyKind::Narrow),
            "broad" => Some(PolicyKind::Broad),
            _ => None,
        }
    }
}

impl Compressible for PolicyKind {
    fn is_compressible(&self, media_type: &str) -> bool {
        match self {
            PolicyKind::Narrow => NarrowPolicy.is_compressible(media_type),
            PolicyKind::Broad => BroadPolicy.is_compressible(media_type),
        }
    }
}
