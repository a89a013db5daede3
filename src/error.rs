use crate::codec::Codec;
use http::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the delivery pipeline can encounter.
///
/// None of these escape as a server error: each is resolved into a response
/// at the point where it occurs.
#[derive(Debug, Error)]
pub enum Error {
    /// The request path contains a literal `..`.
    #[error("request path {0:?} contains a parent-directory reference")]
    PathTraversal(String),

    /// Neither a precompressed nor a raw asset exists for the path.
    #[error("static asset {} not found", .0.display())]
    NotFound(PathBuf),

    /// Reading an asset failed for a reason other than absence.
    #[error("failed to read static asset {}", .path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Compressing a dynamic body failed; the body is sent uncompressed.
    #[error("{codec} compression failed")]
    Compression {
        /// Codec that was attempted.
        codec: Codec,
        /// Underlying encoder error.
        #[source]
        source: io::Error,
    },

    /// A configuration value could not be interpreted.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig {
        /// Configuration key, e.g. an environment variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
}

impl Error {
    /// Status a client sees for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::PathTraversal(_) | Error::NotFound(_) | Error::Read { .. } => {
                StatusCode::NOT_FOUND
            }
            // the uncompressed body is sent instead
            Error::Compression { .. } => StatusCode::OK,
            Error::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
