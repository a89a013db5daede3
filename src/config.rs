//! Configuration resolution.
//!
//! All values come from an explicit lookup function so that resolution is a
//! pure function of its input; [`Config::from_env`] plugs in the process
//! environment.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::layer::{CompressionLayer, DEFAULT_MIN_SIZE};
use crate::media_type::PolicyKind;
use crate::serve_static::ServeStatic;
use crate::source::FsSource;
use std::path::PathBuf;

/// Port used when `PORT` is absent or not numeric.
pub const DEFAULT_PORT: u16 = 8080;

/// Static root used when `STATIC_ROOT` is absent.
pub const DEFAULT_STATIC_ROOT: &str = "public";

const PORT: &str = "PORT";
const STATIC_ROOT: &str = "STATIC_ROOT";
const COMPRESSION_CODEC: &str = "COMPRESSION_CODEC";
const COMPRESSION_POLICY: &str = "COMPRESSION_POLICY";

/// Settings for one deployment of the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port the surrounding server listens on.
    pub port: u16,
    /// Directory static request paths resolve against.
    pub static_root: PathBuf,
    /// Codec used for dynamic bodies.
    pub codec: Codec,
    /// Dynamic bodies at or below this length are sent uncompressed.
    pub min_size: usize,
    /// Which media types may be served precompressed.
    pub policy: PolicyKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_root: PathBuf::from(DEFAULT_STATIC_ROOT),
            codec: Codec::Brotli,
            min_size: DEFAULT_MIN_SIZE,
            policy: PolicyKind::Narrow,
        }
    }
}

impl Config {
    /// Reads `PORT`, `STATIC_ROOT`, `COMPRESSION_CODEC` and
    /// `COMPRESSION_POLICY` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            port: resolve_port(lookup(PORT).as_deref()),
            ..Self::default()
        };

        if let Some(root) = lookup(STATIC_ROOT).filter(|v| !v.is_empty()) {
            config.static_root = PathBuf::from(root);
        }

        if let Some(name) = lookup(COMPRESSION_CODEC) {
            config.codec = Codec::from_name(&name).ok_or(Error::InvalidConfig {
                key: COMPRESSION_CODEC,
                value: name,
            })?;
        }

        if let Some(name) = lookup(COMPRESSION_POLICY) {
            config.policy = PolicyKind::from_name(&name).ok_or(Error::InvalidConfig {
                key: COMPRESSION_POLICY,
                value: name,
            })?;
        }

        Ok(config)
    }

    /// The dynamic compression layer this configuration describes.
    pub fn compression_layer(&self) -> CompressionLayer {
        CompressionLayer::new()
            .codec(self.codec)
            .min_size(self.min_size)
    }

    /// The static file service this configuration describes.
    pub fn serve_static(&self) -> ServeStatic<PolicyKind, FsSource> {
        ServeStatic::with_parts(self.static_root.clone(), self.policy, FsSource)
    }
}

/// Resolves the listening port from a raw `PORT` value.
///
/// Leading decimal digits are used (`"3000abc"` is 3000); absent, empty,
/// non-numeric or out-of-range values give [`DEFAULT_PORT`].
pub fn resolve_port(value: Option<&str>) -> u16 {
    value
        .map(str::trim)
        .map(|v| {
            let end = v
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '+' || c == '-'))))
                .map_or(v.len(), |(i, _)| i);
            &v[..end]
        })
        .and_then(|digits| digits.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}
