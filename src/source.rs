//! Where static asset bytes come from.

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::path::Path;

/// Reads static assets.
///
/// A path that exists but is not a regular file must be reported as
/// [`io::ErrorKind::NotFound`]; directories are never served.
pub trait AssetSource: Send + Sync + 'static {
    /// Reads the whole file at `path`.
    fn read(&self, path: &Path) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// Reads assets from the local filesystem through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl AssetSource for FsSource {
    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "not a regular file",
            ));
        }

        tokio::fs::read(path).await.map(Bytes::from)
    }
}
