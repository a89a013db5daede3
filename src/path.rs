//! Request path safety and mapping onto the static root.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A request path that passed the traversal check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath {
    relative: String,
}

impl SafePath {
    /// Rejects any path containing a literal `..`.
    ///
    /// This is a textual check, not canonicalization, and runs before any
    /// filesystem access. Encoded forms such as `%2e%2e` are not decoded.
    pub fn new(request_path: &str) -> Result<Self> {
        if request_path.contains("..") {
            return Err(Error::PathTraversal(request_path.to_owned()));
        }

        Ok(Self {
            relative: request_path.trim_start_matches('/').to_owned(),
        })
    }

    /// Path relative to the static root, without leading slashes.
    pub fn as_str(&self) -> &str {
        &self.relative
    }

    /// The asset file under `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }

    /// The asset file under `root` with `suffix` appended, e.g. `app.css.br`.
    pub fn under_with_suffix(&self, root: &Path, suffix: &str) -> PathBuf {
        let mut path = self.under(root).into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_parent_references() {
        for path in ["/../etc/passwd", "/css/../../secret", "..", "/a/..", "/a..b"] {
            assert!(
                matches!(SafePath::new(path), Err(Error::PathTraversal(p)) if p == path),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_encoded_dots_are_not_special() {
        assert!(SafePath::new("/%2e%2e/etc/passwd").is_ok());
    }

    #[test]
    fn test_strips_leading_slashes() {
        let path = SafePath::new("//css/site.css").unwrap();
        assert_eq!(path.as_str(), "css/site.css");
        assert_eq!(
            path.under(Path::new("/srv/public")),
            PathBuf::from("/srv/public/css/site.css")
        );
    }

    #[test]
    fn test_appends_suffix() {
        let path = SafePath::new("/app.js").unwrap();
        assert_eq!(
            path.under_with_suffix(Path::new("public"), ".br"),
            PathBuf::from("public/app.js.br")
        );
    }

    #[test]
    fn test_root_path_maps_to_root() {
        let path = SafePath::new("/").unwrap();
        assert_eq!(path.as_str(), "");
        assert_eq!(path.under(Path::new("public")), PathBuf::from("public/"));
    }
}
