//! Archive fetching
//!
//! Archives are referenced by URI in application specs. Only local files are
//! supported: plain paths (relative to a base directory) and `file://` URIs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Retrieves archive bytes for a URI
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Reads archives from the local filesystem
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    base_dir: PathBuf,
}

impl LocalFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Map a URI onto a filesystem path
    pub fn resolve(&self, uri: &str) -> Result<PathBuf> {
        let raw = match uri.strip_prefix("file://") {
            Some(path) => path,
            None if uri.contains("://") => {
                return Err(EngineError::Fetch {
                    uri: uri.to_string(),
                    message: "only local paths and file:// URIs are supported".to_string(),
                });
            }
            None => uri,
        };

        let path = Path::new(raw);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        })
    }
}

#[async_trait]
impl ArtifactFetcher for LocalFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.resolve(uri)?;
        tracing::debug!(uri, path = %path.display(), "reading archive");

        tokio::fs::read(&path).await.map_err(|e| EngineError::Fetch {
            uri: uri.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve() {
        let fetcher = LocalFetcher::new("/specs");

        assert_eq!(
            fetcher.resolve("charts/gloo.tgz").unwrap(),
            PathBuf::from("/specs/charts/gloo.tgz")
        );
        assert_eq!(
            fetcher.resolve("file:///opt/gloo.tgz").unwrap(),
            PathBuf::from("/opt/gloo.tgz")
        );
        assert!(matches!(
            fetcher.resolve("https://example.com/gloo.tgz"),
            Err(EngineError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.tgz"), b"bytes").unwrap();

        let fetcher = LocalFetcher::new(temp.path());

        assert_eq!(fetcher.fetch("a.tgz").await.unwrap(), b"bytes");
        assert!(matches!(
            fetcher.fetch("missing.tgz").await,
            Err(EngineError::Fetch { .. })
        ));
    }
}
