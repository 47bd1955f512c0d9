//! On-disk copy of an ES module script.
//!
//! The path is fixed (`<tmpdir>/temp-script.mjs` by default), so two
//! concurrent runs overwrite each other's file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TempScript {
    path: PathBuf,
}

impl TempScript {
    /// Writes `body` verbatim to `path`, replacing any previous file.
    pub async fn write(path: PathBuf, body: &str) -> Result<Self> {
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| anyhow!("Cannot write {}: {e}", path.display()))?;
        debug!("Wrote {} bytes to {}", body.len(), path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort removal. Failures are logged, not returned.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Could not remove {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp-script.mjs");

        let temp = TempScript::write(path.clone(), "console.log('hi');")
            .await
            .unwrap();
        assert_eq!(temp.path(), path.as_path());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "console.log('hi');"
        );

        temp.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp-script.mjs");
        std::fs::write(&path, "old contents that are longer").unwrap();

        let temp = TempScript::write(path.clone(), "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(temp.path()).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("temp-script.mjs");
        let err = TempScript::write(path, "x").await.unwrap_err();
        assert!(err.to_string().contains("Cannot write"));
    }

    #[tokio::test]
    async fn test_remove_already_gone_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp-script.mjs");
        let temp = TempScript::write(path.clone(), "x").await.unwrap();
        std::fs::remove_file(&path).unwrap();
        temp.remove().await;
    }
}
