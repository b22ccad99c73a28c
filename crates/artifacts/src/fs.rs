//! Filesystem artifact backend.
//!
//! Artifacts live under `{root}/{namespace}/`; references are the
//! relative keys below that directory. Keys are validated before any
//! path is built so a reference can never escape the namespace.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::{ArtifactError, ArtifactReader, ArtifactRef, ArtifactStore};

pub struct FsArtifactStore {
    base: PathBuf,
}

impl FsArtifactStore {
    /// Open (creating if needed) the namespace directory under `root`.
    pub async fn open(root: &Path, namespace: &str) -> Result<Self, ArtifactError> {
        let base = root.join(namespace);
        tokio::fs::create_dir_all(&base).await?;
        Ok(Self { base })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment.is_empty() || segment == "..")
        {
            return Err(ArtifactError::InvalidRef(key.to_string()));
        }
        Ok(self.base.join(key))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<ArtifactRef, ArtifactError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::debug!(key, size = bytes.len(), "Artifact stored");
        Ok(key.to_string())
    }

    async fn get(&self, artifact_ref: &str) -> Result<(u64, ArtifactReader), ArtifactError> {
        let path = self.resolve(artifact_ref)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(artifact_ref.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();
        Ok((size, Box::new(file)))
    }

    async fn delete(&self, artifact_ref: &str) -> Result<(), ArtifactError> {
        let path = self.resolve(artifact_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
