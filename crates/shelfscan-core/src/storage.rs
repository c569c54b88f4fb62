//! File storage for uploaded artifacts and generated exports.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Creates (or truncates) an empty file named `name` inside `dir`.
    async fn create_file(&self, dir: &Path, name: &str) -> io::Result<PathBuf>;
    /// Streams `reader` into a file named `name` inside `dir`.
    async fn save(
        &self,
        dir: &Path,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<PathBuf>;
}

/// Stores files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStorage;

impl LocalFileStorage {
    async fn target(dir: &Path, name: &str) -> io::Result<PathBuf> {
        // Only the last component of client-supplied names is honoured.
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{name}' is not a usable file name"),
            )
        })?;
        fs::create_dir_all(dir).await?;
        Ok(dir.join(file_name))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn create_file(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = Self::target(dir, name).await?;
        File::create(&path).await?;
        Ok(path)
    }

    async fn save(
        &self,
        dir: &Path,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> io::Result<PathBuf> {
        let path = Self::target(dir, name).await?;
        let mut file = File::create(&path).await?;
        tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        Ok(path)
    }
}
