use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{Res, error::PanError, types::TokenRecord};

/// Token file on disk. Performs no network I/O.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory that holds the token file.
    pub async fn ensure_dir(&self) -> Res<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| PanError::io("cannot create", parent, e))?;
        }
        Ok(())
    }

    /// Reads the stored record; `None` when no file exists.
    ///
    /// Content that does not parse is reported as [`PanError::CorruptToken`].
    pub async fn load(&self) -> Res<Option<TokenRecord>> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PanError::io("cannot read", &self.path, e)),
        };
        let record = serde_json::from_str(&content).map_err(|source| PanError::CorruptToken {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(record))
    }

    /// Writes the record atomically with owner-only permissions.
    ///
    /// The JSON goes to a sibling temp file which is renamed over the token
    /// file, so readers never observe a truncated record.
    pub async fn persist(&self, record: &TokenRecord) -> Res<()> {
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.tmp_path();
        if let Err(e) = self.write_private(&tmp, json.as_bytes()).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(PanError::io("cannot write", &tmp, e));
        }

        if let Err(e) = async_fs::rename(&tmp, &self.path).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(PanError::io("cannot replace", &self.path, e));
        }

        debug!(path = %self.path.display(), "token persisted");
        Ok(())
    }

    /// Removes the token file; a missing file is not an error.
    pub async fn clear(&self) -> Res<()> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PanError::io("cannot remove", &self.path, e)),
        }
    }

    /// Creates `path` afresh, readable by the owner only from the start.
    async fn write_private(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        match async_fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
