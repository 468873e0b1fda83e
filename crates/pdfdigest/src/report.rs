use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::prelude::*;

/// Append-only handle on the Markdown report of one run.
///
/// The file is truncated once, on creation. Every block is written by
/// opening the file, appending, and closing it again.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Create (or empty) the report file, creating its directory if needed.
    pub async fn create(path: PathBuf) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(&path).await?;
        log::info!("Initialized report file {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, block: &str) -> Result<(), Error> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
