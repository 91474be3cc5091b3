use super::record::UsageRecord;
use async_trait::async_trait;
use std::io::{Error as IoError, Result as IoResult};
use std::path::{Path, PathBuf};
use tokio::fs::{OpenOptions, create_dir_all};
use tokio::io::AsyncWriteExt as _;

/// Durable destination for usage records.
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Persist a batch in order.
    ///
    /// # Errors
    /// Returns an error if the batch could not be written; the ledger keeps
    /// the records buffered and retries on the next flush.
    async fn write_batch(&mut self, records: &[UsageRecord]) -> IoResult<()>;
}

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageSink for JsonlFileSink {
    async fn write_batch(&mut self, records: &[UsageRecord]) -> IoResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).await?;
        }

        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record).map_err(IoError::other)?);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await
    }
}
