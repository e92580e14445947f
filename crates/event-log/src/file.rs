//! Append-only file log, one file per topic.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::{LogClient, PublishError, Result};

/// Durable log that appends records to `<dir>/<topic>.log`.
///
/// Each record is one line: the key, a tab, the payload, and a newline.
/// Keys and payloads must not contain those separators; the JSON payloads
/// produced by the publisher never do.
///
/// Every record is synced to disk before `publish` returns. A write that
/// fails part-way is truncated back to the last complete record; a torn
/// line left by a crash is dropped when the log is reopened.
pub struct FileEventLog {
    topic: String,
    path: PathBuf,
    tail: Mutex<Tail>,
}

/// Open file plus the length of its last complete record.
#[derive(Debug)]
struct Tail {
    file: File,
    len: u64,
    poisoned: bool,
}

impl Tail {
    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        if let Err(error) = self.write_synced(line).await {
            self.rollback().await;
            return Err(error);
        }
        self.len += line.len() as u64;
        Ok(())
    }

    async fn write_synced(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }

    /// Drops any bytes written after the last complete record.
    async fn rollback(&mut self) {
        if let Err(error) = self.file.set_len(self.len).await {
            tracing::error!(%error, len = self.len, "failed to truncate partial record");
            self.poisoned = true;
        }
    }
}

/// Length of the file up to and including its last newline.
async fn complete_len(file: &mut File) -> std::io::Result<u64> {
    let mut end = file.metadata().await?.len();
    let mut buf = vec![0u8; 4096];
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

impl FileEventLog {
    /// Opens (creating if needed) the log file for `topic` inside `dir`.
    pub async fn open(dir: impl AsRef<Path>, topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        tokio::fs::create_dir_all(dir.as_ref()).await?;
        let path = dir.as_ref().join(format!("{topic}.log"));
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let size = file.metadata().await?.len();
        let len = complete_len(&mut file).await?;
        if len < size {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = size - len,
                "truncating torn record at end of event log"
            );
            file.set_len(len).await?;
        }

        tracing::info!(path = %path.display(), %topic, "opened file event log");

        Ok(Self {
            topic,
            path,
            tail: Mutex::new(Tail {
                file,
                len,
                poisoned: false,
            }),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogClient for FileEventLog {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        if key.contains(['\t', '\n']) || payload.contains(&b'\n') {
            return Err(PublishError::Unavailable(
                "record contains a field separator".to_string(),
            ));
        }

        let mut line = Vec::with_capacity(key.len() + payload.len() + 2);
        line.extend_from_slice(key.as_bytes());
        line.push(b'\t');
        line.extend_from_slice(&payload);
        line.push(b'\n');

        let mut tail = self.tail.lock().await;
        if tail.poisoned {
            return Err(PublishError::Unavailable(format!(
                "{} has an unrepaired partial record",
                self.path.display()
            )));
        }
        tail.append(&line).await?;
        Ok(())
    }
}
