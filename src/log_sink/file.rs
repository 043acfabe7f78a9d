//! Append-only log files rotated by hour
//!
//! Entries are written to `<root>/<category>/<YYYYMMDD>/<HH>.log` (UTC), one
//! JSON object per line. Writes happen on a background task so that
//! [`LogSink::append`] returns immediately.

use super::{LogEntry, LogSink};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Writes crawl log entries under a root directory
///
/// Must be created inside a tokio runtime. Call [`close`](Self::close)
/// before exiting to make sure every queued entry reached disk.
pub struct FileLogSink {
    root: PathBuf,
    sender: Mutex<Option<UnboundedSender<LogEntry>>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl FileLogSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let (sender, receiver) = unbounded_channel();
        let writer = tokio::spawn(write_entries(root.clone(), receiver));

        Self {
            root,
            sender: Mutex::new(Some(sender)),
            writer: tokio::sync::Mutex::new(Some(writer)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File an entry recorded at `at` is appended to
    pub fn path_for(root: &Path, category: &str, at: DateTime<Utc>) -> PathBuf {
        root.join(category)
            .join(at.format("%Y%m%d").to_string())
            .join(format!("{}.log", at.format("%H")))
    }

    /// Stops accepting entries and waits for queued ones to be written
    pub async fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.await {
                warn!("Crawl log writer stopped abnormally: {}", e);
            }
        }
    }
}

impl LogSink for FileLogSink {
    fn append(&self, category: &str, payload: serde_json::Value) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match sender.as_ref() {
            Some(sender) => {
                if sender.send(LogEntry::new(category, payload)).is_err() {
                    warn!("Crawl log writer is gone; dropping {} entry", category);
                }
            }
            None => warn!("Crawl log is closed; dropping {} entry", category),
        }
    }
}

async fn write_entries(root: PathBuf, mut receiver: UnboundedReceiver<LogEntry>) {
    while let Some(entry) = receiver.recv().await {
        let path = FileLogSink::path_for(&root, &entry.category, entry.recorded_at);
        if let Err(e) = append_line(&path, &entry).await {
            warn!("Failed to write crawl log entry to {}: {}", path.display(), e);
        }
    }
    debug!("Crawl log writer finished");
}

async fn append_line(path: &Path, entry: &LogEntry) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }

    let mut line = serde_json::to_string(&entry.payload)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
