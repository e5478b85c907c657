//! Append-only log file backend.
//!
//! One JSON record per line. Every append is followed by `sync_data`, so a
//! record is on disk before `append` returns. A torn final line (crash in
//! the middle of a write) or any other unreadable line is skipped on load.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{fold_records, Backend, DurableRecord, LogRecord, PersistenceError};

#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    /// Append handle; the lock also orders appends against compaction
    writer: Mutex<File>,
}

impl FileBackend {
    /// Opens (creating if needed) the log at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let writer = open_append(&path).await?;
        info!("Durable log opened at {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    async fn read_records(&self) -> Result<Vec<LogRecord>, PersistenceError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };

        // Lines are decoded one by one, so a torn multi-byte character only
        // costs the line it sits on.
        let mut records = Vec::new();
        for (number, line) in contents.split(|&byte| byte == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<LogRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable record at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        writer
            .sync_data()
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!("Appended {} to durable log", record);
        Ok(())
    }

    async fn compact(&self, now_ms: u64) -> Result<Vec<DurableRecord>, PersistenceError> {
        let mut writer = self.writer.lock().await;

        let records = self.read_records().await?;
        let before = records.len();
        let survivors = fold_records(records, now_ms);

        let mut contents = Vec::new();
        for record in &survivors {
            serde_json::to_writer(&mut contents, &LogRecord::Put(record.clone()))?;
            contents.push(b'\n');
        }

        // The staging handle becomes the append handle; nothing fallible
        // runs after the rename.
        let staging = self.path.with_extension("compact");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staging)
            .await
            .map_err(|e| io_error(&staging, e))?;
        file.write_all(&contents)
            .await
            .map_err(|e| io_error(&staging, e))?;
        file.sync_all().await.map_err(|e| io_error(&staging, e))?;

        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        *writer = file;

        info!(
            "Compacted durable log {}: {} records -> {}",
            self.path.display(),
            before,
            survivors.len()
        );
        Ok(survivors)
    }
}

async fn open_append(path: &Path) -> Result<File, PersistenceError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}
