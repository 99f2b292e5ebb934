//! Audit Recorder
//!
//! Append-only JSONL writer for audit events. Thread-safe, persistent,
//! size-rotated. Owned by the engine instance, not a process global.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Timelike, Utc};
use parking_lot::Mutex;

use crate::error::AuthResult;

use super::event::AuditEvent;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum file size before rotation (20 MB)
const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Log file extension
const LOG_EXT: &str = ".jsonl";

// ============================================================================
// RECORDER
// ============================================================================

struct Inner {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
}

/// Append-only JSONL recorder
pub struct AuditRecorder {
    inner: Mutex<Inner>,
    base_dir: PathBuf,
    events_recorded: AtomicU64,
}

impl AuditRecorder {
    /// Create a recorder in the given directory.
    pub fn new(base_dir: &Path) -> AuthResult<Self> {
        std::fs::create_dir_all(base_dir)?;
        let (file_path, file) = Self::open_new_file(base_dir)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                current_file: file_path,
                current_size: 0,
            }),
            base_dir: base_dir.to_path_buf(),
            events_recorded: AtomicU64::new(0),
        })
    }

    /// Open a new log file with timestamp
    fn open_new_file(base_dir: &Path) -> AuthResult<(PathBuf, File)> {
        let now = Utc::now();
        let filename = format!(
            "audit_{}_{:02}_{:02}_{:02}{:02}{:02}{}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            LOG_EXT
        );
        let file_path = base_dir.join(&filename);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        log::info!("opened audit log: {:?}", file_path);
        Ok((file_path, file))
    }

    /// Record an audit event. Failures are logged, never propagated: the
    /// audit trail must not take the auth pipeline down with it.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.try_record(&event) {
            log::error!("failed to record audit event: {}", e);
        }
    }

    fn try_record(&self, event: &AuditEvent) -> AuthResult<()> {
        let line = event.to_jsonl();
        let bytes = line.as_bytes();

        let mut inner = self.inner.lock();

        if inner.current_size + bytes.len() as u64 > MAX_FILE_SIZE {
            inner.writer.flush()?;
            let (new_path, new_file) = Self::open_new_file(&self.base_dir)?;
            log::info!("rotated audit log to {:?}", new_path);
            inner.writer = BufWriter::new(new_file);
            inner.current_file = new_path;
            inner.current_size = 0;
        }

        inner.writer.write_all(bytes)?;
        inner.writer.write_all(b"\n")?;
        inner.current_size += bytes.len() as u64 + 1;
        inner.writer.flush()?;

        self.events_recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded.load(Ordering::SeqCst)
    }

    pub fn current_file(&self) -> PathBuf {
        self.inner.lock().current_file.clone()
    }

    /// Flush buffered events to disk.
    pub fn flush(&self) {
        let _ = self.inner.lock().writer.flush();
    }
}

impl Drop for AuditRecorder {
    fn drop(&mut self) {
        self.flush();
    }
}

// ============================================================================
// QUERY API (for reading logs)
// ============================================================================

/// Read all events from a log file
pub fn read_events(file_path: &Path) -> AuthResult<Vec<AuditEvent>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if !line.is_empty() {
            if let Ok(event) = serde_json::from_str::<AuditEvent>(&line) {
                events.push(event);
            }
        }
    }

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
