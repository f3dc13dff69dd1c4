//! Append-only journal of every device exchange.
//!
//! Each entry is `[YYYY-MM-DD HH:MM:SS] <text>\n` in local time. The file is
//! opened in append mode and never truncated, so it doubles as a replay
//! source when the ERP has to be reconciled by hand.
//!
//! Thread-safe: a `Mutex<File>` serialises appends, and every entry goes out
//! as a single `write_all` followed by `flush`, so lines from concurrent
//! connections never interleave.

use chrono::{Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    /// Open (or create) the journal file, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), "Journal opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one timestamped entry. `text` may span several lines; only the
    /// first carries the timestamp.
    pub fn append(&self, text: &str) -> io::Result<()> {
        let entry = format_entry(Local::now().naive_local(), text);
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("journal lock poisoned"))?;
        file.write_all(entry.as_bytes())?;
        file.flush()
    }

    /// Flush buffered data to disk.
    pub fn flush(&self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("journal lock poisoned"))?;
        file.sync_data()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn format_entry(at: NaiveDateTime, text: &str) -> String {
    format!("[{}] {}\n", at.format(TIMESTAMP_FORMAT), text)
}
