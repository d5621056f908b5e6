//! # Log Storage Module
//!
//! Owns the `readings` directory and the rotating CSV log files inside it.
//!
//! On-disk format (bit-exact, shared with the dashboard's download view):
//! - plain text, UTF-8, `\n` line terminator
//! - first line exactly `time,co2`
//! - every subsequent line `YYYY-MM-DD HH:MM:SS,<integer ppm>`
//!
//! Files are append-only except for the explicit "remove last line"
//! operation, which always preserves the header. "Ensuring" a file never
//! truncates existing contents. File absence is an expected outcome, not
//! an exception: lookups go through [`Probe`] and callers match on it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MonitorError, Result};

/// Fixed first line of every log file.
pub const LOG_HEADER: &str = "time,co2";

/// Outcome of probing a path, separating "absent" from real I/O faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Found,
    NotFound,
}

/// Handle to the readings directory.
///
/// Cheap to clone; the monitoring loop and the dashboard responder each
/// hold one. The single-threaded task model means at most one task touches
/// the directory at a time.
#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    /// Open the store, creating the readings directory if absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created — fatal at
    /// startup, since the monitor cannot run without its storage.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Probe whether a log file exists.
    async fn probe(&self, path: &Path) -> Result<Probe> {
        match fs::metadata(path).await {
            Ok(_) => Ok(Probe::Found),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Probe::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a client-supplied file name inside the readings directory.
    ///
    /// Names with path separators or traversal components are reported as
    /// not found rather than resolved outside the store.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == ".." || name.contains(['/', '\\']) {
            return Err(MonitorError::LogNotFound(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Ensure a log file exists with its header line.
    ///
    /// Creates the parent directory if absent (already existing is
    /// success) and creates the file with only the header if absent.
    /// Never truncates an existing file. Calling this twice in a row is a
    /// no-op the second time.
    pub async fn ensure_log_file(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name)?;
        fs::create_dir_all(&self.root).await?;

        match self.probe(&path).await? {
            Probe::Found => Ok(path),
            Probe::NotFound => {
                fs::write(&path, format!("{}\n", LOG_HEADER)).await?;
                debug!("Created log file {}", path.display());
                Ok(path)
            }
        }
    }

    /// Append one reading line to a log file.
    ///
    /// The file must already exist (callers go through
    /// [`ensure_log_file`](Self::ensure_log_file) first).
    pub async fn append_reading(&self, name: &str, timestamp: &str, co2_ppm: u16) -> Result<()> {
        let path = self.resolve(name)?;
        let mut file = fs::OpenOptions::new().append(true).open(&path).await?;
        file.write_all(format!("{},{}\n", timestamp, co2_ppm).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    /// List `.csv` log files as `(filename, size_bytes)`, newest first.
    ///
    /// Entries that cannot be read are skipped rather than failing the
    /// whole listing.
    pub async fn list_log_files(&self) -> Result<Vec<(String, u64)>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(".csv") {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_file() {
                files.push((name, meta.len()));
            }
        }

        // Newest first. Weekly names carry no zero-padding, so compare
        // the numeric component rather than the raw string (week9 must
        // sort below week33).
        files.sort_by(|a, b| {
            listing_key(&b.0)
                .cmp(&listing_key(&a.0))
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(files)
    }

    /// Read a log file back as `(timestamp, co2_ppm)` pairs in append
    /// order. The header line is excluded; malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::LogNotFound`] if the file does not exist.
    pub async fn read_log(&self, name: &str) -> Result<Vec<(String, u16)>> {
        let contents = self.read_raw(name).await?;
        let mut readings = Vec::new();

        for line in contents.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((timestamp, value)) = line.split_once(',') else {
                continue;
            };
            let Ok(co2) = value.trim().parse::<u16>() else {
                continue;
            };
            readings.push((timestamp.to_string(), co2));
        }

        Ok(readings)
    }

    /// Read a log file's raw contents, for the download view.
    pub async fn read_raw(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(MonitorError::LogNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a log file.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::LogNotFound`] if the file does not exist.
    pub async fn delete_log(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(MonitorError::LogNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the last data line from a log file.
    ///
    /// The header is always preserved.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::LogNotFound`] if the file does not exist.
    /// - [`MonitorError::NoDataLines`] if only the header remains; the
    ///   file is left unchanged.
    pub async fn truncate_last_line(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        let contents = self.read_raw(name).await?;
        let lines: Vec<&str> = contents.lines().collect();

        if lines.len() <= 1 {
            return Err(MonitorError::NoDataLines(name.to_string()));
        }

        let mut rebuilt = lines[..lines.len() - 1].join("\n");
        rebuilt.push('\n');
        fs::write(&path, rebuilt).await?;
        Ok(())
    }
}

/// Numeric component of a log file name (`20250720` for
/// `readings_20250720.csv`, `33` for `week33.csv`), `0` if none.
fn listing_key(name: &str) -> u64 {
    let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
