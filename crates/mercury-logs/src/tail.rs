//! Incremental reader for the client log
//!
//! The tailer remembers how far it has read and, on each poll, reads only the
//! bytes appended since. A shrinking file or a changed file identity means the
//! client rotated or truncated the log; the cursor then restarts at 0.

use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use mercury_types::RawLine;

use crate::config::{StartPosition, TrackerConfig};
use crate::error::TrackerError;

/// Platform identity of a file, stable across appends and renames
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    created: std::time::SystemTime,
}

impl FileIdentity {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        metadata.created().ok().map(|created| Self { created })
    }
}

/// Read cursor plus the fingerprint of the file it points into
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogPosition {
    /// Bytes consumed so far; never exceeds `len`
    pub offset: u64,

    /// File size at the last successful stat
    pub len: u64,

    pub identity: Option<FileIdentity>,
}

/// Tails one append-only log file
pub struct LogTailer {
    path: PathBuf,
    start_position: StartPosition,
    max_read_bytes: usize,
    position: LogPosition,

    /// Bytes after the last newline, waiting for the rest of their line
    partial: Vec<u8>,

    /// Number of the last emitted line
    line_number: u64,

    /// Whether a poll has seen the file, or seen that it is missing
    polled: bool,

    /// Start-at-end landed inside a line; drop bytes up to its newline
    skip_fragment: bool,

    /// Availability reported by the last poll (None before the first poll)
    available: Option<bool>,
}

impl LogTailer {
    /// Create a tailer for the configured log file
    ///
    /// Fails when the path can never name a readable file (empty, directory).
    /// A file that does not exist yet is fine.
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        Ok(Self {
            path: config.log_file_path.clone(),
            start_position: config.start_position,
            max_read_bytes: config.max_read_bytes,
            position: LogPosition::default(),
            partial: Vec::new(),
            line_number: 0,
            polled: false,
            skip_fragment: false,
            available: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> &LogPosition {
        &self.position
    }

    /// Number of bytes held back as an incomplete line
    pub fn pending_bytes(&self) -> usize {
        self.partial.len()
    }

    /// Forget the cursor and any incomplete line; the next poll reads from 0
    pub fn reset(&mut self) {
        self.position.offset = 0;
        self.partial.clear();
        self.skip_fragment = false;
    }

    /// Read the lines appended since the previous poll
    ///
    /// Never fails: a missing file yields nothing, and I/O errors are logged
    /// and retried on the next poll.
    pub fn poll(&mut self) -> Vec<RawLine> {
        match self.try_poll() {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "log read failed, retrying on next poll"
                );
                Vec::new()
            }
        }
    }

    fn try_poll(&mut self) -> Result<Vec<RawLine>, TrackerError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // A file created later is new content, read it from 0
                self.polled = true;
                self.set_available(false);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        // Stat through the open handle so size and identity describe the
        // same file we read from
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(TrackerError::config(
                "log_file_path",
                format!("'{}' is a directory", self.path.display()),
            ));
        }
        self.set_available(true);

        let len = metadata.len();
        let identity = FileIdentity::from_metadata(&metadata);

        // Only a poll that saw the file consumes the start position
        if !self.polled && self.start_position == StartPosition::End {
            let skip_fragment = len > 0 && !ends_with_newline(&mut file, len)?;
            tracing::debug!(path = %self.path.display(), offset = len, skip_fragment, "seeding offset at end of file");
            self.position.offset = len;
            self.skip_fragment = skip_fragment;
        } else if self.rotated(len, identity) {
            tracing::info!(
                path = %self.path.display(),
                old_offset = self.position.offset,
                new_size = len,
                "log truncated or rotated, resetting offset to 0"
            );
            self.reset();
        }

        self.polled = true;
        self.position.len = len;
        self.position.identity = identity;

        if len == self.position.offset {
            return Ok(Vec::new());
        }

        let available = len - self.position.offset;
        let limit = available.min(self.max_read_bytes as u64);

        file.seek(SeekFrom::Start(self.position.offset))?;
        let mut buf = Vec::with_capacity(limit as usize);
        file.take(limit).read_to_end(&mut buf)?;

        if buf.is_empty() {
            return Ok(Vec::new());
        }

        // Consumed, whether or not the bytes complete a line
        self.position.offset += buf.len() as u64;
        self.partial.extend_from_slice(&buf);

        if self.skip_fragment {
            match self.partial.iter().position(|b| *b == b'\n') {
                Some(newline) => {
                    self.partial.drain(..=newline);
                    self.skip_fragment = false;
                }
                None => {
                    self.partial.clear();
                    return Ok(Vec::new());
                }
            }
        }

        let lines = self.take_complete_lines();
        if !lines.is_empty() {
            tracing::debug!(
                path = %self.path.display(),
                count = lines.len(),
                offset = self.position.offset,
                "read new lines"
            );
        }
        Ok(lines)
    }

    /// A shorter file or a different file behind the same path
    fn rotated(&self, len: u64, identity: Option<FileIdentity>) -> bool {
        if len < self.position.offset {
            return true;
        }
        matches!(
            (self.position.identity, identity),
            (Some(previous), Some(current)) if previous != current
        )
    }

    /// Split off every newline-terminated line, keeping the trailing fragment
    fn take_complete_lines(&mut self) -> Vec<RawLine> {
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                self.line_number += 1;
                RawLine::new(self.line_number, String::from_utf8_lossy(raw).into_owned())
            })
            .collect()
    }

    fn set_available(&mut self, available: bool) {
        if self.available == Some(available) {
            return;
        }
        if available {
            tracing::info!(path = %self.path.display(), "log file available");
        } else {
            tracing::warn!(path = %self.path.display(), "log file not found, waiting for it");
        }
        self.available = Some(available);
    }
}

/// Whether the byte before `len` is a line terminator
fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl std::fmt::Debug for LogTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTailer")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("pending_bytes", &self.partial.len())
            .finish()
    }
}
