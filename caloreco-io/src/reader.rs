//! Memory-mapped event readers.
//!

use crate::{Error, Result};
use caloreco_core::Event;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Returns the path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates over non-blank lines as `(1-based line number, bytes)`.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.mmap
            .split(|&b| b == b'\n')
            .enumerate()
            .map(|(idx, line)| (idx + 1, trim_line(line)))
            .filter(|(_, line)| !line.is_empty())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &line[start..end]
}

fn parse_event(line_number: usize, line: &[u8]) -> Result<Event> {
    serde_json::from_slice(line).map_err(|e| Error::InvalidFormat {
        line: line_number,
        message: e.to_string(),
    })
}

#[derive(Debug, Default)]
struct Cursor {
    offset: usize,
    line: usize,
}

/// Clears the inflight flag when a read ends, however it ends.
struct InflightGuard<'a>(&'a AtomicBool);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Event source over a file holding one JSON event per line.
///
/// Only one read may be in flight at a time. A concurrent call to
/// [`JsonLinesEventSource::next_event`] fails with [`Error::Busy`] instead
/// of blocking; the caller decides whether to retry.
pub struct JsonLinesEventSource {
    reader: MappedFileReader,
    cursor: Mutex<Cursor>,
    inflight: AtomicBool,
}

impl JsonLinesEventSource {
    /// Opens an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        debug!(path = %reader.path().display(), bytes = reader.len(), "event file opened");
        Ok(Self {
            reader,
            cursor: Mutex::new(Cursor::default()),
            inflight: AtomicBool::new(false),
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Reads the next event.
    ///
    /// Returns `Ok(None)` once the file is exhausted.
    ///
    /// # Errors
    /// Returns [`Error::Busy`] if another read is in flight and
    /// [`Error::InvalidFormat`] for a line that is not a valid event. The
    /// offending line is consumed, so the next call continues after it.
    pub fn next_event(&self) -> Result<Option<Event>> {
        if self
            .inflight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(Error::Busy);
        }
        let _guard = InflightGuard(&self.inflight);

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = self.reader.as_bytes();
        while cursor.offset < bytes.len() {
            let rest = &bytes[cursor.offset..];
            let (raw, consumed) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => (&rest[..pos], pos + 1),
                None => (rest, rest.len()),
            };
            cursor.offset += consumed;
            cursor.line += 1;

            let line = trim_line(raw);
            if line.is_empty() {
                continue;
            }
            trace!(line = cursor.line, "reading event");
            return parse_event(cursor.line, line).map(Some);
        }
        Ok(None)
    }

    /// Reads every event of the file, parsing lines in parallel.
    ///
    /// Independent of the [`JsonLinesEventSource::next_event`] cursor.
    ///
    /// # Errors
    /// Returns the error of the first malformed line.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let lines: Vec<(usize, &[u8])> = self.reader.lines().collect();
        lines
            .into_par_iter()
            .map(|(line_number, line)| parse_event(line_number, line))
            .collect()
    }
}
