//! JSON-lines writer for reconstruction output.

use crate::Result;
use caloreco_core::EventOutput;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one [`EventOutput`] per line.
pub struct JsonLinesWriter<W: Write = BufWriter<File>> {
    writer: W,
    written: usize,
}

impl JsonLinesWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesWriter<W> {
    /// Wraps any writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Writes one event.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub fn write_event(&mut self, event: &EventOutput) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Writes several events in order.
    ///
    /// # Errors
    /// Returns the first encoding or write error.
    pub fn write_events<'a, I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a EventOutput>,
    {
        for event in events {
            self.write_event(event)?;
        }
        Ok(())
    }

    /// Number of events written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
