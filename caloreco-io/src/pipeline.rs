//! File-to-file reconstruction in bounded batches.

use crate::reader::JsonLinesEventSource;
use crate::writer::JsonLinesWriter;
use crate::Result;
use caloreco_algorithms::Reconstruction;
use caloreco_core::Event;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Batching for [`process_file`].
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Events reconstructed together on the worker pool.
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 256 }
    }
}

impl BatchConfig {
    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the batch size, rejecting zero.
    ///
    /// # Errors
    /// Returns a configuration error if `batch_size` is zero.
    pub fn try_with_batch_size(self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(caloreco_core::Error::config("batch size must be greater than zero").into());
        }
        Ok(self.with_batch_size(batch_size))
    }
}

/// Totals of a [`process_file`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Events read and reconstructed.
    pub events: usize,
    /// Reconstructed particles written.
    pub particles: usize,
    /// Neutral particles synthesized from clusters.
    pub neutrals: usize,
}

/// Reconstructs every event of `input` and writes the outputs to `output`
/// in input order.
///
/// # Errors
/// Stops at the first read, reconstruction or write error.
#[instrument(name = "io.process_file", skip_all, fields(input = %input.as_ref().display()))]
pub fn process_file<P, Q>(
    reconstruction: &Reconstruction,
    input: P,
    output: Q,
    batch: &BatchConfig,
) -> Result<ProcessSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let source = JsonLinesEventSource::open(input)?;
    let mut writer = JsonLinesWriter::create(output)?;
    let summary = process_source(reconstruction, &source, &mut writer, batch)?;
    writer.flush()?;
    info!(
        events = summary.events,
        particles = summary.particles,
        neutrals = summary.neutrals,
        "file processed"
    );
    Ok(summary)
}

/// Drains `source` batch by batch into `writer`.
///
/// # Errors
/// Stops at the first read, reconstruction or write error.
pub fn process_source<W: Write>(
    reconstruction: &Reconstruction,
    source: &JsonLinesEventSource,
    writer: &mut JsonLinesWriter<W>,
    batch: &BatchConfig,
) -> Result<ProcessSummary> {
    let batch_size = batch.batch_size.max(1);
    let mut summary = ProcessSummary::default();
    let mut events: Vec<Event> = Vec::with_capacity(batch_size);

    loop {
        events.clear();
        while events.len() < batch_size {
            match source.next_event()? {
                Some(event) => events.push(event),
                None => break,
            }
        }
        if events.is_empty() {
            break;
        }

        for output in reconstruction.process_events(&events) {
            let output = output?;
            summary.events += 1;
            summary.particles += output.particles.len();
            summary.neutrals += output
                .particles
                .iter()
                .filter(|p| !p.from_tracking)
                .count();
            writer.write_event(&output)?;
        }
    }
    Ok(summary)
}
