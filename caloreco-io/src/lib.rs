//! caloreco-io: Event file I/O for caloreco.
//!
//! This crate provides a memory-mapped JSON-lines event source (one
//! event per line, one read in flight at a time), a JSON-lines output
//! writer, and a batched file-to-file reconstruction driver.
//!

mod error;
pub mod pipeline;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use pipeline::{process_file, process_source, BatchConfig, ProcessSummary};
pub use reader::{JsonLinesEventSource, MappedFileReader};
pub use writer::JsonLinesWriter;
