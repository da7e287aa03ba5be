//! Streaming record extraction.
//!
//! - [`StreamExtractor`] - Pulls batches of tag-delimited records from a byte stream
//! - [`Batch`] - One refill's worth of records, borrowed from the sliding buffer

mod extractor;

pub use extractor::{Batch, StreamExtractor};
