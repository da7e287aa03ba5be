//! dumpdiff
//!
//! Streaming fingerprint diff for huge tag-delimited XML dumps.
//!
//! `dumpdiff` turns an unbounded byte stream of tag-delimited records into an
//! incremental add/change/delete changeset against a persisted fingerprint
//! store. It is designed for periodic multi-gigabyte dumps where only a small
//! fraction of records changes between releases:
//!
//! - records are located by literal start/end tag pairs, never by parsing XML
//! - each record is reduced to a 16-byte content fingerprint
//! - fingerprints live in a flat store indexed directly by record ID
//! - a diff round classifies every record and commits the store for the next round
//!
//! The crate intentionally:
//! - does NOT validate XML well-formedness or schemas
//! - does NOT retry or recover from errors (a run completes or aborts)
//! - does NOT mutate the store file before the final commit
//!
//! It only does one thing: **stream in → changeset & updated store out**
//!
//! # Building a store
//!
//! ```no_run
//! use std::fs::File;
//! use dumpdiff::{DatasetKind, DiffError, FingerprintStore, StreamExtractor, build};
//!
//! fn main() -> Result<(), DiffError> {
//!     let kind = DatasetKind::Sample;
//!     let source = File::open("sample_set.xml")?;
//!     let mut extractor = StreamExtractor::new(source, kind.extract_config()?);
//!     let mut store = FingerprintStore::new(kind, 20250101, kind.initial_capacity());
//!
//!     build(&mut extractor, &mut store)?;
//!     store.save("sample.db")?;
//!     Ok(())
//! }
//! ```
//!
//! # Diffing a later dump
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufWriter;
//! use dumpdiff::{DatasetKind, DiffEngine, DiffError, FingerprintStore, StreamExtractor};
//!
//! fn main() -> Result<(), DiffError> {
//!     let kind = DatasetKind::Sample;
//!     let store = FingerprintStore::load("sample.db")?;
//!     let mut engine = DiffEngine::open(store, kind, 20250201)?;
//!
//!     let source = File::open("sample_set_next.xml")?;
//!     let mut extractor = StreamExtractor::new(source, kind.extract_config()?);
//!     let mut body = BufWriter::new(File::create("sample_diff.xml")?);
//!
//!     engine.compare(&mut extractor, &mut body)?;
//!     let summary = engine.write_status(BufWriter::new(File::create("sample_diff.list")?))?;
//!     println!("+{} ~{} -{}", summary.added, summary.changed, summary.deleted);
//!
//!     engine.commit_and_save("sample.db")?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diff;
mod error;
mod extract;
mod record;
mod store;

mod digest; // internal md5 impl

//
// Public surface (intentionally tiny)
//

pub use config::{DatasetKind, ExtractConfig, validate_stream_date};
pub use diff::{DiffEngine, DiffSummary, build};
pub use error::DiffError;
pub use extract::{Batch, StreamExtractor};
pub use record::{Fingerprint, Record, RecordSpan};
pub use store::{FingerprintStore, Status};
