//! Error types for dumpdiff.

use std::fmt;

use crate::config::DatasetKind;

/// Errors that can occur while extracting, diffing, or persisting.
///
/// Every variant is fatal to the run that produced it: nothing is retried, and
/// the store file is never written after a failure.
#[derive(Debug)]
pub enum DiffError {
    /// An I/O error occurred on the input stream, an output sink, or the store file.
    Io(std::io::Error),

    /// Invalid configuration parameter.
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// The buffer filled to capacity without containing a single complete record.
    ///
    /// Either the configured tag pair does not occur in the input, or one
    /// record is larger than the buffer.
    RecordOverflow {
        /// The buffer capacity that was exhausted.
        capacity: usize,
    },

    /// A record carries no `id="` attribute.
    MissingId {
        /// Stream offset of the record's start tag.
        offset: u64,
    },

    /// A record's `id="` value does not fit in 32 bits.
    IdOutOfRange {
        /// Stream offset of the record's start tag.
        offset: u64,
    },

    /// A store file ended before all of its declared sections could be read.
    TruncatedStore,

    /// A store file carries content that no run could have written.
    CorruptStore {
        /// Description of the inconsistency.
        message: &'static str,
    },

    /// A store file's 8-byte tag names no known dataset kind.
    UnknownDataset {
        /// The tag as read from the file.
        tag: [u8; 8],
    },

    /// The store was built for a different dataset kind than the one requested.
    DatasetMismatch {
        /// The kind the caller asked to diff.
        expected: DatasetKind,
        /// The kind recorded in the store.
        found: DatasetKind,
    },

    /// The new stream's nominal date is not strictly newer than the store's.
    DateNotNewer {
        /// The date recorded in the store.
        store: u32,
        /// The nominal date of the new stream.
        stream: u32,
    },

    /// A nominal dump date lies outside the accepted range.
    InvalidDate {
        /// The rejected date.
        date: u32,
    },
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffError::Io(e) => write!(f, "io error: {}", e),
            DiffError::InvalidConfig { message } => {
                write!(f, "invalid config: {}", message)
            }
            DiffError::RecordOverflow { capacity } => {
                write!(
                    f,
                    "no complete record in {} buffered bytes: the tag pair is absent \
                     from the input or a record exceeds the buffer capacity",
                    capacity
                )
            }
            DiffError::MissingId { offset } => {
                write!(f, "record at stream offset {} has no id=\" attribute", offset)
            }
            DiffError::IdOutOfRange { offset } => {
                write!(
                    f,
                    "record at stream offset {} has an id that does not fit in 32 bits",
                    offset
                )
            }
            DiffError::TruncatedStore => write!(f, "truncated store file"),
            DiffError::CorruptStore { message } => {
                write!(f, "corrupt store file: {}", message)
            }
            DiffError::UnknownDataset { tag } => {
                write!(
                    f,
                    "store file tagged with unknown dataset {:?}",
                    String::from_utf8_lossy(tag)
                )
            }
            DiffError::DatasetMismatch { expected, found } => {
                write!(
                    f,
                    "dataset mismatch: expected a {} store, found {}",
                    expected, found
                )
            }
            DiffError::DateNotNewer { store, stream } => {
                write!(
                    f,
                    "stream date {} is not newer than the store date {}",
                    stream, store
                )
            }
            DiffError::InvalidDate { date } => {
                write!(f, "invalid dump date {} (expected YYYYMMDD)", date)
            }
        }
    }
}

impl std::error::Error for DiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiffError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DiffError {
    fn from(e: std::io::Error) -> Self {
        DiffError::Io(e)
    }
}
