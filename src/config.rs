//! Configuration for record extraction and dataset kinds.
//!
//! - [`ExtractConfig`] - Tag pair and buffer capacity for the stream extractor
//! - [`DatasetKind`] - The dump flavors this tool knows how to diff

use crate::error::DiffError;

/// Default sliding-buffer capacity (128 MiB).
///
/// One buffer of this size is the whole memory footprint of extraction, no
/// matter how large the input dump is.
pub const DEFAULT_BUFFER_CAPACITY: usize = 128 * 1024 * 1024;

/// Maximum length of a start or end tag literal, in bytes.
pub const MAX_TAG_LEN: usize = 63;

/// Earliest nominal dump date accepted by the CLI (inclusive, `YYYYMMDD`).
pub const MIN_STREAM_DATE: u32 = 20000101;

/// Latest nominal dump date accepted by the CLI (inclusive, `YYYYMMDD`).
pub const MAX_STREAM_DATE: u32 = 20991231;

/// Configuration for tag-delimited record extraction.
///
/// A record is every byte from a `start_tag` match through the end of the next
/// `end_tag` match. Tags are literal byte strings, not XML names: for
/// attribute-carrying elements the start tag includes the trailing space
/// (e.g. `<Sample `) so that `<SampleGroup>` never matches.
///
/// The buffer capacity bounds the size of a single record: a record that does
/// not fit in the buffer is a fatal condition, not a silent truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    start_tag: Vec<u8>,
    end_tag: Vec<u8>,
    buffer_capacity: usize,
}

impl ExtractConfig {
    /// Creates a new configuration with the default buffer capacity.
    ///
    /// Returns an error if either tag is empty or longer than [`MAX_TAG_LEN`]
    /// bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpdiff::ExtractConfig;
    ///
    /// let config = ExtractConfig::new(b"<Sample ", b"</Sample>").unwrap();
    /// assert_eq!(config.start_tag(), b"<Sample ");
    /// ```
    pub fn new(start_tag: &[u8], end_tag: &[u8]) -> Result<Self, DiffError> {
        if start_tag.is_empty() || end_tag.is_empty() {
            return Err(DiffError::InvalidConfig {
                message: "start and end tags must be non-empty",
            });
        }

        if start_tag.len() > MAX_TAG_LEN || end_tag.len() > MAX_TAG_LEN {
            return Err(DiffError::InvalidConfig {
                message: "start and end tags must be at most 63 bytes",
            });
        }

        Ok(Self {
            start_tag: start_tag.to_vec(),
            end_tag: end_tag.to_vec(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        })
    }

    /// Sets the sliding-buffer capacity in bytes.
    ///
    /// Every record must fit in the buffer in its entirety, so the capacity is
    /// an upper bound on record size. Small capacities are mainly useful in
    /// tests to exercise refill and carryover behavior.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Returns the start tag literal.
    pub fn start_tag(&self) -> &[u8] {
        &self.start_tag
    }

    /// Returns the end tag literal.
    pub fn end_tag(&self) -> &[u8] {
        &self.end_tag
    }

    /// Returns the sliding-buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), DiffError> {
        Self::new(&self.start_tag, &self.end_tag)?;
        if self.buffer_capacity < self.start_tag.len() + self.end_tag.len() {
            return Err(DiffError::InvalidConfig {
                message: "buffer capacity cannot be smaller than the tag pair",
            });
        }
        Ok(())
    }
}

/// The dump flavors this tool knows how to diff.
///
/// Each kind fixes the record tag pair, the 8-byte tag stamped into store
/// files, and the initial store capacity. The tag pair is configuration, not
/// discovery: records of one kind never appear in a dump of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Per-sample records: `<Sample id="...">...</Sample>`.
    Sample,
    /// Per-project records: `<Project id="...">...</Project>`.
    Project,
}

impl DatasetKind {
    /// Returns the lowercase label used in output file names.
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Sample => "sample",
            DatasetKind::Project => "project",
        }
    }

    /// Returns the 8-byte tag stamped into persisted store files.
    pub fn store_tag(&self) -> [u8; 8] {
        match self {
            DatasetKind::Sample => *b"SAMPLE\0\0",
            DatasetKind::Project => *b"PROJECT\0",
        }
    }

    /// Looks up the kind for a persisted 8-byte store tag.
    pub fn from_store_tag(tag: &[u8; 8]) -> Option<Self> {
        match tag {
            b"SAMPLE\0\0" => Some(DatasetKind::Sample),
            b"PROJECT\0" => Some(DatasetKind::Project),
            _ => None,
        }
    }

    /// Returns the record start tag literal.
    pub fn start_tag(&self) -> &'static [u8] {
        match self {
            DatasetKind::Sample => b"<Sample ",
            DatasetKind::Project => b"<Project ",
        }
    }

    /// Returns the record end tag literal.
    pub fn end_tag(&self) -> &'static [u8] {
        match self {
            DatasetKind::Sample => b"</Sample>",
            DatasetKind::Project => b"</Project>",
        }
    }

    /// Returns the initial store capacity for a first-time build.
    ///
    /// Sized generously above the current top record ID of each dataset so a
    /// fresh store rarely grows during its first build.
    pub fn initial_capacity(&self) -> u32 {
        match self {
            DatasetKind::Sample => 60_000_000,
            DatasetKind::Project => 2_000_000,
        }
    }

    /// Builds the extraction configuration for this kind.
    pub fn extract_config(&self) -> Result<ExtractConfig, DiffError> {
        ExtractConfig::new(self.start_tag(), self.end_tag())
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Checks that a nominal dump date lies in the accepted `YYYYMMDD` range.
pub fn validate_stream_date(date: u32) -> Result<(), DiffError> {
    if !(MIN_STREAM_DATE..=MAX_STREAM_DATE).contains(&date) {
        return Err(DiffError::InvalidDate { date });
    }
    Ok(())
}
