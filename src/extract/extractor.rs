//! Sliding-buffer record extractor.
//!
//! [`StreamExtractor`] scans an unbounded byte stream for tag-delimited
//! records without ever holding more than one buffer of input in memory. Each
//! call to [`next_batch`] compacts the buffer, refills it from the source, and
//! yields every complete record the buffered bytes contain; an incomplete
//! record at the tail is carried over to the next refill.
//!
//! The extractor is a tag-substring scanner, not an XML parser: it never
//! inspects nesting, attributes (beyond the one `id="` literal), or encoding.
//!
//! [`next_batch`]: StreamExtractor::next_batch
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use dumpdiff::{ExtractConfig, StreamExtractor};
//!
//! let input = br#"<Sample id="7">x</Sample><Sample id="9">y</Sample>"#;
//! let config = ExtractConfig::new(b"<Sample ", b"</Sample>").unwrap();
//! let mut extractor = StreamExtractor::new(Cursor::new(&input[..]), config);
//!
//! let mut ids = Vec::new();
//! while let Some(batch) = extractor.next_batch().unwrap() {
//!     ids.extend(batch.records().map(|r| r.id));
//! }
//! assert_eq!(ids, [7, 9]);
//! ```

use std::io::Read;

use memchr::memmem;

use crate::config::ExtractConfig;
use crate::error::DiffError;
use crate::record::{Record, RecordSpan};

/// The attribute literal a record ID is parsed from.
const ID_ATTR: &[u8] = b"id=\"";

/// One refill's worth of extracted records.
///
/// A batch borrows the extractor's buffer, so the borrow checker requires it
/// to be dropped before the next call to [`StreamExtractor::next_batch`].
/// A batch with zero records is normal: it means the buffered bytes end
/// inside a record and more input is pending.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    data: &'a [u8],
    spans: &'a [RecordSpan],
}

impl<'a> Batch<'a> {
    /// Returns the number of records in the batch.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns true if the batch contains no records.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Returns the record spans of this batch.
    pub fn spans(&self) -> &'a [RecordSpan] {
        self.spans
    }

    /// Returns the exact bytes of a span, both tags included.
    pub fn body(&self, span: &RecordSpan) -> &'a [u8] {
        &self.data[span.offset..span.offset + span.len]
    }

    /// Returns the record at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn get(&self, index: usize) -> Record<'a> {
        let span = &self.spans[index];
        Record {
            id: span.id,
            body: self.body(span),
        }
    }

    /// Iterates over the records of this batch in stream order.
    pub fn records(&self) -> impl Iterator<Item = Record<'a>> + '_ {
        self.spans.iter().map(|span| Record {
            id: span.id,
            body: self.body(span),
        })
    }
}

/// A bounded-memory extractor of tag-delimited records.
///
/// The extractor owns one buffer of fixed capacity (128 MiB by default, see
/// [`ExtractConfig`]). Per [`next_batch`] call it:
///
/// 1. fails if the previous round left the buffer full without a single
///    complete record (tag pair absent, or one record larger than the buffer),
/// 2. moves the unconsumed tail to the front of the buffer,
/// 3. refills from the source until the buffer is full or the source is
///    drained (zero bytes read signals exhaustion),
/// 4. scans for start/end tag pairs, parsing each record's `id="` attribute,
///    and retains any trailing incomplete record for the next round.
///
/// Bytes outside any record (headers, wrapper elements, whitespace between
/// records) are skipped without being reported.
///
/// [`next_batch`]: StreamExtractor::next_batch
pub struct StreamExtractor<R> {
    source: R,
    buf: Vec<u8>,
    /// Offset of the first unconsumed byte.
    front: usize,
    /// End of the valid bytes in `buf`.
    len: usize,
    /// Stream offset of `buf[0]`, for diagnostics.
    base_offset: u64,
    spans: Vec<RecordSpan>,
    start_finder: memmem::Finder<'static>,
    end_finder: memmem::Finder<'static>,
    start_tag_len: usize,
    end_tag_len: usize,
    exhausted: bool,
}

impl<R: Read> StreamExtractor<R> {
    /// Creates a new extractor over `source`.
    ///
    /// The configuration is trusted as constructed; see
    /// [`ExtractConfig::new`] for tag validation.
    pub fn new(source: R, config: ExtractConfig) -> Self {
        Self {
            source,
            buf: vec![0u8; config.buffer_capacity()],
            front: 0,
            len: 0,
            base_offset: 0,
            spans: Vec::new(),
            start_finder: memmem::Finder::new(config.start_tag()).into_owned(),
            end_finder: memmem::Finder::new(config.end_tag()).into_owned(),
            start_tag_len: config.start_tag().len(),
            end_tag_len: config.end_tag().len(),
            exhausted: false,
        }
    }

    /// Returns the buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// Pulls the next batch of records from the stream.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A returned batch may
    /// be empty when the buffered bytes end inside a record; keep pulling.
    ///
    /// # Errors
    ///
    /// - [`DiffError::RecordOverflow`] if a full buffer contains no complete
    ///   record,
    /// - [`DiffError::MissingId`] / [`DiffError::IdOutOfRange`] for records
    ///   with an unusable `id="` attribute,
    /// - [`DiffError::Io`] if the source fails.
    pub fn next_batch(&mut self) -> Result<Option<Batch<'_>>, DiffError> {
        if self.exhausted {
            return Ok(None);
        }

        // A buffer still full from the previous round means no record boundary
        // was found in capacity bytes.
        if self.len - self.front == self.buf.len() {
            return Err(DiffError::RecordOverflow {
                capacity: self.buf.len(),
            });
        }

        // Compact: move the unconsumed tail to the front.
        self.buf.copy_within(self.front..self.len, 0);
        self.base_offset += self.front as u64;
        self.len -= self.front;
        self.front = 0;

        // Refill until full or the source is drained.
        let mut filled = 0usize;
        while self.len < self.buf.len() {
            let n = self.source.read(&mut self.buf[self.len..])?;
            if n == 0 {
                break;
            }
            self.len += n;
            filled += n;
        }

        if filled == 0 {
            // Any leftover tail holds no complete record; drop it with the stream.
            self.exhausted = true;
            return Ok(None);
        }

        self.scan()?;

        Ok(Some(Batch {
            data: &self.buf[..self.len],
            spans: &self.spans,
        }))
    }

    /// Scans the buffered bytes for complete records, advancing `front` past
    /// each one. Stops at the first tag that is not (yet) buffered.
    fn scan(&mut self) -> Result<(), DiffError> {
        self.spans.clear();

        loop {
            let Some(rel_start) = self.start_finder.find(&self.buf[self.front..self.len]) else {
                break; // no start tag buffered yet
            };

            // Discard anything between records.
            self.front += rel_start;

            let after_start = self.front + self.start_tag_len;
            let Some(rel_end) = self.end_finder.find(&self.buf[after_start..self.len]) else {
                break; // record is incomplete; carry it over
            };

            let span_len = self.start_tag_len + rel_end + self.end_tag_len;
            let body = &self.buf[self.front..self.front + span_len];
            let id = match parse_record_id(body) {
                Ok(id) => id,
                Err(IdParse::Missing) => {
                    return Err(DiffError::MissingId {
                        offset: self.base_offset + self.front as u64,
                    });
                }
                Err(IdParse::OutOfRange) => {
                    return Err(DiffError::IdOutOfRange {
                        offset: self.base_offset + self.front as u64,
                    });
                }
            };

            self.spans.push(RecordSpan {
                offset: self.front,
                len: span_len,
                id,
            });
            self.front += span_len;
        }

        Ok(())
    }
}

enum IdParse {
    Missing,
    OutOfRange,
}

/// Parses the record ID from the first `id="` occurrence in `body`.
///
/// Digits are consumed greedily after the quote; a non-digit stops the parse,
/// so `id=""` and `id="x"` yield 0. The ID is a store slot index and store
/// capacity is a `u32`, so values that overflow `u32` are rejected, as is
/// `u32::MAX` itself, which no capacity can cover.
fn parse_record_id(body: &[u8]) -> Result<u32, IdParse> {
    let pos = memmem::find(body, ID_ATTR).ok_or(IdParse::Missing)?;

    let mut id: u32 = 0;
    for &byte in &body[pos + ID_ATTR.len()..] {
        if !byte.is_ascii_digit() {
            break;
        }
        id = id
            .checked_mul(10)
            .and_then(|v| v.checked_add(u32::from(byte - b'0')))
            .ok_or(IdParse::OutOfRange)?;
    }

    if id == u32::MAX {
        return Err(IdParse::OutOfRange);
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config(capacity: usize) -> ExtractConfig {
        ExtractConfig::new(b"<Sample ", b"</Sample>")
            .unwrap()
            .with_buffer_capacity(capacity)
    }

    fn record(id: u32, content: &str) -> String {
        format!(r#"<Sample id="{}">{}</Sample>"#, id, content)
    }

    /// Collects (id, body) pairs across all batches.
    fn extract_all<R: Read>(extractor: &mut StreamExtractor<R>) -> Vec<(u32, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(batch) = extractor.next_batch().unwrap() {
            out.extend(batch.records().map(|r| (r.id, r.body.to_vec())));
        }
        out
    }

    /// A reader that hands out at most `chunk` bytes per read call.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_extracts_records_with_ids() {
        let input = format!("{}{}", record(7, "abc"), record(9, "def"));
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        let records = extract_all(&mut extractor);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 7);
        assert_eq!(records[0].1, record(7, "abc").into_bytes());
        assert_eq!(records[1].0, 9);
        assert_eq!(records[1].1, record(9, "def").into_bytes());
    }

    #[test]
    fn test_skips_bytes_between_records() {
        let input = format!(
            "<?xml version=\"1.0\"?>\n<SampleSet>\n{}\n  {}\n</SampleSet>\n",
            record(1, "a"),
            record(2, "b")
        );
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        let ids: Vec<u32> = extract_all(&mut extractor).iter().map(|r| r.0).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn test_record_split_across_refills() {
        // Buffer far smaller than the input forces carryover mid-record.
        let input: String = (0..50).map(|i| record(i, "payload-payload")).collect();
        let expected: Vec<u32> = (0..50).collect();

        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(64));
        let ids: Vec<u32> = extract_all(&mut extractor).iter().map(|r| r.0).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_chunking_independence() {
        let input: String = (0..40).map(|i| record(i, "the content")).collect();
        let data = input.into_bytes();

        let mut reference: Option<Vec<(u32, Vec<u8>)>> = None;
        for chunk in [1, 3, 7, 64, 1000, usize::MAX] {
            let reader = ChunkedReader {
                data: data.clone(),
                pos: 0,
                chunk,
            };
            let mut extractor = StreamExtractor::new(reader, config(128));
            let records = extract_all(&mut extractor);

            match &reference {
                None => reference = Some(records),
                Some(expected) => assert_eq!(
                    &records, expected,
                    "extraction must not depend on transport chunk size ({})",
                    chunk
                ),
            }
        }
        assert_eq!(reference.unwrap().len(), 40);
    }

    #[test]
    fn test_empty_batch_while_record_pending() {
        // 40 bytes of wrapper noise push the record past the first refill: the
        // first batch skips the noise but holds only part of the record.
        let body = record(3, &"x".repeat(25));
        let input = format!("{}{}", "#".repeat(40), body);
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(64));

        let first = extractor.next_batch().unwrap().unwrap();
        assert!(first.is_empty(), "first batch should carry the partial record");
        drop(first);

        let second = extractor.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.get(0).id, 3);
        assert_eq!(second.get(0).body, body.as_bytes());
    }

    #[test]
    fn test_unterminated_record_overflows_buffer() {
        let input = format!(r#"<Sample id="1">{}"#, "y".repeat(200));
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(64));

        let mut err = None;
        loop {
            match extractor.next_batch() {
                Ok(Some(batch)) => assert!(batch.is_empty()),
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(matches!(err, Some(DiffError::RecordOverflow { capacity: 64 })));
    }

    #[test]
    fn test_missing_tag_pair_overflows_buffer() {
        // No start tag at all: the buffer fills with unmatchable bytes.
        let input = "z".repeat(300);
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(64));

        let mut saw_overflow = false;
        loop {
            match extractor.next_batch() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(DiffError::RecordOverflow { .. }) => {
                    saw_overflow = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(saw_overflow);
    }

    #[test]
    fn test_trailing_partial_is_dropped_at_exhaustion() {
        // A dangling start tag small enough to stay under capacity is dropped
        // when the source drains, matching a dump's closing wrapper noise.
        let input = format!("{}<Sample id=\"2\">dangling", record(1, "a"));
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        let ids: Vec<u32> = extract_all(&mut extractor).iter().map(|r| r.0).collect();
        assert_eq!(ids, [1]);
    }

    #[test]
    fn test_missing_id_is_fatal() {
        let input = "<Sample >no id here</Sample>".to_string();
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        assert!(matches!(
            extractor.next_batch(),
            Err(DiffError::MissingId { offset: 0 })
        ));
    }

    #[test]
    fn test_missing_id_offset_accounts_for_skipped_prefix() {
        let input = "##########<Sample >no id</Sample>".to_string();
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        assert!(matches!(
            extractor.next_batch(),
            Err(DiffError::MissingId { offset: 10 })
        ));
    }

    #[test]
    fn test_parse_record_id_first_match_wins() {
        let body = br#"<Sample id="12" ref id="99">x</Sample>"#;
        assert_eq!(parse_record_id(body).ok(), Some(12));
    }

    #[test]
    fn test_parse_record_id_zero_digits() {
        // A quote followed by a non-digit parses as ID 0.
        let body = br#"<Sample id="x7">x</Sample>"#;
        assert_eq!(parse_record_id(body).ok(), Some(0));
    }

    #[test]
    fn test_parse_record_id_overflow() {
        let body = br#"<Sample id="4294967296">x</Sample>"#; // u32::MAX + 1
        assert!(matches!(parse_record_id(body), Err(IdParse::OutOfRange)));

        let body = br#"<Sample id="4294967295">x</Sample>"#; // u32::MAX: unindexable
        assert!(matches!(parse_record_id(body), Err(IdParse::OutOfRange)));

        let body = br#"<Sample id="4294967294">x</Sample>"#;
        assert_eq!(parse_record_id(body).ok(), Some(u32::MAX - 1));
    }

    #[test]
    fn test_batch_accessors() {
        let input = format!("{}{}", record(4, "a"), record(5, "b"));
        let mut extractor = StreamExtractor::new(Cursor::new(input.into_bytes()), config(1024));

        let batch = extractor.next_batch().unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.get(0).id, 4);
        assert_eq!(batch.get(1).id, 5);
        assert_eq!(batch.spans().len(), 2);
        assert_eq!(batch.body(&batch.spans()[0]), record(4, "a").as_bytes());
    }
}
