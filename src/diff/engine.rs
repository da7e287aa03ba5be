//! The diff engine - classification, reporting, commit.
//!
//! A diff round pulls batches from a [`StreamExtractor`], fingerprints every
//! record, and reconciles the fingerprints against a [`FingerprintStore`]
//! loaded from the previous round:
//!
//! - fingerprinting is data-parallel per batch (each record digests into its
//!   own slot of the batch table; the ordered collect is the barrier),
//! - classification, output, and flag updates are sequential, so the body
//!   file is written in first-seen order and the store is never shared,
//! - deletions fall out of the final store scan: a slot still carrying the
//!   "present" marker was never visited by the new stream.
//!
//! [`build`] is the same loop without the classification step.

use std::io::{Read, Write};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::DatasetKind;
use crate::digest::Md5Digester;
use crate::error::DiffError;
use crate::extract::{Batch, StreamExtractor};
use crate::record::Fingerprint;
use crate::store::{FingerprintStore, Status};

/// Counts of the classifications one diff round produced.
///
/// `Unchanged` records are not counted; only differences are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Records first seen this round.
    pub added: u64,
    /// Records whose fingerprint differs from the stored one.
    pub changed: u64,
    /// Records absent from the new stream.
    pub deleted: u64,
}

impl DiffSummary {
    /// Returns true if the round found no difference at all.
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.deleted == 0
    }
}

/// Compares a new stream against a persisted store and derives the changeset.
///
/// The engine owns the store for the duration of the run. Constructing one
/// via [`open`] checks the store's preconditions; [`compare`] classifies the
/// stream; [`write_status`] reports; [`commit_and_save`] normalizes the store
/// for the next round and persists it, the only moment the store file is
/// touched.
///
/// [`open`]: DiffEngine::open
/// [`compare`]: DiffEngine::compare
/// [`write_status`]: DiffEngine::write_status
/// [`commit_and_save`]: DiffEngine::commit_and_save
#[derive(Debug)]
pub struct DiffEngine {
    store: FingerprintStore,
    stream_date: u32,
}

impl DiffEngine {
    /// Takes ownership of a loaded store after checking its preconditions.
    ///
    /// # Errors
    ///
    /// - [`DiffError::DatasetMismatch`] if the store was built for another
    ///   dataset kind,
    /// - [`DiffError::DateNotNewer`] unless `stream_date` is strictly greater
    ///   than the store's recorded date (re-applying a dump, or applying dumps
    ///   out of order, would silently corrupt the next round's deletions).
    pub fn open(
        store: FingerprintStore,
        kind: DatasetKind,
        stream_date: u32,
    ) -> Result<Self, DiffError> {
        if store.kind() != kind {
            return Err(DiffError::DatasetMismatch {
                expected: kind,
                found: store.kind(),
            });
        }

        if stream_date <= store.as_of_date() {
            return Err(DiffError::DateNotNewer {
                store: store.as_of_date(),
                stream: stream_date,
            });
        }

        Ok(Self { store, stream_date })
    }

    /// Returns the store as classified so far.
    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Pulls the stream to exhaustion, classifying every record.
    ///
    /// Bodies of `Added` and `Changed` records are written to `body` in
    /// first-seen order, each followed by a newline separator. Returns the
    /// number of records seen.
    pub fn compare<R: Read, W: Write>(
        &mut self,
        extractor: &mut StreamExtractor<R>,
        body: &mut W,
    ) -> Result<u64, DiffError> {
        let mut total = 0u64;

        while let Some(batch) = extractor.next_batch()? {
            let fingerprints = fingerprint_batch(&batch);
            grow_for_batch(&mut self.store, &batch);

            for (record, &fingerprint) in batch.records().zip(fingerprints.iter()) {
                if self.store.status(record.id) == Status::Empty {
                    body.write_all(record.body)?;
                    body.write_all(b"\n")?;
                    self.store.set(record.id, fingerprint);
                    self.store.classify(record.id, Status::Added);
                } else if self.store.get(record.id) != fingerprint {
                    body.write_all(record.body)?;
                    body.write_all(b"\n")?;
                    self.store.set(record.id, fingerprint);
                    self.store.classify(record.id, Status::Changed);
                } else {
                    self.store.classify(record.id, Status::Unchanged);
                }
            }

            total += batch.len() as u64;
            debug!(records = total, "compared batch");
        }

        info!(records = total, "stream compared");
        Ok(total)
    }

    /// Scans the store once and writes the status list in ascending ID order.
    ///
    /// One `<STATUS>\t<id>` line per `Added`, `Changed`, or `Deleted` record;
    /// a slot still marked present was never visited by [`compare`] and is
    /// reported as `DELETE`. `Unchanged` records are not reported.
    ///
    /// [`compare`]: DiffEngine::compare
    pub fn write_status<W: Write>(&self, mut out: W) -> Result<DiffSummary, DiffError> {
        let mut summary = DiffSummary::default();

        for (id, status) in self.store.statuses() {
            let label = match status {
                Status::Stale => {
                    summary.deleted += 1;
                    "DELETE"
                }
                Status::Added => {
                    summary.added += 1;
                    "ADD"
                }
                Status::Changed => {
                    summary.changed += 1;
                    "CHANGE"
                }
                Status::Empty | Status::Unchanged => continue,
            };
            writeln!(out, "{}\t{}", label, id)?;
        }

        out.flush()?;
        info!(
            added = summary.added,
            changed = summary.changed,
            deleted = summary.deleted,
            "status list written"
        );
        Ok(summary)
    }

    /// Commits the round and persists the store to `path`.
    ///
    /// Flags normalize per the status lifecycle (deleted slots are cleared),
    /// the store's date becomes the stream date given to [`open`], and the
    /// store file is rewritten in one pass.
    ///
    /// [`open`]: DiffEngine::open
    pub fn commit_and_save(mut self, path: impl AsRef<std::path::Path>) -> Result<(), DiffError> {
        self.store.commit_and_save(path, self.stream_date)
    }

    /// Consumes the engine and returns the store without committing.
    pub fn into_store(self) -> FingerprintStore {
        self.store
    }
}

/// Populates `store` from a first-time stream: no classification, every
/// record is stored as present. Returns the number of records seen.
pub fn build<R: Read>(
    extractor: &mut StreamExtractor<R>,
    store: &mut FingerprintStore,
) -> Result<u64, DiffError> {
    let mut total = 0u64;

    while let Some(batch) = extractor.next_batch()? {
        let fingerprints = fingerprint_batch(&batch);
        grow_for_batch(store, &batch);

        for (span, fingerprint) in batch.spans().iter().zip(fingerprints) {
            store.set(span.id(), fingerprint);
        }

        total += batch.len() as u64;
        debug!(records = total, "stored batch");
    }

    info!(records = total, "store built");
    Ok(total)
}

/// Digests every record of a batch in parallel, preserving batch order.
///
/// Workers touch disjoint records and disjoint destination slots; the collect
/// is the synchronization barrier before the sequential classification pass.
fn fingerprint_batch(batch: &Batch<'_>) -> Vec<Fingerprint> {
    batch
        .spans()
        .par_iter()
        .map(|span| Md5Digester::digest(batch.body(span)))
        .collect()
}

/// Grows `store` to cover every ID in the batch before any slot is touched.
fn grow_for_batch(store: &mut FingerprintStore, batch: &Batch<'_>) {
    if let Some(max_id) = batch.spans().iter().map(|span| span.id()).max() {
        store.grow(max_id + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use std::io::Cursor;

    fn record(id: u32, content: &str) -> String {
        format!(r#"<Sample id="{}">{}</Sample>"#, id, content)
    }

    fn extractor_over(input: String) -> StreamExtractor<Cursor<Vec<u8>>> {
        let config = ExtractConfig::new(b"<Sample ", b"</Sample>")
            .unwrap()
            .with_buffer_capacity(4096);
        StreamExtractor::new(Cursor::new(input.into_bytes()), config)
    }

    fn built_store(records: &[(u32, &str)], date: u32) -> FingerprintStore {
        let input: String = records.iter().map(|&(id, c)| record(id, c)).collect();
        let mut store = FingerprintStore::new(DatasetKind::Sample, date, 4);
        build(&mut extractor_over(input), &mut store).unwrap();
        store
    }

    #[test]
    fn test_build_marks_everything_present() {
        let store = built_store(&[(1, "A"), (2, "B"), (3, "C")], 20250101);
        for id in 1..=3 {
            assert_eq!(store.status(id), Status::Stale);
            assert!(!store.get(id).is_zero());
        }
        assert_eq!(store.status(0), Status::Empty);
    }

    #[test]
    fn test_open_rejects_kind_mismatch() {
        let store = FingerprintStore::new(DatasetKind::Project, 20250101, 4);
        assert!(matches!(
            DiffEngine::open(store, DatasetKind::Sample, 20250201),
            Err(DiffError::DatasetMismatch { .. })
        ));
    }

    #[test]
    fn test_open_rejects_non_increasing_date() {
        let store = FingerprintStore::new(DatasetKind::Sample, 20250101, 4);
        assert!(matches!(
            DiffEngine::open(store.clone(), DatasetKind::Sample, 20250101),
            Err(DiffError::DateNotNewer { .. })
        ));
        assert!(matches!(
            DiffEngine::open(store, DatasetKind::Sample, 20241231),
            Err(DiffError::DateNotNewer { .. })
        ));
    }

    #[test]
    fn test_classification_and_reporting() {
        let store = built_store(&[(1, "A"), (2, "B"), (3, "C")], 20250101);
        let mut engine = DiffEngine::open(store, DatasetKind::Sample, 20250201).unwrap();

        let next: String = [record(1, "A"), record(2, "B2"), record(4, "D")].concat();
        let mut body = Vec::new();
        let seen = engine.compare(&mut extractor_over(next), &mut body).unwrap();
        assert_eq!(seen, 3);

        let expected_body = format!("{}\n{}\n", record(2, "B2"), record(4, "D"));
        assert_eq!(body, expected_body.into_bytes());

        let mut list = Vec::new();
        let summary = engine.write_status(&mut list).unwrap();
        assert_eq!(
            summary,
            DiffSummary {
                added: 1,
                changed: 1,
                deleted: 1
            }
        );
        assert_eq!(String::from_utf8(list).unwrap(), "CHANGE\t2\nDELETE\t3\nADD\t4\n");
    }

    #[test]
    fn test_unchanged_pass_is_silent() {
        let records = [(1, "A"), (2, "B"), (3, "C")];
        let store = built_store(&records, 20250101);
        let mut engine = DiffEngine::open(store, DatasetKind::Sample, 20250201).unwrap();

        let same: String = records.iter().map(|&(id, c)| record(id, c)).collect();
        let mut body = Vec::new();
        engine.compare(&mut extractor_over(same), &mut body).unwrap();
        assert!(body.is_empty());

        let mut list = Vec::new();
        let summary = engine.write_status(&mut list).unwrap();
        assert!(summary.is_empty());
        assert!(list.is_empty());
    }

    #[test]
    fn test_compare_grows_store_for_new_ids() {
        let store = built_store(&[(1, "A")], 20250101);
        let before = store.capacity();
        let mut engine = DiffEngine::open(store, DatasetKind::Sample, 20250201).unwrap();

        let next = format!("{}{}", record(1, "A"), record(5000, "E"));
        let mut body = Vec::new();
        engine.compare(&mut extractor_over(next), &mut body).unwrap();

        assert!(engine.store().capacity() > before);
        assert_eq!(engine.store().status(5000), Status::Added);
    }

    #[test]
    fn test_commit_readies_next_round() {
        let store = built_store(&[(1, "A"), (2, "B"), (3, "C")], 20250101);
        let mut engine = DiffEngine::open(store, DatasetKind::Sample, 20250201).unwrap();

        let next: String = [record(1, "A"), record(2, "B2"), record(4, "D")].concat();
        engine
            .compare(&mut extractor_over(next), &mut Vec::new())
            .unwrap();

        let mut store = engine.into_store();
        store.commit(20250201);

        assert_eq!(store.as_of_date(), 20250201);
        // Deleted: cleared entirely.
        assert_eq!(store.status(3), Status::Empty);
        assert!(store.get(3).is_zero());
        // Everything seen this round is present for the next one.
        for id in [1, 2, 4] {
            assert_eq!(store.status(id), Status::Stale);
            assert!(!store.get(id).is_zero());
        }
    }
}
