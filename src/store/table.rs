//! The flat, ID-indexed fingerprint table and its on-disk format.
//!
//! Layout of a persisted store, all integers little-endian:
//!
//! ```text
//! tag[8]                    dataset kind, ASCII, NUL-padded
//! as_of_date  u32           YYYYMMDD of the last committed stream
//! capacity    u32           number of slots
//! flags[capacity]           one status byte per slot
//! fingerprints[16*capacity] one 16-byte fingerprint per slot
//! ```
//!
//! The record ID is the slot index: lookup and update are plain array
//! indexing, and capacity only ever grows (power-of-two steps, zero-filled).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::DatasetKind;
use crate::error::DiffError;
use crate::record::Fingerprint;
use crate::store::Status;

/// The persisted, ID-indexed table of fingerprints and status flags.
///
/// A store is exclusively owned by one build or diff run. It is read once at
/// startup and written once at the very end of a successful run; an aborted
/// run leaves the previous file untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintStore {
    kind: DatasetKind,
    as_of_date: u32,
    flags: Vec<Status>,
    fingerprints: Vec<u8>,
}

impl FingerprintStore {
    /// Creates an empty store with `capacity` slots.
    pub fn new(kind: DatasetKind, as_of_date: u32, capacity: u32) -> Self {
        Self {
            kind,
            as_of_date,
            flags: vec![Status::Empty; capacity as usize],
            fingerprints: vec![0u8; capacity as usize * Fingerprint::SIZE],
        }
    }

    /// Returns the dataset kind this store was built for.
    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    /// Returns the nominal date of the last committed stream.
    pub fn as_of_date(&self) -> u32 {
        self.as_of_date
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> u32 {
        self.flags.len() as u32
    }

    /// Grows the store to hold at least `min_capacity` slots.
    ///
    /// No-op if the store is already large enough. Otherwise the capacity is
    /// rounded up to the next power of two and the new slots are `Empty` with
    /// zero fingerprints. A store never shrinks.
    pub fn grow(&mut self, min_capacity: u32) {
        if min_capacity <= self.capacity() {
            return;
        }

        let new_capacity = min_capacity.checked_next_power_of_two().unwrap_or(u32::MAX);
        self.flags.resize(new_capacity as usize, Status::Empty);
        self.fingerprints
            .resize(new_capacity as usize * Fingerprint::SIZE, 0u8);
    }

    /// Stores `fingerprint` for `id` and marks the slot present (`Stale`).
    ///
    /// This is how a first-time build populates the store: after the build's
    /// save, every record is "present, not yet seen" for the next diff round.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.capacity()`; callers grow the store first.
    pub fn set(&mut self, id: u32, fingerprint: Fingerprint) {
        let at = id as usize * Fingerprint::SIZE;
        self.fingerprints[at..at + Fingerprint::SIZE].copy_from_slice(fingerprint.as_bytes());
        self.flags[id as usize] = Status::Stale;
    }

    /// Returns the fingerprint stored for `id` (zero if the slot is `Empty`).
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.capacity()`.
    pub fn get(&self, id: u32) -> Fingerprint {
        let at = id as usize * Fingerprint::SIZE;
        let mut bytes = [0u8; Fingerprint::SIZE];
        bytes.copy_from_slice(&self.fingerprints[at..at + Fingerprint::SIZE]);
        Fingerprint::new(bytes)
    }

    /// Returns the status of `id`'s slot.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.capacity()`.
    pub fn status(&self, id: u32) -> Status {
        self.flags[id as usize]
    }

    /// Rewrites the status of `id`'s slot, leaving the fingerprint alone.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.capacity()`.
    pub fn classify(&mut self, id: u32, status: Status) {
        self.flags[id as usize] = status;
    }

    /// Iterates over `(id, status)` for every slot, in ascending ID order.
    pub fn statuses(&self) -> impl Iterator<Item = (u32, Status)> + '_ {
        self.flags
            .iter()
            .enumerate()
            .map(|(id, &status)| (id as u32, status))
    }

    /// Normalizes every slot for the next round and stamps `new_date`.
    ///
    /// Slots still `Stale` were not seen this round: they are deletions, and
    /// their fingerprints are cleared along with the flag. Every visited slot
    /// becomes `Stale` ("present") for the next round.
    pub fn commit(&mut self, new_date: u32) {
        for (id, flag) in self.flags.iter_mut().enumerate() {
            if *flag == Status::Stale {
                let at = id * Fingerprint::SIZE;
                self.fingerprints[at..at + Fingerprint::SIZE].fill(0);
            }
            *flag = flag.after_commit();
        }
        self.as_of_date = new_date;
    }

    /// Serializes the store to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DiffError> {
        let mut out = BufWriter::new(File::create(path)?);

        out.write_all(&self.kind.store_tag())?;
        out.write_all(&self.as_of_date.to_le_bytes())?;
        out.write_all(&self.capacity().to_le_bytes())?;

        let flag_bytes: Vec<u8> = self.flags.iter().map(|&status| status as u8).collect();
        out.write_all(&flag_bytes)?;
        out.write_all(&self.fingerprints)?;

        out.flush()?;
        Ok(())
    }

    /// Commits the round under `new_date` and serializes the store to `path`.
    pub fn commit_and_save(&mut self, path: impl AsRef<Path>, new_date: u32) -> Result<(), DiffError> {
        self.commit(new_date);
        self.save(path)
    }

    /// Deserializes a store from `path`.
    ///
    /// # Errors
    ///
    /// - [`DiffError::TruncatedStore`] if any section reads short,
    /// - [`DiffError::UnknownDataset`] for an unrecognized 8-byte tag,
    /// - [`DiffError::CorruptStore`] for a flag byte no run could have written,
    /// - [`DiffError::Io`] for any other I/O failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DiffError> {
        let mut input = BufReader::new(File::open(path)?);

        let mut tag = [0u8; 8];
        read_section(&mut input, &mut tag)?;
        let kind = DatasetKind::from_store_tag(&tag).ok_or(DiffError::UnknownDataset { tag })?;

        let mut word = [0u8; 4];
        read_section(&mut input, &mut word)?;
        let as_of_date = u32::from_le_bytes(word);
        read_section(&mut input, &mut word)?;
        let capacity = u32::from_le_bytes(word);

        let mut flag_bytes = vec![0u8; capacity as usize];
        read_section(&mut input, &mut flag_bytes)?;
        let mut flags = Vec::with_capacity(capacity as usize);
        for byte in flag_bytes {
            flags.push(Status::from_u8(byte).ok_or(DiffError::CorruptStore {
                message: "flag byte outside the status range",
            })?);
        }

        let mut fingerprints = vec![0u8; capacity as usize * Fingerprint::SIZE];
        read_section(&mut input, &mut fingerprints)?;

        Ok(Self {
            kind,
            as_of_date,
            flags,
            fingerprints,
        })
    }
}

/// Reads an exact section, mapping a short read to the truncated-store error.
fn read_section<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), DiffError> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DiffError::TruncatedStore
        } else {
            DiffError::Io(e)
        }
    })
}
