//! Record status flags.

/// The status of one store slot.
///
/// Between runs a slot is either `Empty` or `Stale` ("present as of the last
/// commit, not yet seen this round"). A diff round rewrites visited slots to
/// `Unchanged`, `Added`, or `Changed`; a slot still `Stale` after the round
/// was absent from the new stream and is therefore a deletion. Committing
/// collapses everything back to `Empty`/`Stale` for the next round:
///
/// | before commit          | after commit |
/// |------------------------|--------------|
/// | `Empty`                | `Empty`      |
/// | `Stale` (deleted)      | `Empty`      |
/// | `Unchanged`/`Added`/`Changed` | `Stale` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// No record known for this ID.
    Empty = 0,
    /// Present as of the last commit; not yet visited this round.
    Stale = 1,
    /// Visited this round with an identical fingerprint.
    Unchanged = 2,
    /// First seen this round.
    Added = 3,
    /// Visited this round with a different fingerprint.
    Changed = 4,
}

impl Status {
    /// Decodes a persisted flag byte.
    ///
    /// Returns `None` for values no run could have written.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Status::Empty),
            1 => Some(Status::Stale),
            2 => Some(Status::Unchanged),
            3 => Some(Status::Added),
            4 => Some(Status::Changed),
            _ => None,
        }
    }

    /// Returns the status this slot normalizes to at commit time.
    pub fn after_commit(self) -> Status {
        match self {
            Status::Empty | Status::Stale => Status::Empty,
            Status::Unchanged | Status::Added | Status::Changed => Status::Stale,
        }
    }
}
