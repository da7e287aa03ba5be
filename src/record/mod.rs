//! Record types.
//!
//! - [`RecordSpan`] - Location and ID of one record within a batch
//! - [`Record`] - Borrowed view of one record's bytes
//! - [`Fingerprint`] - 16-byte content fingerprint

mod fingerprint;
mod span;

pub use fingerprint::Fingerprint;
pub use span::{Record, RecordSpan};
