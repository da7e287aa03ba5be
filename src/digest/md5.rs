//! MD5-based record fingerprinting.

use md5::{Digest, Md5};

use crate::record::Fingerprint;

/// Computes 16-byte MD5 fingerprints of record bodies.
///
/// Records are digested whole from the batch buffer, so only a one-shot
/// interface is needed.
#[derive(Debug)]
pub struct Md5Digester;

impl Md5Digester {
    /// Fingerprints `data` in one shot.
    pub fn digest(data: &[u8]) -> Fingerprint {
        Fingerprint::new(Md5::digest(data).into())
    }
}
