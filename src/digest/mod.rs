//! Internal fingerprint digest implementation.
//!
//! This module wraps the MD5 primitive behind the crate's [`Fingerprint`]
//! type. It is an implementation detail and not part of the public API.
//!
//! [`Fingerprint`]: crate::record::Fingerprint

mod md5;

pub(crate) use self::md5::Md5Digester;
