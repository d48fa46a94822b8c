//! CAS Protocol
//!
//! Compare-and-swap tokens are opaque u32 values chosen by the server on
//! every mutation. 0 is "no token".
//!
//! ## Reads
//! - 0: read from any replica, no token
//! - 1: read from the primary, no token
//! - 2: read from the primary and obtain a fresh token
//!
//! A replica answers 1 and 2 with `Status::SlaveCas`.
//!
//! ## Writes
//! - 0: unconditional
//! - N: succeeds only while the stored token is N, otherwise
//!   `Status::CasNotMatch` and the record is untouched

use crate::error::ValidationError;
use crate::protocol::{KeyValueCtrl, Status};

/// No optimistic check
pub const NO_CAS: u32 = 0;

/// Read modes for the `cas` field of Get requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ReadCas {
    #[default]
    Any = 0,
    Primary = 1,
    PrimaryWithToken = 2,
}

impl ReadCas {
    pub fn from_raw(raw: u32) -> Result<ReadCas, ValidationError> {
        match raw {
            0 => Ok(ReadCas::Any),
            1 => Ok(ReadCas::Primary),
            2 => Ok(ReadCas::PrimaryWithToken),
            other => Err(ValidationError::ReadCas(other)),
        }
    }

    /// Whether the read must be served by the primary replica
    pub fn requires_primary(self) -> bool {
        !matches!(self, ReadCas::Any)
    }
}

impl From<ReadCas> for u32 {
    fn from(cas: ReadCas) -> u32 {
        cas as u32
    }
}

/// Attach a read mode to an outgoing item
pub(crate) fn read_request(kv: KeyValueCtrl, cas: u32) -> Result<KeyValueCtrl, ValidationError> {
    let mode = ReadCas::from_raw(cas)?;
    Ok(kv.with_cas(mode.into()))
}

/// Attach an expected token to an outgoing write item
pub(crate) fn write_request(kv: KeyValueCtrl, cas: u32) -> KeyValueCtrl {
    kv.with_cas(cas)
}

/// True when a write lost the race and the caller must re-read
pub fn is_conflict(status: Status) -> bool {
    status == Status::CasNotMatch
}
