//! Status codes and their classification
//!
//! The numeric values are shared with every server and client
//! implementation and must not change.

/// Per-item status code carried in replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Status {
    NotExist = 1,
    Ok = 0,
    CasNotMatch = -1,
    TempFail = -2,
    UnknownCmd = -10,
    AuthFailed = -11,
    NoPrivilege = -12,
    WriteSlave = -13,
    SlaveCas = -14,
    ReadFail = -15,
    WriteFail = -16,
    DecodeFail = -17,
    InvDbId = -18,
    InvRowKey = -19,
    InvValue = -20,
    InvPkgLen = -21,
    InvScanNum = -22,
    ScanEnded = -23,
}

/// What a caller should do about a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Success,

    /// Informational: the key does not exist
    NotFound,

    /// CAS mismatch; re-read to get a fresh token, then retry
    ConcurrencyConflict,

    /// Safe to retry with backoff
    Transient,

    /// Fatal to the call (auth, privilege, replica write, unknown command,
    /// decode failure)
    Protocol,

    /// Caller bug; never retry
    Validation,

    /// Scan/dump already exhausted
    IterationEnded,
}

impl Status {
    const ALL: [Status; 18] = [
        Status::NotExist,
        Status::Ok,
        Status::CasNotMatch,
        Status::TempFail,
        Status::UnknownCmd,
        Status::AuthFailed,
        Status::NoPrivilege,
        Status::WriteSlave,
        Status::SlaveCas,
        Status::ReadFail,
        Status::WriteFail,
        Status::DecodeFail,
        Status::InvDbId,
        Status::InvRowKey,
        Status::InvValue,
        Status::InvPkgLen,
        Status::InvScanNum,
        Status::ScanEnded,
    ];

    /// Parse a wire code; `None` for codes outside the known set
    pub fn from_code(code: i8) -> Option<Status> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// The wire code
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn class(self) -> ErrorClass {
        match self {
            Status::Ok => ErrorClass::Success,
            Status::NotExist => ErrorClass::NotFound,
            Status::CasNotMatch => ErrorClass::ConcurrencyConflict,
            Status::TempFail | Status::ReadFail | Status::WriteFail => ErrorClass::Transient,
            Status::UnknownCmd
            | Status::AuthFailed
            | Status::NoPrivilege
            | Status::WriteSlave
            | Status::SlaveCas
            | Status::DecodeFail => ErrorClass::Protocol,
            Status::InvDbId
            | Status::InvRowKey
            | Status::InvValue
            | Status::InvPkgLen
            | Status::InvScanNum => ErrorClass::Validation,
            Status::ScanEnded => ErrorClass::IterationEnded,
        }
    }

    /// Negative codes are failures; `Ok` and `NotExist` are not
    pub fn is_failure(self) -> bool {
        self.code() < 0
    }
}

impl ErrorClass {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Transient | ErrorClass::ConcurrencyConflict)
    }
}
