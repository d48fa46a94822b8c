//! Packet definitions
//!
//! Plain data shapes for every request and reply. Encoding and decoding
//! live in `codec`.

use super::command::CommandType;

/// Ctrl flag: item carries an error code
pub const CTRL_ERR_CODE: u8 = 0x01;
/// Ctrl flag: item carries a CAS token
pub const CTRL_CAS: u8 = 0x02;
/// Ctrl flag: item carries a column space
pub const CTRL_COL_SPACE: u8 = 0x04;
/// Ctrl flag: item carries a value
pub const CTRL_VALUE: u8 = 0x08;
/// Ctrl flag: item carries a score
pub const CTRL_SCORE: u8 = 0x10;

/// Fixed packet header, present on every request and reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PkgHead {
    pub cmd: u8,
    pub db_id: u8,
    pub seq: u64,
    /// Total packet length including this header
    pub pkg_len: u32,
}

impl PkgHead {
    pub fn new(cmd: CommandType, db_id: u8) -> Self {
        Self {
            cmd: cmd as u8,
            db_id,
            seq: 0,
            pkg_len: 0,
        }
    }
}

/// One key/value item with its optional fields selected by `ctrl_flag`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyValueCtrl {
    pub ctrl_flag: u8,
    pub table_id: u8,
    pub err_code: i8,
    pub col_space: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
    pub cas: u32,
}

impl KeyValueCtrl {
    pub fn new(table_id: u8, row_key: impl Into<Vec<u8>>, col_key: impl Into<Vec<u8>>) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            col_key: col_key.into(),
            ..Default::default()
        }
    }

    pub fn with_err_code(mut self, err_code: i8) -> Self {
        self.ctrl_flag |= CTRL_ERR_CODE;
        self.err_code = err_code;
        self
    }

    /// Column space 0 is the default and is left off the wire
    pub fn with_col_space(mut self, col_space: u8) -> Self {
        if col_space != 0 {
            self.ctrl_flag |= CTRL_COL_SPACE;
        }
        self.col_space = col_space;
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.ctrl_flag |= CTRL_VALUE;
        self.value = value.into();
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.ctrl_flag |= CTRL_SCORE;
        self.score = score;
        self
    }

    /// CAS 0 means "no token" and is left off the wire
    pub fn with_cas(mut self, cas: u32) -> Self {
        if cas != 0 {
            self.ctrl_flag |= CTRL_CAS;
        }
        self.cas = cas;
        self
    }

    pub fn has(&self, flag: u8) -> bool {
        self.ctrl_flag & flag != 0
    }
}

/// Get, Set, Del, Incr, Auth, Ping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgOneOp {
    pub head: PkgHead,
    pub kv: KeyValueCtrl,
}

/// MGet, MSet, MDel, MIncr
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgMultiOp {
    pub head: PkgHead,
    /// Whole-packet error code (auth, privilege, ...)
    pub err_code: i8,
    pub kvs: Vec<KeyValueCtrl>,
}

/// Scan request: the item is the pivot record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgScanReq {
    pub op: PkgOneOp,
    /// 0: ascending, 1: descending
    pub direction: u8,
    /// 1: start from MIN/MAX and ignore the pivot
    pub start: u8,
    pub num: u16,
}

/// Scan reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgScanResp {
    pub multi: PkgMultiOp,
    pub direction: u8,
    pub start: u8,
    /// 1: nothing left in this direction
    pub end: u8,
}

/// Dump request: the item is the pivot record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgDumpReq {
    pub op: PkgOneOp,
    /// 1: only the item's table, 0: every table of the database
    pub one_table: u8,
    pub start_unit: u16,
    pub end_unit: u16,
    /// Unit this call starts in
    pub resume_unit: u16,
    /// 1: skip records up to and including the pivot inside `resume_unit`
    pub after_pivot: u8,
}

/// Dump reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PkgDumpResp {
    pub multi: PkgMultiOp,
    pub one_table: u8,
    pub start_unit: u16,
    pub end_unit: u16,
    /// Last unit the server looked at
    pub last_unit: u16,
    /// 1: `last_unit` is complete, continue at the next unit
    pub unit_start: u8,
    pub end: u8,
}
