//! Command definitions
//!
//! Command codes and column spaces as they appear on the wire.

use serde::{Deserialize, Serialize};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Auth = 0x09,
    Ping = 0x10,
    Get = 0x11,
    MGet = 0x12,
    Scan = 0x13,
    Dump = 0x14,
    Set = 0x60,
    MSet = 0x61,
    Del = 0x62,
    MDel = 0x63,
    Incr = 0x64,
    MIncr = 0x65,
}

impl CommandType {
    pub fn from_code(code: u8) -> Option<CommandType> {
        let cmd = match code {
            0x09 => CommandType::Auth,
            0x10 => CommandType::Ping,
            0x11 => CommandType::Get,
            0x12 => CommandType::MGet,
            0x13 => CommandType::Scan,
            0x14 => CommandType::Dump,
            0x60 => CommandType::Set,
            0x61 => CommandType::MSet,
            0x62 => CommandType::Del,
            0x63 => CommandType::MDel,
            0x64 => CommandType::Incr,
            0x65 => CommandType::MIncr,
            _ => return None,
        };
        Some(cmd)
    }

    /// Write commands must be sent to the primary replica
    pub fn is_write(self) -> bool {
        (self as u8) >= 0x60
    }
}

/// Wire value: default column space
pub const COL_SPACE_DEFAULT: u8 = 0;
/// Wire value: scored index, rowKey+score+colKey => value
pub const COL_SPACE_SCORE_INDEX: u8 = 1;
/// Wire value: scored space, rowKey+colKey => score+value
pub const COL_SPACE_SCORED: u8 = 2;

/// The two column spaces a caller can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnSpace {
    /// Columns ordered by column key
    Plain,

    /// "Z" columns, ordered by (score, column key) or by column key
    Scored,
}

impl ColumnSpace {
    /// Wire value for point operations in this space
    pub fn wire(self) -> u8 {
        match self {
            ColumnSpace::Plain => COL_SPACE_DEFAULT,
            ColumnSpace::Scored => COL_SPACE_SCORED,
        }
    }

    /// Map a raw wire value back; the score index folds into `Scored`
    pub fn from_wire(raw: u8) -> Option<ColumnSpace> {
        match raw {
            COL_SPACE_DEFAULT => Some(ColumnSpace::Plain),
            COL_SPACE_SCORE_INDEX | COL_SPACE_SCORED => Some(ColumnSpace::Scored),
            _ => None,
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, ColumnSpace::Scored)
    }
}
