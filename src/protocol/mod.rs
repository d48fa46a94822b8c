//! Protocol Module
//!
//! Defines the wire protocol spoken between client and server.
//!
//! ## Packet Format
//!
//! ```text
//! ┌──────────┬──────────┬──────────────┬────────────────┬──────────────┐
//! │ Cmd (1)  │ DbId (1) │   Seq (8)    │  PkgLen (4)    │  Body ...    │
//! └──────────┴──────────┴──────────────┴────────────────┴──────────────┘
//! ```
//!
//! ### Commands
//! - 0x09: AUTH   0x10: PING
//! - 0x11: GET    0x12: MGET   0x13: SCAN   0x14: DUMP
//! - 0x60: SET    0x61: MSET   0x62: DEL    0x63: MDEL
//! - 0x64: INCR   0x65: MINCR
//!
//! ### Status Codes
//! - 0: OK, 1: NOT_EXIST
//! - negative: failures, see [`Status`]

mod command;
mod packet;
mod status;
mod codec;

pub use command::{
    ColumnSpace, CommandType, COL_SPACE_DEFAULT, COL_SPACE_SCORED, COL_SPACE_SCORE_INDEX,
};
pub use packet::{
    KeyValueCtrl, PkgDumpReq, PkgDumpResp, PkgHead, PkgMultiOp, PkgOneOp, PkgScanReq,
    PkgScanResp, CTRL_CAS, CTRL_COL_SPACE, CTRL_ERR_CODE, CTRL_SCORE, CTRL_VALUE,
};
pub use status::{ErrorClass, Status};
pub use codec::{
    check_pkg_len, decode_head, decode_packet, decode_status, encode_head, encode_packet,
    encode_to_vec, read_packet, write_packet, Packet, HEAD_SIZE, MAX_COL_KEY_LEN, MAX_ITEMS,
    MAX_PKG_LEN, MAX_ROW_KEY_LEN, MAX_VALUE_LEN,
};

/// Highest shard unit id
pub const MAX_UNIT_ID: u16 = u16::MAX;

/// Database id reserved for administrative authentication
pub const ADMIN_DB_ID: u8 = 255;
