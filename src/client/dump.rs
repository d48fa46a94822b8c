//! Dump Cursor Engine
//!
//! Walks every record of a database, or of one table, unit by unit over
//! an inclusive unit range. The server stops a call at a unit boundary or
//! when its page is full; the reply says which unit it looked at last and
//! whether that unit is complete.
//!
//! ## Resume Rules
//! - `unit_start` set: continue at the beginning of `last_unit + 1`
//! - otherwise: continue inside `last_unit`, after the last raw record
//!
//! The session constants (`one_table`, `start_unit`, `end_unit`) travel
//! unchanged on every call; the resume position travels in `resume_unit`,
//! `after_pivot` and the pivot item.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::args::{check_record_status, validate_row_key};
use super::Client;
use crate::error::{Result, TableError, ValidationError};
use crate::protocol::{
    decode_status, ColumnSpace, CommandType, KeyValueCtrl, PkgDumpReq, PkgDumpResp, PkgHead,
    PkgOneOp, COL_SPACE_SCORED, COL_SPACE_SCORE_INDEX, MAX_COL_KEY_LEN, MAX_UNIT_ID,
};

/// Raw position to start after, inside the first unit of the range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPivot {
    /// Raw column space, 0..=2
    pub space: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArgs {
    /// Restrict the dump to `table_id`
    pub one_table: bool,
    /// Dumped table, and the table of the pivot
    pub table_id: u8,
    pub start_unit: u16,
    pub end_unit: u16,
    pub pivot: Option<DumpPivot>,
}

impl DumpArgs {
    /// Every table over the full unit range
    pub fn db() -> Self {
        Self {
            one_table: false,
            table_id: 0,
            start_unit: 0,
            end_unit: MAX_UNIT_ID,
            pivot: None,
        }
    }

    /// One table over the full unit range
    pub fn table(table_id: u8) -> Self {
        Self {
            one_table: true,
            table_id,
            ..Self::db()
        }
    }

    pub fn units(mut self, start_unit: u16, end_unit: u16) -> Self {
        self.start_unit = start_unit;
        self.end_unit = end_unit;
        self
    }

    pub fn after(mut self, pivot: DumpPivot) -> Self {
        self.pivot = Some(pivot);
        self
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.start_unit > self.end_unit {
            return Err(ValidationError::UnitRange {
                start: self.start_unit,
                end: self.end_unit,
            });
        }
        if let Some(pivot) = &self.pivot {
            if pivot.space > COL_SPACE_SCORED {
                return Err(ValidationError::ColSpace(pivot.space));
            }
            validate_row_key(&pivot.row_key)?;
            if pivot.col_key.len() > MAX_COL_KEY_LEN {
                return Err(ValidationError::ColKeyLen(pivot.col_key.len()));
            }
        }
        Ok(())
    }
}

/// One dumped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpRecord {
    pub table_id: u8,
    pub space: ColumnSpace,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
}

/// Continuation state of a dump, only obtainable from a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpToken {
    one_table: bool,
    table_id: u8,
    start_unit: u16,
    end_unit: u16,
    /// Last unit the server looked at
    last_unit: u16,
    /// `last_unit` is complete
    unit_start: bool,
    /// Last raw record seen inside `last_unit`
    pivot: Option<KeyValueCtrl>,
}

impl DumpToken {
    fn from_args(args: &DumpArgs) -> Self {
        let pivot = args.pivot.as_ref().map(|p| {
            KeyValueCtrl::new(args.table_id, p.row_key.clone(), p.col_key.clone())
                .with_col_space(p.space)
                .with_score(p.score)
        });
        Self {
            one_table: args.one_table,
            table_id: args.table_id,
            start_unit: args.start_unit,
            end_unit: args.end_unit,
            last_unit: args.start_unit,
            unit_start: false,
            pivot,
        }
    }

    fn check(&self) -> Result<()> {
        if self.start_unit > self.end_unit {
            return Err(TableError::InvalidContinuation(format!(
                "unit range [{}, {}] is empty",
                self.start_unit, self.end_unit
            )));
        }
        if self.last_unit < self.start_unit || self.last_unit > self.end_unit {
            return Err(TableError::InvalidContinuation(format!(
                "last unit {} outside [{}, {}]",
                self.last_unit, self.start_unit, self.end_unit
            )));
        }
        if self.unit_start && self.last_unit == self.end_unit {
            return Err(TableError::InvalidContinuation(
                "unit range already exhausted".to_string(),
            ));
        }
        Ok(())
    }

    /// Unit the next call starts in
    fn resume_unit(&self) -> u16 {
        if self.unit_start {
            self.last_unit + 1
        } else {
            self.last_unit
        }
    }

    fn request(&self, db_id: u8) -> PkgDumpReq {
        let after_pivot = !self.unit_start && self.pivot.is_some();
        let kv = match &self.pivot {
            Some(pivot) if after_pivot => pivot.clone(),
            _ => KeyValueCtrl::new(self.table_id, Vec::new(), Vec::new()),
        };

        PkgDumpReq {
            op: PkgOneOp {
                head: PkgHead::new(CommandType::Dump, db_id),
                kv,
            },
            one_table: u8::from(self.one_table),
            start_unit: self.start_unit,
            end_unit: self.end_unit,
            resume_unit: self.resume_unit(),
            after_pivot: u8::from(after_pivot),
        }
    }

    /// Check a reply against this state and return the state after it
    fn advance(&self, reply: &PkgDumpResp) -> Result<DumpToken> {
        if reply.one_table != u8::from(self.one_table)
            || reply.start_unit != self.start_unit
            || reply.end_unit != self.end_unit
        {
            return Err(TableError::Decode(
                "dump reply does not echo the session constants".to_string(),
            ));
        }

        let resume = self.resume_unit();
        if reply.last_unit < resume || reply.last_unit > self.end_unit {
            return Err(TableError::Decode(format!(
                "dump reply last unit {} outside [{}, {}]",
                reply.last_unit, resume, self.end_unit
            )));
        }

        let kvs = &reply.multi.kvs;
        for kv in kvs {
            check_record_status(kv)?;
        }
        if self.one_table && kvs.iter().any(|kv| kv.table_id != self.table_id) {
            return Err(TableError::Decode(
                "dump reply contains another table".to_string(),
            ));
        }

        let unit_start = reply.unit_start != 0;
        let pivot = match kvs.last() {
            _ if unit_start => None,
            Some(last) => Some(
                KeyValueCtrl::new(last.table_id, last.row_key.clone(), last.col_key.clone())
                    .with_col_space(last.col_space)
                    .with_score(last.score),
            ),
            None if reply.last_unit == resume => self.pivot.clone().filter(|_| !self.unit_start),
            None => {
                return Err(TableError::Decode(format!(
                    "dump reply moved to unit {} without records",
                    reply.last_unit
                )))
            }
        };

        Ok(DumpToken {
            last_unit: reply.last_unit,
            unit_start,
            pivot,
            ..self.clone()
        })
    }
}

/// One page of a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReply {
    pub kvs: Vec<DumpRecord>,
    /// The whole range has been visited
    pub end: bool,
    pub token: DumpToken,
}

impl DumpReply {
    /// Last unit the server looked at
    pub fn last_unit(&self) -> u16 {
        self.token.last_unit
    }
}

impl<S: Read + Write> Client<S> {
    /// Dump starting after a raw position
    pub fn dump_pivot(&mut self, args: &DumpArgs) -> Result<DumpReply> {
        self.ensure_open()?;
        args.validate()?;
        self.dump_page(DumpToken::from_args(args))
    }

    /// Dump every table of the selected database
    pub fn dump_db(&mut self) -> Result<DumpReply> {
        self.dump_pivot(&DumpArgs::db())
    }

    /// Dump one table of the selected database
    pub fn dump_table(&mut self, table_id: u8) -> Result<DumpReply> {
        self.dump_pivot(&DumpArgs::table(table_id))
    }

    /// Fetch the page after `last`
    pub fn dump_more(&mut self, last: &DumpReply) -> Result<DumpReply> {
        if last.end {
            return Err(TableError::IterationEnded);
        }
        self.ensure_open()?;
        last.token.check()?;
        self.dump_page(last.token.clone())
    }

    fn dump_page(&mut self, token: DumpToken) -> Result<DumpReply> {
        let request = token.request(self.session.db_id());
        let reply: PkgDumpResp = self.call(request)?;

        if reply.multi.err_code != 0 {
            let status = decode_status(reply.multi.err_code).map_err(|e| self.fail(e))?;
            return Err(TableError::Server(status));
        }
        let next = token.advance(&reply).map_err(|e| self.fail(e))?;

        let end = reply.end != 0 || (next.unit_start && next.last_unit >= next.end_unit);
        tracing::debug!(
            last_unit = next.last_unit,
            unit_start = next.unit_start,
            records = reply.multi.kvs.len(),
            end,
            "Dump page"
        );

        let mut kvs = Vec::with_capacity(reply.multi.kvs.len());
        for kv in reply.multi.kvs {
            if kv.col_space == COL_SPACE_SCORE_INDEX {
                continue;
            }
            let space = match ColumnSpace::from_wire(kv.col_space) {
                Some(space) => space,
                None => {
                    return Err(self.fail(TableError::Decode(format!(
                        "dump record in unknown column space {}",
                        kv.col_space
                    ))))
                }
            };
            kvs.push(DumpRecord {
                table_id: kv.table_id,
                space,
                row_key: kv.row_key,
                col_key: kv.col_key,
                value: kv.value,
                score: kv.score,
            });
        }

        Ok(DumpReply {
            kvs,
            end,
            token: next,
        })
    }
}
