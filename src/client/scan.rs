//! Scan Cursor Engine
//!
//! Pages through the columns of one row. Each page answers at most `num`
//! records strictly after the pivot in the requested direction; the next
//! page continues from the last record of the previous one.
//!
//! ## Ordering
//! - plain space: by column key
//! - scored space: by column key, or by (score, column key) when
//!   `order_by_score` is set

use std::cmp::Ordering;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::args::{check_record_status, validate_row_key};
use super::Client;
use crate::error::{Result, TableError, ValidationError};
use crate::protocol::{
    decode_status, ColumnSpace, CommandType, KeyValueCtrl, PkgHead, PkgOneOp, PkgScanReq,
    PkgScanResp, COL_SPACE_SCORE_INDEX,
};

const SCAN_ASC: u8 = 0;
const SCAN_DESC: u8 = 1;

/// Where the first page begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStart {
    /// The smallest key when ascending, the largest when descending
    Edge,

    /// Strictly after this column (and score, when ordering by score)
    Pivot { col_key: Vec<u8>, score: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanArgs {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub space: ColumnSpace,
    pub asc: bool,
    /// Only meaningful in the scored space
    pub order_by_score: bool,
    pub start: ScanStart,
    /// Page size, 1..=`Config::max_scan_num`
    pub num: i32,
}

impl ScanArgs {
    /// Ascending scan of the plain space from the first column
    pub fn new(table_id: u8, row_key: impl Into<Vec<u8>>, num: i32) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            space: ColumnSpace::Plain,
            asc: true,
            order_by_score: false,
            start: ScanStart::Edge,
            num,
        }
    }

    /// Scan the scored space, ordered by score when `order_by_score`
    pub fn scored(mut self, order_by_score: bool) -> Self {
        self.space = ColumnSpace::Scored;
        self.order_by_score = order_by_score;
        self
    }

    pub fn desc(mut self) -> Self {
        self.asc = false;
        self
    }

    pub fn start_after(mut self, col_key: impl Into<Vec<u8>>, score: i64) -> Self {
        self.start = ScanStart::Pivot {
            col_key: col_key.into(),
            score,
        };
        self
    }
}

/// One column returned by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
}

/// Continuation state of a scan, only obtainable from a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanToken {
    table_id: u8,
    row_key: Vec<u8>,
    space: ColumnSpace,
    asc: bool,
    order_by_score: bool,
    num: u16,
    pivot: Option<(Vec<u8>, i64)>,
}

impl ScanToken {
    fn wire_space(&self) -> u8 {
        if self.space.is_scored() && self.order_by_score {
            COL_SPACE_SCORE_INDEX
        } else {
            self.space.wire()
        }
    }

    /// Order of two (column, score) keys in this scan's sort order
    fn compare(&self, a: (&[u8], i64), b: (&[u8], i64)) -> Ordering {
        let ord = if self.order_by_score {
            a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0))
        } else {
            a.0.cmp(b.0)
        };
        if self.asc {
            ord
        } else {
            ord.reverse()
        }
    }

    fn request(&self, db_id: u8) -> PkgScanReq {
        let mut kv = KeyValueCtrl::new(self.table_id, self.row_key.clone(), Vec::new())
            .with_col_space(self.wire_space());
        if let Some((col_key, score)) = &self.pivot {
            kv.col_key = col_key.clone();
            if self.order_by_score {
                kv = kv.with_score(*score);
            }
        }

        PkgScanReq {
            op: PkgOneOp {
                head: PkgHead::new(CommandType::Scan, db_id),
                kv,
            },
            direction: if self.asc { SCAN_ASC } else { SCAN_DESC },
            start: u8::from(self.pivot.is_none()),
            num: self.num,
        }
    }

    /// Check one page against this request; returns the next pivot
    fn check_page(&self, reply: &PkgScanResp) -> Result<Option<(Vec<u8>, i64)>> {
        let kvs = &reply.multi.kvs;
        if kvs.len() > self.num as usize {
            return Err(TableError::Decode(format!(
                "scan page of {} records exceeds {}",
                kvs.len(),
                self.num
            )));
        }

        let mut prev = self.pivot.as_ref().map(|(c, s)| (c.as_slice(), *s));
        for kv in kvs {
            check_record_status(kv)?;
            if kv.table_id != self.table_id || kv.row_key != self.row_key {
                return Err(TableError::Decode(
                    "scan record outside the requested row".to_string(),
                ));
            }
            let key = (kv.col_key.as_slice(), kv.score);
            if let Some(prev) = prev {
                if self.compare(prev, key) != Ordering::Less {
                    return Err(TableError::Decode(
                        "scan records out of order".to_string(),
                    ));
                }
            }
            prev = Some(key);
        }

        Ok(match kvs.last() {
            Some(last) => Some((last.col_key.clone(), last.score)),
            None => self.pivot.clone(),
        })
    }
}

/// One page of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReply {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub kvs: Vec<ScanRecord>,
    /// Nothing left in this direction
    pub end: bool,
    pub token: ScanToken,
}

impl<S: Read + Write> Client<S> {
    /// Fetch the first page
    pub fn scan(&mut self, args: &ScanArgs) -> Result<ScanReply> {
        self.ensure_open()?;
        validate_row_key(&args.row_key)?;
        let max = self.config.max_scan_num;
        if args.num < 1 || args.num > i32::from(max) {
            return Err(ValidationError::ScanNum {
                num: i64::from(args.num),
                max,
            }
            .into());
        }

        let pivot = match &args.start {
            ScanStart::Edge => None,
            ScanStart::Pivot { col_key, score } => Some((col_key.clone(), *score)),
        };
        let token = ScanToken {
            table_id: args.table_id,
            row_key: args.row_key.clone(),
            space: args.space,
            asc: args.asc,
            order_by_score: args.space.is_scored() && args.order_by_score,
            num: args.num as u16,
            pivot,
        };
        self.scan_page(token)
    }

    /// Fetch the page after `last`
    pub fn scan_more(&mut self, last: &ScanReply) -> Result<ScanReply> {
        if last.end {
            return Err(TableError::IterationEnded);
        }
        self.ensure_open()?;
        self.scan_page(last.token.clone())
    }

    fn scan_page(&mut self, mut token: ScanToken) -> Result<ScanReply> {
        let request = token.request(self.session.db_id());
        let reply: PkgScanResp = self.call(request)?;

        if reply.multi.err_code != 0 {
            let status = decode_status(reply.multi.err_code).map_err(|e| self.fail(e))?;
            return Err(TableError::Server(status));
        }
        token.pivot = token.check_page(&reply).map_err(|e| self.fail(e))?;

        let end = reply.end != 0;
        tracing::debug!(
            table = token.table_id,
            records = reply.multi.kvs.len(),
            end,
            "Scan page"
        );

        let kvs = reply
            .multi
            .kvs
            .into_iter()
            .map(|kv| ScanRecord {
                col_key: kv.col_key,
                value: kv.value,
                score: kv.score,
            })
            .collect();

        Ok(ScanReply {
            table_id: token.table_id,
            row_key: token.row_key.clone(),
            kvs,
            end,
            token,
        })
    }
}
