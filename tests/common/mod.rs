//! Shared test fixtures
//!
//! An in-memory table server speaking the wire protocol over an
//! in-process `Read + Write` stream. Every stream handed out by one
//! [`MockServer`] sees the same store; grants are per stream.
//!
//! Records are kept in one ordered map keyed by
//! (db, unit, table, row, space, column), so dumps walk units in order
//! and scans walk the columns of a row in order. Scored records live in
//! space 2 and are mirrored into the score index (space 1), whose column
//! is the order-preserving score encoding followed by the column key.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tablekv::protocol::{
    decode_head, decode_packet, encode_to_vec, CommandType, KeyValueCtrl, PkgDumpReq,
    PkgDumpResp, PkgHead, PkgMultiOp, PkgOneOp, PkgScanReq, PkgScanResp, Status,
    COL_SPACE_SCORED, COL_SPACE_SCORE_INDEX, CTRL_ERR_CODE, HEAD_SIZE,
};
use tablekv::{Client, Config};

/// Table id the server refuses to serve
pub const RESERVED_TABLE: u8 = 255;

const SERVER_MAX_SCAN_NUM: u16 = 10_000;
const DEFAULT_DUMP_LIMIT: usize = 64;

/// Misbehavior applied to the next reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reply carries the next sequence number
    WrongSeq,
    /// Reply carries another command code
    WrongCmd,
    /// Reply declares a length shorter than its header
    BadLength,
    /// No reply at all
    NoReply,
    /// Items of a multi-item reply come back reversed
    ReverseItems,
    /// Last item of a multi-item reply is dropped
    DropItem,
    /// Every item of a multi-item reply carries this status code
    ItemStatus(i8),
}

/// Unit a row is stored in
pub fn unit_of(table_id: u8, row_key: &[u8]) -> u16 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[table_id]);
    hasher.update(row_key);
    (hasher.finalize() % 65536) as u16
}

fn index_col(score: i64, col_key: &[u8]) -> Vec<u8> {
    let mut col = ((score as u64) ^ (1 << 63)).to_be_bytes().to_vec();
    col.extend_from_slice(col_key);
    col
}

fn split_index_col(raw: &[u8]) -> (i64, Vec<u8>) {
    let mut score = [0u8; 8];
    score.copy_from_slice(&raw[..8]);
    let score = (u64::from_be_bytes(score) ^ (1 << 63)) as i64;
    (score, raw[8..].to_vec())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RawKey {
    db: u8,
    unit: u16,
    table: u8,
    row: Vec<u8>,
    space: u8,
    col: Vec<u8>,
}

impl RawKey {
    fn of(db: u8, kv: &KeyValueCtrl) -> Self {
        let col = if kv.col_space == COL_SPACE_SCORE_INDEX {
            index_col(kv.score, &kv.col_key)
        } else {
            kv.col_key.clone()
        };
        Self {
            db,
            unit: unit_of(kv.table_id, &kv.row_key),
            table: kv.table_id,
            row: kv.row_key.clone(),
            space: kv.col_space,
            col,
        }
    }

    fn index(&self, score: i64) -> Self {
        Self {
            space: COL_SPACE_SCORE_INDEX,
            col: index_col(score, &self.col),
            ..self.clone()
        }
    }

    fn record(&self, entry: &Entry) -> KeyValueCtrl {
        let (score, col) = if self.space == COL_SPACE_SCORE_INDEX {
            split_index_col(&self.col)
        } else {
            (entry.score, self.col.clone())
        };
        KeyValueCtrl::new(self.table, self.row.clone(), col)
            .with_col_space(self.space)
            .with_value(entry.value.clone())
            .with_score(score)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    score: i64,
    cas: u32,
}

enum Reply {
    One(PkgOneOp),
    Multi(PkgMultiOp),
    Scan(PkgScanResp),
    Dump(PkgDumpResp),
}

impl Reply {
    fn items_mut(&mut self) -> Option<&mut Vec<KeyValueCtrl>> {
        match self {
            Reply::One(_) => None,
            Reply::Multi(p) => Some(&mut p.kvs),
            Reply::Scan(p) => Some(&mut p.multi.kvs),
            Reply::Dump(p) => Some(&mut p.multi.kvs),
        }
    }

    fn encode(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            Reply::One(p) => encode_to_vec(p),
            Reply::Multi(p) => encode_to_vec(p),
            Reply::Scan(p) => encode_to_vec(p),
            Reply::Dump(p) => encode_to_vec(p),
        };
        bytes.ok()
    }
}

struct State {
    store: BTreeMap<RawKey, Entry>,
    next_cas: u32,
    passwords: HashMap<u8, String>,
    replica: bool,
    dump_limit: usize,
    faults: VecDeque<Fault>,
    requests: Vec<Vec<u8>>,
}

impl State {
    fn fresh_cas(&mut self) -> u32 {
        self.next_cas = self.next_cas.wrapping_add(1).max(1);
        self.next_cas
    }

    fn allowed(&self, grants: &HashSet<u8>, db: u8) -> bool {
        !self.passwords.contains_key(&db) || grants.contains(&db) || grants.contains(&255)
    }

    fn handle(&mut self, grants: &mut HashSet<u8>, packet: &[u8]) -> Option<Vec<u8>> {
        self.requests.push(packet.to_vec());
        let fault = self.faults.pop_front();
        let head = decode_head(packet).ok()?;

        let mut reply = match CommandType::from_code(head.cmd) {
            Some(CommandType::Scan) => Reply::Scan(self.scan(grants, decode_packet(packet).ok()?)),
            Some(CommandType::Dump) => Reply::Dump(self.dump(grants, decode_packet(packet).ok()?)),
            Some(
                cmd @ (CommandType::MGet
                | CommandType::MSet
                | CommandType::MDel
                | CommandType::MIncr),
            ) => Reply::Multi(self.multi(grants, cmd, decode_packet(packet).ok()?)),
            Some(cmd) => Reply::One(self.one(grants, cmd, decode_packet(packet).ok()?)),
            None => Reply::One(PkgOneOp {
                head,
                kv: KeyValueCtrl::default().with_err_code(Status::UnknownCmd.code()),
            }),
        };

        if let Some(items) = reply.items_mut() {
            match fault {
                Some(Fault::ReverseItems) => items.reverse(),
                Some(Fault::DropItem) => {
                    items.pop();
                }
                Some(Fault::ItemStatus(code)) => {
                    for item in items.iter_mut() {
                        item.ctrl_flag |= CTRL_ERR_CODE;
                        item.err_code = code;
                    }
                }
                _ => {}
            }
        }

        let mut bytes = reply.encode()?;
        match fault {
            Some(Fault::WrongSeq) => {
                let seq = head.seq.wrapping_add(1);
                bytes[2..10].copy_from_slice(&seq.to_be_bytes());
            }
            Some(Fault::WrongCmd) => bytes[0] = bytes[0].wrapping_add(1),
            Some(Fault::BadLength) => bytes[10..14].copy_from_slice(&5u32.to_be_bytes()),
            Some(Fault::NoReply) => return None,
            _ => {}
        }
        Some(bytes)
    }

    // -------------------------------------------------------------------------
    // Single and batch operations
    // -------------------------------------------------------------------------

    fn one(&mut self, grants: &mut HashSet<u8>, cmd: CommandType, req: PkgOneOp) -> PkgOneOp {
        let db = req.head.db_id;
        let kv = match cmd {
            CommandType::Ping => KeyValueCtrl::default(),
            CommandType::Auth => {
                let ok = match self.passwords.get(&db) {
                    Some(password) => password.as_bytes() == req.kv.col_key.as_slice(),
                    None => true,
                };
                if ok {
                    grants.insert(db);
                    KeyValueCtrl::default()
                } else {
                    KeyValueCtrl::default().with_err_code(Status::AuthFailed.code())
                }
            }
            _ if !self.allowed(grants, db) => {
                echo(&req.kv).with_err_code(Status::NoPrivilege.code())
            }
            _ => self.apply(cmd, db, &req.kv),
        };
        PkgOneOp { head: req.head, kv }
    }

    fn multi(&mut self, grants: &HashSet<u8>, cmd: CommandType, req: PkgMultiOp) -> PkgMultiOp {
        let db = req.head.db_id;
        if !self.allowed(grants, db) {
            return PkgMultiOp {
                head: req.head,
                err_code: Status::NoPrivilege.code(),
                kvs: Vec::new(),
            };
        }
        let kvs = req.kvs.iter().map(|kv| self.apply(cmd, db, kv)).collect();
        PkgMultiOp {
            head: req.head,
            err_code: 0,
            kvs,
        }
    }

    fn apply(&mut self, cmd: CommandType, db: u8, kv: &KeyValueCtrl) -> KeyValueCtrl {
        if kv.table_id == RESERVED_TABLE {
            return echo(kv).with_err_code(Status::NoPrivilege.code());
        }
        match cmd {
            CommandType::Get | CommandType::MGet => self.get(db, kv),
            CommandType::Set | CommandType::MSet => self.set(db, kv),
            CommandType::Del | CommandType::MDel => self.del(db, kv),
            CommandType::Incr | CommandType::MIncr => self.incr(db, kv),
            _ => echo(kv).with_err_code(Status::UnknownCmd.code()),
        }
    }

    fn get(&mut self, db: u8, kv: &KeyValueCtrl) -> KeyValueCtrl {
        if kv.cas != 0 && self.replica {
            return echo(kv).with_err_code(Status::SlaveCas.code());
        }
        let token = if kv.cas == 2 { self.fresh_cas() } else { 0 };
        match self.store.get_mut(&RawKey::of(db, kv)) {
            None => echo(kv).with_err_code(Status::NotExist.code()),
            Some(entry) => {
                if token != 0 {
                    entry.cas = token;
                }
                echo(kv)
                    .with_err_code(Status::Ok.code())
                    .with_value(entry.value.clone())
                    .with_score(entry.score)
                    .with_cas(token)
            }
        }
    }

    /// Status of the CAS precondition for a write, `None` when it holds
    fn check_write(&self, db: u8, kv: &KeyValueCtrl) -> Option<Status> {
        if self.replica {
            return Some(Status::WriteSlave);
        }
        if kv.cas != 0 {
            match self.store.get(&RawKey::of(db, kv)) {
                Some(entry) if entry.cas == kv.cas => {}
                _ => return Some(Status::CasNotMatch),
            }
        }
        None
    }

    fn put(&mut self, key: RawKey, value: Vec<u8>, score: i64) {
        self.remove(&key);
        let entry = Entry {
            value,
            score,
            cas: self.fresh_cas(),
        };
        if key.space == COL_SPACE_SCORED {
            self.store.insert(key.index(score), entry.clone());
        }
        self.store.insert(key, entry);
    }

    fn remove(&mut self, key: &RawKey) -> Option<Entry> {
        let entry = self.store.remove(key)?;
        if key.space == COL_SPACE_SCORED {
            self.store.remove(&key.index(entry.score));
        }
        Some(entry)
    }

    fn set(&mut self, db: u8, kv: &KeyValueCtrl) -> KeyValueCtrl {
        if let Some(status) = self.check_write(db, kv) {
            return echo(kv).with_err_code(status.code());
        }
        self.put(RawKey::of(db, kv), kv.value.clone(), kv.score);
        echo(kv).with_err_code(Status::Ok.code())
    }

    fn del(&mut self, db: u8, kv: &KeyValueCtrl) -> KeyValueCtrl {
        if let Some(status) = self.check_write(db, kv) {
            return echo(kv).with_err_code(status.code());
        }
        let status = match self.remove(&RawKey::of(db, kv)) {
            Some(_) => Status::Ok,
            None => Status::NotExist,
        };
        echo(kv).with_err_code(status.code())
    }

    fn incr(&mut self, db: u8, kv: &KeyValueCtrl) -> KeyValueCtrl {
        if let Some(status) = self.check_write(db, kv) {
            return echo(kv).with_err_code(status.code());
        }
        let key = RawKey::of(db, kv);
        let (value, score) = match self.store.get(&key) {
            Some(entry) => (entry.value.clone(), entry.score.wrapping_add(kv.score)),
            None => (Vec::new(), kv.score),
        };
        self.put(key, value.clone(), score);
        echo(kv)
            .with_err_code(Status::Ok.code())
            .with_value(value)
            .with_score(score)
    }

    // -------------------------------------------------------------------------
    // Scan and dump
    // -------------------------------------------------------------------------

    fn scan(&mut self, grants: &HashSet<u8>, req: PkgScanReq) -> PkgScanResp {
        let db = req.op.head.db_id;
        let kv = &req.op.kv;
        let mut resp = PkgScanResp {
            multi: PkgMultiOp {
                head: req.op.head,
                err_code: 0,
                kvs: Vec::new(),
            },
            direction: req.direction,
            start: req.start,
            end: 0,
        };

        let refused = if !self.allowed(grants, db) || kv.table_id == RESERVED_TABLE {
            Some(Status::NoPrivilege)
        } else if req.num == 0 || req.num > SERVER_MAX_SCAN_NUM {
            Some(Status::InvScanNum)
        } else {
            None
        };
        if let Some(status) = refused {
            resp.multi.err_code = status.code();
            return resp;
        }

        let asc = req.direction == 0;
        let pivot = RawKey::of(db, kv);
        let mut matches: Vec<(&RawKey, &Entry)> = self
            .store
            .iter()
            .filter(|(k, _)| {
                k.db == db && k.table == kv.table_id && k.row == kv.row_key && k.space == kv.col_space
            })
            .filter(|(k, _)| {
                req.start == 1 || (asc && k.col > pivot.col) || (!asc && k.col < pivot.col)
            })
            .collect();
        if !asc {
            matches.reverse();
        }

        let num = req.num as usize;
        resp.end = u8::from(matches.len() <= num);
        resp.multi.kvs = matches
            .into_iter()
            .take(num)
            .map(|(k, e)| k.record(e))
            .collect();
        resp
    }

    fn dump(&mut self, grants: &HashSet<u8>, req: PkgDumpReq) -> PkgDumpResp {
        let db = req.op.head.db_id;
        let kv = &req.op.kv;
        let one_table = req.one_table != 0;
        let mut resp = PkgDumpResp {
            multi: PkgMultiOp {
                head: req.op.head,
                err_code: 0,
                kvs: Vec::new(),
            },
            one_table: req.one_table,
            start_unit: req.start_unit,
            end_unit: req.end_unit,
            last_unit: req.end_unit,
            unit_start: 1,
            end: 1,
        };

        if !self.allowed(grants, db) || (one_table && kv.table_id == RESERVED_TABLE) {
            resp.multi.err_code = Status::NoPrivilege.code();
            return resp;
        }

        let pivot = (req.after_pivot != 0).then(|| RawKey {
            unit: req.resume_unit,
            ..RawKey::of(db, kv)
        });
        let items: Vec<(&RawKey, &Entry)> = self
            .store
            .iter()
            .filter(|(k, _)| {
                k.db == db
                    && k.unit >= req.resume_unit
                    && k.unit <= req.end_unit
                    && (!one_table || k.table == kv.table_id)
            })
            .filter(|(k, _)| pivot.as_ref().map_or(true, |p| *k > p))
            .collect();

        let Some((first, _)) = items.first() else {
            return resp;
        };
        let unit = first.unit;
        let in_unit = items.iter().take_while(|(k, _)| k.unit == unit).count();
        let taken = in_unit.min(self.dump_limit);

        resp.multi.kvs = items[..taken].iter().map(|(k, e)| k.record(e)).collect();
        if taken < in_unit {
            resp.last_unit = unit;
            resp.unit_start = 0;
            resp.end = 0;
        } else if taken < items.len() {
            resp.last_unit = unit;
            resp.end = 0;
        }
        resp
    }
}

fn echo(kv: &KeyValueCtrl) -> KeyValueCtrl {
    KeyValueCtrl::new(kv.table_id, kv.row_key.clone(), kv.col_key.clone())
        .with_col_space(kv.col_space)
}

/// Handle to the shared in-memory server
#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<State>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                store: BTreeMap::new(),
                next_cas: 0,
                passwords: HashMap::new(),
                replica: false,
                dump_limit: DEFAULT_DUMP_LIMIT,
                faults: VecDeque::new(),
                requests: Vec::new(),
            })),
        }
    }

    /// Require `auth(db_id, password)` before serving `db_id`
    pub fn with_password(self, db_id: u8, password: &str) -> Self {
        self.state.lock().passwords.insert(db_id, password.to_string());
        self
    }

    /// Serve as a read-only replica
    pub fn replica(self) -> Self {
        self.state.lock().replica = true;
        self
    }

    /// Records returned per dump call at most
    pub fn dump_limit(self, limit: usize) -> Self {
        self.state.lock().dump_limit = limit;
        self
    }

    /// Misbehave on the next request
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    pub fn stream(&self) -> MockStream {
        MockStream {
            state: Arc::clone(&self.state),
            grants: HashSet::new(),
            input: Vec::new(),
            output: VecDeque::new(),
        }
    }

    pub fn client(&self) -> Client<MockStream> {
        self.client_with(Config::default())
    }

    pub fn client_with(&self, config: Config) -> Client<MockStream> {
        Client::from_stream(self.stream(), config).expect("client over mock stream")
    }

    /// Raw request packets received so far, in order
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<Vec<u8>> {
        self.state.lock().requests.last().cloned()
    }

    /// Stored records, score index entries excluded
    pub fn record_count(&self) -> usize {
        self.state
            .lock()
            .store
            .keys()
            .filter(|k| k.space != COL_SPACE_SCORE_INDEX)
            .count()
    }
}

/// One client connection to a [`MockServer`]
pub struct MockStream {
    state: Arc<Mutex<State>>,
    grants: HashSet<u8>,
    input: Vec<u8>,
    output: VecDeque<u8>,
}

impl MockStream {
    fn process(&mut self) {
        while self.input.len() >= HEAD_SIZE {
            let mut len = [0u8; 4];
            len.copy_from_slice(&self.input[10..14]);
            let len = u32::from_be_bytes(len) as usize;
            if len < HEAD_SIZE {
                self.input.clear();
                return;
            }
            if self.input.len() < len {
                return;
            }

            let packet: Vec<u8> = self.input.drain(..len).collect();
            let reply = self.state.lock().handle(&mut self.grants, &packet);
            if let Some(reply) = reply {
                self.output.extend(reply);
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.input.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.output.len());
        for (dst, src) in buf.iter_mut().zip(self.output.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

/// Header of a raw request packet
pub fn request_head(packet: &[u8]) -> PkgHead {
    decode_head(packet).expect("request header")
}
