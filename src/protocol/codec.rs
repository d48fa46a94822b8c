//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Header (every packet)
//! ```text
//! ┌──────────┬──────────┬──────────────┬────────────────┐
//! │ Cmd (1)  │ DbId (1) │   Seq (8)    │  PkgLen (4)    │
//! └──────────┴──────────┴──────────────┴────────────────┘
//! ```
//!
//! ### Item (KeyValueCtrl)
//! ```text
//! CtrlFlag(1) TableId(1) [ErrCode(1)] [ColSpace(1)]
//! RowKeyLen(1) RowKey ColKeyLen(2) ColKey
//! [ValueLen(4) Value] [Score(8)] [Cas(4)]
//! ```
//!
//! ### Packets
//! - OneOp:    Head + Item
//! - MultiOp:  Head + ErrCode(1) + Count(2) + Item[Count]
//! - ScanReq:  OneOp + Direction(1) + Start(1) + Num(2)
//! - ScanResp: MultiOp + Direction(1) + Start(1) + End(1)
//! - DumpReq:  OneOp + OneTable(1) + StartUnit(2) + EndUnit(2) + ResumeUnit(2) + AfterPivot(1)
//! - DumpResp: MultiOp + OneTable(1) + StartUnit(2) + EndUnit(2) + LastUnit(2) + UnitStart(1) + End(1)
//!
//! All integers are big-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::packet::*;
use super::status::Status;
use crate::error::{Result, TableError, ValidationError};

/// Header size: cmd (1) + db id (1) + seq (8) + pkg len (4)
pub const HEAD_SIZE: usize = 14;

/// Row keys are 1..=255 bytes
pub const MAX_ROW_KEY_LEN: usize = u8::MAX as usize;

/// Column keys are length-prefixed with a u16
pub const MAX_COL_KEY_LEN: usize = u16::MAX as usize;

/// Maximum value size (1 MB)
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Packets must be strictly smaller than this (2 MB)
pub const MAX_PKG_LEN: usize = 2 * 1024 * 1024;

/// Items per multi-op packet
pub const MAX_ITEMS: usize = u16::MAX as usize;

/// A packet that can be framed on the wire
pub trait Packet: Sized {
    fn head(&self) -> &PkgHead;

    fn head_mut(&mut self) -> &mut PkgHead;

    /// Exact encoded size including the header
    fn encoded_len(&self) -> usize;

    /// Write everything after the header
    fn encode_body(&self, buf: &mut BytesMut) -> Result<()>;

    /// Parse everything after the header, advancing `body`
    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self>;
}

// =============================================================================
// Packet Encoding/Decoding
// =============================================================================

/// Reject packets that would reach the 2 MB limit
pub fn check_pkg_len(len: usize) -> Result<()> {
    if len >= MAX_PKG_LEN {
        return Err(ValidationError::PkgLen(len).into());
    }
    Ok(())
}

/// Encode a packet into `buf`, filling in the header's length
pub fn encode_packet<P: Packet>(packet: &P, buf: &mut BytesMut) -> Result<()> {
    let len = packet.encoded_len();
    check_pkg_len(len)?;

    buf.clear();
    buf.reserve(len);

    let mut head = *packet.head();
    head.pkg_len = len as u32;
    encode_head(&head, buf);
    packet.encode_body(buf)?;

    if buf.len() != len {
        return Err(TableError::Decode(format!(
            "encoded {} bytes, expected {}",
            buf.len(),
            len
        )));
    }
    Ok(())
}

/// Encode a packet into a fresh vector
pub fn encode_to_vec<P: Packet>(packet: &P) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    encode_packet(packet, &mut buf)?;
    Ok(buf.to_vec())
}

/// Decode one complete packet
///
/// The declared length must match `bytes` exactly and the body must be
/// consumed without leftovers.
pub fn decode_packet<P: Packet>(bytes: &[u8]) -> Result<P> {
    let head = decode_head(bytes)?;
    if head.pkg_len as usize != bytes.len() {
        return Err(TableError::Decode(format!(
            "declared length {} but received {} bytes",
            head.pkg_len,
            bytes.len()
        )));
    }

    let mut body = &bytes[HEAD_SIZE..];
    let packet = P::decode_body(head, &mut body)?;
    if !body.is_empty() {
        return Err(TableError::Decode(format!(
            "{} trailing bytes after packet body",
            body.len()
        )));
    }
    Ok(packet)
}

pub fn encode_head(head: &PkgHead, buf: &mut BytesMut) {
    buf.put_u8(head.cmd);
    buf.put_u8(head.db_id);
    buf.put_u64(head.seq);
    buf.put_u32(head.pkg_len);
}

pub fn decode_head(bytes: &[u8]) -> Result<PkgHead> {
    if bytes.len() < HEAD_SIZE {
        return Err(TableError::Decode(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEAD_SIZE,
            bytes.len()
        )));
    }

    let mut b = &bytes[..HEAD_SIZE];
    Ok(PkgHead {
        cmd: b.get_u8(),
        db_id: b.get_u8(),
        seq: b.get_u64(),
        pkg_len: b.get_u32(),
    })
}

/// Parse a status byte, rejecting codes outside the known set
pub fn decode_status(code: i8) -> Result<Status> {
    Status::from_code(code)
        .ok_or_else(|| TableError::Decode(format!("Unknown status code: {}", code)))
}

// =============================================================================
// Item Encoding/Decoding
// =============================================================================

fn kv_len(kv: &KeyValueCtrl) -> usize {
    let mut n = 2;
    if kv.has(CTRL_ERR_CODE) {
        n += 1;
    }
    if kv.has(CTRL_COL_SPACE) {
        n += 1;
    }
    n += 1 + kv.row_key.len() + 2 + kv.col_key.len();
    if kv.has(CTRL_VALUE) {
        n += 4 + kv.value.len();
    }
    if kv.has(CTRL_SCORE) {
        n += 8;
    }
    if kv.has(CTRL_CAS) {
        n += 4;
    }
    n
}

fn encode_kv(kv: &KeyValueCtrl, buf: &mut BytesMut) -> Result<()> {
    if kv.row_key.len() > MAX_ROW_KEY_LEN {
        return Err(ValidationError::RowKeyLen(kv.row_key.len()).into());
    }
    if kv.col_key.len() > MAX_COL_KEY_LEN {
        return Err(ValidationError::ColKeyLen(kv.col_key.len()).into());
    }
    if kv.value.len() > MAX_VALUE_LEN {
        return Err(ValidationError::ValueLen(kv.value.len()).into());
    }

    buf.put_u8(kv.ctrl_flag);
    buf.put_u8(kv.table_id);
    if kv.has(CTRL_ERR_CODE) {
        buf.put_i8(kv.err_code);
    }
    if kv.has(CTRL_COL_SPACE) {
        buf.put_u8(kv.col_space);
    }

    buf.put_u8(kv.row_key.len() as u8);
    buf.put_slice(&kv.row_key);
    buf.put_u16(kv.col_key.len() as u16);
    buf.put_slice(&kv.col_key);

    if kv.has(CTRL_VALUE) {
        buf.put_u32(kv.value.len() as u32);
        buf.put_slice(&kv.value);
    }
    if kv.has(CTRL_SCORE) {
        buf.put_i64(kv.score);
    }
    if kv.has(CTRL_CAS) {
        buf.put_u32(kv.cas);
    }
    Ok(())
}

/// Fail with a decode error unless `n` more bytes are available
fn need(body: &[u8], n: usize, what: &str) -> Result<()> {
    if body.remaining() < n {
        return Err(TableError::Decode(format!(
            "{}: need {} bytes, {} left",
            what,
            n,
            body.remaining()
        )));
    }
    Ok(())
}

fn take(body: &mut &[u8], n: usize, what: &str) -> Result<Vec<u8>> {
    need(body, n, what)?;
    let out = body[..n].to_vec();
    body.advance(n);
    Ok(out)
}

fn decode_kv(body: &mut &[u8]) -> Result<KeyValueCtrl> {
    need(body, 2, "item header")?;
    let mut kv = KeyValueCtrl {
        ctrl_flag: body.get_u8(),
        table_id: body.get_u8(),
        ..Default::default()
    };

    if kv.has(CTRL_ERR_CODE) {
        need(body, 1, "error code")?;
        kv.err_code = body.get_i8();
    }
    if kv.has(CTRL_COL_SPACE) {
        need(body, 1, "column space")?;
        kv.col_space = body.get_u8();
    }

    need(body, 1, "row key length")?;
    let row_len = body.get_u8() as usize;
    kv.row_key = take(body, row_len, "row key")?;

    need(body, 2, "column key length")?;
    let col_len = body.get_u16() as usize;
    kv.col_key = take(body, col_len, "column key")?;

    if kv.has(CTRL_VALUE) {
        need(body, 4, "value length")?;
        let value_len = body.get_u32() as usize;
        if value_len > MAX_VALUE_LEN {
            return Err(TableError::Decode(format!(
                "value length {} exceeds {}",
                value_len, MAX_VALUE_LEN
            )));
        }
        kv.value = take(body, value_len, "value")?;
    }
    if kv.has(CTRL_SCORE) {
        need(body, 8, "score")?;
        kv.score = body.get_i64();
    }
    if kv.has(CTRL_CAS) {
        need(body, 4, "cas")?;
        kv.cas = body.get_u32();
    }
    Ok(kv)
}

// =============================================================================
// Packet Implementations
// =============================================================================

impl Packet for PkgOneOp {
    fn head(&self) -> &PkgHead {
        &self.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.head
    }

    fn encoded_len(&self) -> usize {
        HEAD_SIZE + kv_len(&self.kv)
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        encode_kv(&self.kv, buf)
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        let kv = decode_kv(body)?;
        Ok(Self { head, kv })
    }
}

impl Packet for PkgMultiOp {
    fn head(&self) -> &PkgHead {
        &self.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.head
    }

    fn encoded_len(&self) -> usize {
        HEAD_SIZE + 3 + self.kvs.iter().map(kv_len).sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        if self.kvs.len() > MAX_ITEMS {
            return Err(ValidationError::BatchLen(self.kvs.len()).into());
        }
        buf.put_i8(self.err_code);
        buf.put_u16(self.kvs.len() as u16);
        for (index, kv) in self.kvs.iter().enumerate() {
            encode_kv(kv, buf).map_err(|e| match e {
                TableError::Validation(v) => TableError::Validation(v.at(index)),
                other => other,
            })?;
        }
        Ok(())
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        need(body, 3, "multi-op header")?;
        let err_code = body.get_i8();
        let count = body.get_u16() as usize;

        let mut kvs = Vec::with_capacity(count);
        for _ in 0..count {
            kvs.push(decode_kv(body)?);
        }
        Ok(Self {
            head,
            err_code,
            kvs,
        })
    }
}

impl Packet for PkgScanReq {
    fn head(&self) -> &PkgHead {
        &self.op.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.op.head
    }

    fn encoded_len(&self) -> usize {
        self.op.encoded_len() + 4
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.op.encode_body(buf)?;
        buf.put_u8(self.direction);
        buf.put_u8(self.start);
        buf.put_u16(self.num);
        Ok(())
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        let op = PkgOneOp::decode_body(head, body)?;
        need(body, 4, "scan request trailer")?;
        Ok(Self {
            op,
            direction: body.get_u8(),
            start: body.get_u8(),
            num: body.get_u16(),
        })
    }
}

impl Packet for PkgScanResp {
    fn head(&self) -> &PkgHead {
        &self.multi.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.multi.head
    }

    fn encoded_len(&self) -> usize {
        self.multi.encoded_len() + 3
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.multi.encode_body(buf)?;
        buf.put_u8(self.direction);
        buf.put_u8(self.start);
        buf.put_u8(self.end);
        Ok(())
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        let multi = PkgMultiOp::decode_body(head, body)?;
        need(body, 3, "scan reply trailer")?;
        Ok(Self {
            multi,
            direction: body.get_u8(),
            start: body.get_u8(),
            end: body.get_u8(),
        })
    }
}

impl Packet for PkgDumpReq {
    fn head(&self) -> &PkgHead {
        &self.op.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.op.head
    }

    fn encoded_len(&self) -> usize {
        self.op.encoded_len() + 8
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.op.encode_body(buf)?;
        buf.put_u8(self.one_table);
        buf.put_u16(self.start_unit);
        buf.put_u16(self.end_unit);
        buf.put_u16(self.resume_unit);
        buf.put_u8(self.after_pivot);
        Ok(())
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        let op = PkgOneOp::decode_body(head, body)?;
        need(body, 8, "dump request trailer")?;
        Ok(Self {
            op,
            one_table: body.get_u8(),
            start_unit: body.get_u16(),
            end_unit: body.get_u16(),
            resume_unit: body.get_u16(),
            after_pivot: body.get_u8(),
        })
    }
}

impl Packet for PkgDumpResp {
    fn head(&self) -> &PkgHead {
        &self.multi.head
    }

    fn head_mut(&mut self) -> &mut PkgHead {
        &mut self.multi.head
    }

    fn encoded_len(&self) -> usize {
        self.multi.encoded_len() + 9
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.multi.encode_body(buf)?;
        buf.put_u8(self.one_table);
        buf.put_u16(self.start_unit);
        buf.put_u16(self.end_unit);
        buf.put_u16(self.last_unit);
        buf.put_u8(self.unit_start);
        buf.put_u8(self.end);
        Ok(())
    }

    fn decode_body(head: PkgHead, body: &mut &[u8]) -> Result<Self> {
        let multi = PkgMultiOp::decode_body(head, body)?;
        need(body, 9, "dump reply trailer")?;
        Ok(Self {
            multi,
            one_table: body.get_u8(),
            start_unit: body.get_u16(),
            end_unit: body.get_u16(),
            last_unit: body.get_u16(),
            unit_start: body.get_u8(),
            end: body.get_u8(),
        })
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete packet from a stream into `buf`
///
/// Blocks until the declared length has been received or an error occurs.
pub fn read_packet<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<PkgHead> {
    buf.clear();
    buf.resize(HEAD_SIZE, 0);
    reader.read_exact(&mut buf[..])?;

    let head = decode_head(&buf[..])?;
    let pkg_len = head.pkg_len as usize;
    if !(HEAD_SIZE..MAX_PKG_LEN).contains(&pkg_len) {
        return Err(TableError::Decode(format!(
            "Invalid package length: {} bytes (max {})",
            pkg_len, MAX_PKG_LEN
        )));
    }

    buf.resize(pkg_len, 0);
    if pkg_len > HEAD_SIZE {
        reader.read_exact(&mut buf[HEAD_SIZE..])?;
    }
    Ok(head)
}

/// Write an encoded packet to a stream
pub fn write_packet<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
