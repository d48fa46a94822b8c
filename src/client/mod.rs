//! Client Module
//!
//! The client facade: one connection, one session, synchronous calls.
//!
//! ## Request Lifecycle
//! 1. Validate arguments (no I/O on failure, no sequence number consumed)
//! 2. Encode into a pooled buffer with the next sequence number
//! 3. Send, then block until the matching reply or a timeout
//! 4. Check the reply header (command, sequence) and decode
//!
//! Connection-fatal errors close the client; every later call fails with
//! [`TableError::ConnectionClosed`].

mod args;
mod batch;
mod dump;
mod scan;

pub use args::{
    DelArgs, DelReply, GetArgs, GetReply, IncrArgs, IncrReply, OpArgs, RecordKey, SetArgs,
    SetReply,
};
pub use dump::{DumpArgs, DumpPivot, DumpRecord, DumpReply, DumpToken};
pub use scan::{ScanArgs, ScanRecord, ScanReply, ScanStart, ScanToken};

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use bytes::BytesMut;

use crate::buffer::BufferPool;
use crate::config::Config;
use crate::error::{Result, TableError};
use crate::network::Connection;
use crate::protocol::{
    decode_packet, encode_packet, ColumnSpace, CommandType, KeyValueCtrl, Packet, PkgHead,
    PkgOneOp,
};
use crate::session::Session;

use args::check_status;

/// A synchronous client bound to one connection
pub struct Client<S = TcpStream> {
    conn: Connection<S>,
    session: Session,
    config: Config,
    pool: Arc<BufferPool>,
}

impl Client<TcpStream> {
    /// Dial the configured server
    pub fn connect(config: Config) -> Result<Self> {
        let pool = BufferPool::new(config.buffer_capacity, config.buffer_pool_size);
        Self::connect_with_pool(config, pool)
    }

    /// Dial the configured server, sharing an existing buffer pool
    pub fn connect_with_pool(config: Config, pool: Arc<BufferPool>) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open(&config)?;
        Ok(Self {
            conn,
            session: Session::new(),
            config,
            pool,
        })
    }
}

impl<S: Read + Write> Client<S> {
    /// Build a client over an established stream
    pub fn from_stream(stream: S, config: Config) -> Result<Self> {
        let pool = BufferPool::new(config.buffer_capacity, config.buffer_pool_size);
        Self::from_stream_with_pool(stream, config, pool)
    }

    pub fn from_stream_with_pool(stream: S, config: Config, pool: Arc<BufferPool>) -> Result<Self> {
        config.validate()?;
        let peer = config.server_addr.clone();
        Ok(Self {
            conn: Connection::new(stream, peer),
            session: Session::new(),
            config,
            pool,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Currently selected database id
    pub fn database_id(&self) -> u8 {
        self.session.db_id()
    }

    /// Change the selected database for this connection
    ///
    /// Local state only; the next request carries the new id.
    pub fn select(&mut self, db_id: u8) -> Result<()> {
        self.session.select(db_id)?;
        tracing::debug!("Selected database {}", db_id);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// Stop using this connection
    pub fn close(&mut self) {
        self.conn.shutdown();
    }

    pub fn get_ref(&self) -> &S {
        self.conn.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.conn.get_mut()
    }

    /// Round-trip an empty request
    pub fn ping(&mut self) -> Result<()> {
        let request = PkgOneOp {
            head: PkgHead::new(CommandType::Ping, self.session.db_id()),
            kv: KeyValueCtrl::default(),
        };
        let reply: PkgOneOp = self.call(request)?;
        let status = args::decode_item_status(&reply.kv).map_err(|e| self.fail(e))?;
        check_status(status)
    }

    /// Authenticate for `db_id` (255 for admin rights)
    pub fn auth(&mut self, db_id: u8, password: &str) -> Result<()> {
        let request = PkgOneOp {
            head: PkgHead::new(CommandType::Auth, db_id),
            kv: KeyValueCtrl::new(0, Vec::new(), password.as_bytes()),
        };
        let reply: PkgOneOp = self.call(request)?;
        let status = args::decode_item_status(&reply.kv).map_err(|e| self.fail(e))?;
        check_status(status)?;

        self.session.grant(db_id);
        tracing::debug!("Authenticated for database {}", db_id);
        Ok(())
    }

    // =========================================================================
    // Single-key Operations
    // =========================================================================

    /// Read one record. A missing key is `Ok` with `Status::NotExist`.
    pub fn get(&mut self, space: ColumnSpace, args: &GetArgs) -> Result<GetReply> {
        self.execute(space, args)
    }

    /// Write one record
    pub fn set(&mut self, space: ColumnSpace, args: &SetArgs) -> Result<SetReply> {
        self.execute(space, args)
    }

    /// Add to the score of one record
    pub fn incr(&mut self, space: ColumnSpace, args: &IncrArgs) -> Result<IncrReply> {
        self.execute(space, args)
    }

    /// Delete one record
    pub fn del(&mut self, space: ColumnSpace, args: &DelArgs) -> Result<DelReply> {
        self.execute(space, args)
    }

    /// Run any single-key operation
    ///
    /// Negative item statuses become [`TableError::Server`].
    pub fn execute<A: OpArgs>(&mut self, space: ColumnSpace, args: &A) -> Result<A::Reply> {
        self.ensure_open()?;
        args.validate()?;
        let kv = args.to_kv(space)?;

        let request = PkgOneOp {
            head: PkgHead::new(A::CMD, self.session.db_id()),
            kv,
        };
        let reply: PkgOneOp = self.call(request)?;

        if !args.key().matches(&reply.kv) {
            return Err(self.fail(TableError::Decode(
                "reply key does not match request".to_string(),
            )));
        }
        let status = args::decode_item_status(&reply.kv).map_err(|e| self.fail(e))?;
        check_status(status)?;
        A::reply(reply.kv).map_err(|e| self.fail(e))
    }

    // =========================================================================
    // Request/Reply Plumbing
    // =========================================================================

    /// Encode, send and decode one request
    ///
    /// The sequence number is only consumed once encoding succeeded.
    pub(crate) fn call<Req: Packet, Resp: Packet>(&mut self, mut request: Req) -> Result<Resp> {
        self.ensure_open()?;

        let seq = self.session.peek_seq();
        request.head_mut().seq = seq;

        let mut buf = self.pool.acquire();
        encode_packet(&request, &mut buf)?;
        self.session.next_seq();

        let cmd = request.head().cmd;
        tracing::debug!(
            cmd,
            db = request.head().db_id,
            seq,
            bytes = buf.len(),
            "Sending request"
        );

        let result = self.exchange(&mut buf, cmd, seq);
        result.map_err(|e| self.fail(e))
    }

    /// Send the encoded request in `buf` and read the reply into it
    fn exchange<Resp: Packet>(&mut self, buf: &mut BytesMut, cmd: u8, seq: u64) -> Result<Resp> {
        self.conn.send(&buf[..])?;
        let head = self.conn.receive(buf)?;
        if head.seq != seq {
            return Err(TableError::SequenceMismatch {
                sent: seq,
                received: head.seq,
            });
        }
        if head.cmd != cmd {
            return Err(TableError::Decode(format!(
                "reply command 0x{:02x} does not match request 0x{:02x}",
                head.cmd, cmd
            )));
        }
        decode_packet::<Resp>(&buf[..])
    }

    /// Close the connection if `err` is connection-fatal, then hand it back
    pub(crate) fn fail(&mut self, err: TableError) -> TableError {
        if err.is_connection_fatal() {
            self.conn.close(&err);
        }
        err
    }

    fn ensure_open(&self) -> Result<()> {
        if self.conn.is_closed() {
            return Err(TableError::ConnectionClosed);
        }
        Ok(())
    }
}
