//! Batch Coordinator
//!
//! Packs N operations of one kind and one column space into a single
//! multi-op packet and correlates the N answers by position.
//!
//! - `reply[i]` always answers `args[i]`
//! - a failing item only marks its own reply; the rest still run
//! - a batch that does not fit one packet is rejected whole, never split

use std::io::{Read, Write};

use super::args::{
    DelArgs, DelReply, GetArgs, GetReply, IncrArgs, IncrReply, OpArgs, SetArgs, SetReply,
};
use super::Client;
use crate::error::{Result, TableError, ValidationError};
use crate::protocol::{decode_status, ColumnSpace, PkgHead, PkgMultiOp, MAX_ITEMS};

impl<S: Read + Write> Client<S> {
    /// Read many records; missing keys answer `Status::NotExist`
    pub fn m_get(&mut self, space: ColumnSpace, args: &[GetArgs]) -> Result<Vec<GetReply>> {
        self.batch(space, args)
    }

    /// Write many records
    pub fn m_set(&mut self, space: ColumnSpace, args: &[SetArgs]) -> Result<Vec<SetReply>> {
        self.batch(space, args)
    }

    /// Delete many records
    pub fn m_del(&mut self, space: ColumnSpace, args: &[DelArgs]) -> Result<Vec<DelReply>> {
        self.batch(space, args)
    }

    /// Increase the scores of many records
    pub fn m_incr(&mut self, space: ColumnSpace, args: &[IncrArgs]) -> Result<Vec<IncrReply>> {
        self.batch(space, args)
    }

    /// Run any operation kind as one batch
    ///
    /// Per-item failures are reported in each reply's `status`. The call
    /// itself only fails for local validation, whole-packet server errors
    /// and connection-fatal errors.
    pub fn batch<A: OpArgs>(&mut self, space: ColumnSpace, args: &[A]) -> Result<Vec<A::Reply>> {
        self.ensure_open()?;
        if args.is_empty() {
            return Ok(Vec::new());
        }
        if args.len() > MAX_ITEMS {
            return Err(ValidationError::BatchLen(args.len()).into());
        }

        let kvs = args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                arg.validate()
                    .and_then(|_| arg.to_kv(space))
                    .map_err(|e| e.at(index))
            })
            .collect::<std::result::Result<Vec<_>, ValidationError>>()?;

        let request = PkgMultiOp {
            head: PkgHead::new(A::MULTI_CMD, self.session.db_id()),
            err_code: 0,
            kvs,
        };
        let reply: PkgMultiOp = self.call(request)?;

        if reply.err_code != 0 {
            let status = decode_status(reply.err_code).map_err(|e| self.fail(e))?;
            tracing::debug!("Batch of {} rejected: {:?}", args.len(), status);
            return Err(TableError::Server(status));
        }

        if reply.kvs.len() != args.len() {
            return Err(self.fail(TableError::Decode(format!(
                "batch of {} answered with {} items",
                args.len(),
                reply.kvs.len()
            ))));
        }

        let mut replies = Vec::with_capacity(args.len());
        for (index, (arg, kv)) in args.iter().zip(reply.kvs).enumerate() {
            if !arg.key().matches(&kv) {
                return Err(self.fail(TableError::Decode(format!(
                    "batch item {} answers a different key",
                    index
                ))));
            }
            replies.push(A::reply(kv).map_err(|e| self.fail(e))?);
        }
        Ok(replies)
    }
}
