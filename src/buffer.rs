//! Buffer pool
//!
//! Resizable `BytesMut` buffers shared by clients. A buffer is checked out
//! for one encode/decode cycle and returned to the pool on drop; it grows
//! on demand up to the maximum package length.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::protocol::MAX_PKG_LEN;

/// Pool of reusable packet buffers
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    initial_capacity: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(initial_capacity: usize, max_pooled: usize) -> Arc<Self> {
        Arc::new(Self {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            initial_capacity,
            max_pooled,
        })
    }

    /// Check out an empty buffer
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buf = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.initial_capacity));
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    fn release(&self, mut buf: BytesMut) {
        // Buffers that grew past a full package are not kept around
        if buf.capacity() > MAX_PKG_LEN {
            return;
        }
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`]
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(buf);
    }
}
