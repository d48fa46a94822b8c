//! Connection Handler
//!
//! Owns the byte stream of one client connection and frames packets on it.
//! Once a fatal error is seen the connection refuses further traffic.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;

use crate::config::Config;
use crate::error::{Result, TableError};
use crate::protocol::{read_packet, write_packet, PkgHead};

/// One framed connection to a server
#[derive(Debug)]
pub struct Connection<S> {
    /// Underlying byte stream
    stream: S,

    /// Peer address for logging
    peer_addr: String,

    /// Set once the stream can no longer be trusted
    closed: bool,
}

impl Connection<TcpStream> {
    /// Dial the configured server
    ///
    /// Tries every resolved address in turn and configures timeouts.
    pub fn open(config: &Config) -> Result<Self> {
        let mut last_err = None;

        for addr in config.server_addr.to_socket_addrs()? {
            let attempt = if config.connect_timeout_ms > 0 {
                TcpStream::connect_timeout(&addr, Duration::from_millis(config.connect_timeout_ms))
            } else {
                TcpStream::connect(addr)
            };

            match attempt {
                Ok(stream) => {
                    // Disable Nagle's algorithm for low latency
                    stream.set_nodelay(true)?;

                    let mut conn = Self::new(stream, addr.to_string());
                    conn.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;
                    tracing::debug!("Connected to {}", conn.peer_addr);
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => TableError::Io(e),
            None => TableError::Config(format!(
                "server address {} did not resolve",
                config.server_addr
            )),
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.stream
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.stream
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an already established stream
    pub fn new(stream: S, peer_addr: impl Into<String>) -> Self {
        Self {
            stream,
            peer_addr: peer_addr.into(),
            closed: false,
        }
    }

    /// Write one encoded packet
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        tracing::trace!("Sending {} bytes to {}", bytes.len(), self.peer_addr);
        write_packet(&mut self.stream, bytes)
    }

    /// Read one complete packet into `buf`
    pub fn receive(&mut self, buf: &mut BytesMut) -> Result<PkgHead> {
        self.ensure_open()?;
        let head = read_packet(&mut self.stream, buf)?;
        tracing::trace!(
            "Received {} bytes from {} (cmd=0x{:02x}, seq={})",
            head.pkg_len,
            self.peer_addr,
            head.cmd,
            head.seq
        );
        Ok(head)
    }

    /// Stop using this connection at the caller's request
    pub fn shutdown(&mut self) {
        if !self.closed {
            tracing::debug!("Closing connection to {}", self.peer_addr);
        }
        self.closed = true;
    }

    /// Stop using this connection after a connection-fatal error
    pub fn close(&mut self, reason: &TableError) {
        if !self.closed {
            match reason {
                TableError::Io(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    tracing::warn!("Timeout on {}, closing connection", self.peer_addr);
                }
                _ => {
                    tracing::warn!("Closing connection to {}: {}", self.peer_addr, reason);
                }
            }
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TableError::ConnectionClosed);
        }
        Ok(())
    }
}
