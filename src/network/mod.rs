//! Network Module
//!
//! Packet framing over a blocking byte stream.
//!
//! ## Model
//! - One connection carries at most one outstanding request
//! - Any `Read + Write` stream works; `TcpStream` is the default
//! - Timeouts and decode failures close the connection

mod connection;

pub use connection::Connection;
