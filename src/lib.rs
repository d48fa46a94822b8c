//! # tablekv
//!
//! Client-side protocol engine for a sharded table key-value store:
//! - Binary packet codec for single, batch, scan and dump requests
//! - Per-connection session state (database, sequence numbers, grants)
//! - Compare-and-swap tokens for optimistic writes
//! - Resumable scan and dump cursors
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                              │
//! │        get/set/incr/del · m_* batches · scan · dump         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Session   │          │   Cursors   │
//!   │ (db, seq,   │          │ (scan/dump  │
//!   │   grants)   │          │   tokens)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌───────────────┐        ┌─────────────┐
//!               │ Packet Codec  │◄──────►│ Buffer Pool │
//!               └───────┬───────┘        └─────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │  Connection   │
//!               │ (Read+Write)  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod session;
pub mod cas;
pub mod buffer;
pub mod network;
pub mod client;
pub mod archive;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TableError, ValidationError};
pub use config::Config;
pub use client::{
    Client, DelArgs, DelReply, DumpArgs, DumpPivot, DumpRecord, DumpReply, GetArgs, GetReply,
    IncrArgs, IncrReply, OpArgs, RecordKey, ScanArgs, ScanRecord, ScanReply, ScanStart,
    SetArgs, SetReply,
};
pub use cas::ReadCas;
pub use protocol::{ColumnSpace, ErrorClass, Status};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tablekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
