//! Session State
//!
//! Per-connection state mirrored by the client: selected database,
//! request sequence counter and the grants obtained through `auth`.
//! Access control itself is enforced by the server; the mirror only keeps
//! request encoding reproducible.

use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::protocol::ADMIN_DB_ID;

/// Connection-lifetime state owned by one client
#[derive(Debug, Clone, Default)]
pub struct Session {
    db_id: u8,
    seq: u64,
    auth_admin: bool,
    authorized: BTreeSet<u8>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected database (0 by default)
    pub fn db_id(&self) -> u8 {
        self.db_id
    }

    /// Change the selected database. Local state only.
    pub fn select(&mut self, db_id: u8) -> Result<(), ValidationError> {
        if db_id == ADMIN_DB_ID {
            return Err(ValidationError::DbId(db_id));
        }
        self.db_id = db_id;
        Ok(())
    }

    /// Advance and return the sequence number for the next request
    pub fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Sequence number the next request will carry
    pub fn peek_seq(&self) -> u64 {
        self.seq.wrapping_add(1)
    }

    /// Sequence number of the last issued request (0 before the first)
    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    /// Record a successful `auth` for `db_id`
    pub fn grant(&mut self, db_id: u8) {
        if db_id == ADMIN_DB_ID {
            self.auth_admin = true;
        } else {
            self.authorized.insert(db_id);
        }
    }

    pub fn is_admin(&self) -> bool {
        self.auth_admin
    }

    /// Whether a grant is known for `db_id`, directly or through admin
    pub fn is_authorized(&self, db_id: u8) -> bool {
        self.auth_admin || self.authorized.contains(&db_id)
    }

    pub fn authorized(&self) -> impl Iterator<Item = u8> + '_ {
        self.authorized.iter().copied()
    }
}
