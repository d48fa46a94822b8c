//! Operation arguments and replies
//!
//! Get, Set, Incr and Del differ only in the fields they carry, so they
//! share one [`OpArgs`] trait. Single-key and batch calls go through the
//! same generic path.

use serde::{Deserialize, Serialize};

use crate::cas;
use crate::error::{Result, TableError, ValidationError};
use crate::protocol::{
    decode_status, ColumnSpace, CommandType, KeyValueCtrl, Status, CTRL_ERR_CODE,
    MAX_COL_KEY_LEN, MAX_ROW_KEY_LEN, MAX_VALUE_LEN,
};

/// (table, row, column) address of one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
}

impl RecordKey {
    pub fn new(table_id: u8, row_key: impl Into<Vec<u8>>, col_key: impl Into<Vec<u8>>) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            col_key: col_key.into(),
        }
    }

    /// Row key must be 1..=255 bytes, column key at most 65535
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_row_key(&self.row_key)?;
        if self.col_key.len() > MAX_COL_KEY_LEN {
            return Err(ValidationError::ColKeyLen(self.col_key.len()));
        }
        Ok(())
    }

    pub(crate) fn to_kv(&self, space: ColumnSpace) -> KeyValueCtrl {
        KeyValueCtrl::new(self.table_id, self.row_key.clone(), self.col_key.clone())
            .with_col_space(space.wire())
    }

    pub(crate) fn matches(&self, kv: &KeyValueCtrl) -> bool {
        self.table_id == kv.table_id && self.row_key == kv.row_key && self.col_key == kv.col_key
    }

    fn from_kv(kv: &KeyValueCtrl) -> Self {
        Self::new(kv.table_id, kv.row_key.clone(), kv.col_key.clone())
    }
}

pub(crate) fn validate_row_key(row_key: &[u8]) -> std::result::Result<(), ValidationError> {
    if row_key.is_empty() || row_key.len() > MAX_ROW_KEY_LEN {
        return Err(ValidationError::RowKeyLen(row_key.len()));
    }
    Ok(())
}

pub(crate) fn validate_value(value: &[u8]) -> std::result::Result<(), ValidationError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(ValidationError::ValueLen(value.len()));
    }
    Ok(())
}

/// One operation kind: its command codes, request encoding and reply shape
pub trait OpArgs {
    type Reply;

    /// Command for a single key
    const CMD: CommandType;

    /// Command for a batch
    const MULTI_CMD: CommandType;

    fn key(&self) -> &RecordKey;

    /// Local checks run before encoding
    fn validate(&self) -> std::result::Result<(), ValidationError>;

    /// Build the request item
    fn to_kv(&self, space: ColumnSpace) -> std::result::Result<KeyValueCtrl, ValidationError>;

    /// Build the reply from the answered item
    fn reply(kv: KeyValueCtrl) -> Result<Self::Reply>;
}

pub(crate) fn decode_item_status(kv: &KeyValueCtrl) -> Result<Status> {
    decode_status(kv.err_code)
}

/// Scanned and dumped records only exist on success, so any item status
/// other than `Ok` makes the reply malformed
pub(crate) fn check_record_status(kv: &KeyValueCtrl) -> Result<()> {
    if !kv.has(CTRL_ERR_CODE) {
        return Ok(());
    }
    match decode_status(kv.err_code)? {
        Status::Ok => Ok(()),
        status => Err(TableError::Decode(format!(
            "record carries status {:?}",
            status
        ))),
    }
}

// =============================================================================
// Get
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub key: RecordKey,
    /// Read mode, see [`crate::cas::ReadCas`]
    pub cas: u32,
}

impl GetArgs {
    pub fn new(table_id: u8, row_key: impl Into<Vec<u8>>, col_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: RecordKey::new(table_id, row_key, col_key),
            cas: cas::NO_CAS,
        }
    }

    pub fn with_cas(mut self, cas: impl Into<u32>) -> Self {
        self.cas = cas.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReply {
    pub status: Status,
    pub key: RecordKey,
    pub value: Vec<u8>,
    pub score: i64,
    /// Fresh token when read with `ReadCas::PrimaryWithToken`, else 0
    pub cas: u32,
}

impl GetReply {
    pub fn found(&self) -> bool {
        self.status == Status::Ok
    }
}

impl OpArgs for GetArgs {
    type Reply = GetReply;
    const CMD: CommandType = CommandType::Get;
    const MULTI_CMD: CommandType = CommandType::MGet;

    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.key.validate()?;
        cas::ReadCas::from_raw(self.cas)?;
        Ok(())
    }

    fn to_kv(&self, space: ColumnSpace) -> std::result::Result<KeyValueCtrl, ValidationError> {
        cas::read_request(self.key.to_kv(space), self.cas)
    }

    fn reply(kv: KeyValueCtrl) -> Result<GetReply> {
        Ok(GetReply {
            status: decode_item_status(&kv)?,
            key: RecordKey::from_kv(&kv),
            value: kv.value,
            score: kv.score,
            cas: kv.cas,
        })
    }
}

// =============================================================================
// Set
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetArgs {
    pub key: RecordKey,
    pub value: Vec<u8>,
    pub score: i64,
    /// Expected token, 0 for an unconditional write
    pub cas: u32,
}

impl SetArgs {
    pub fn new(
        table_id: u8,
        row_key: impl Into<Vec<u8>>,
        col_key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        score: i64,
    ) -> Self {
        Self {
            key: RecordKey::new(table_id, row_key, col_key),
            value: value.into(),
            score,
            cas: cas::NO_CAS,
        }
    }

    pub fn with_cas(mut self, cas: u32) -> Self {
        self.cas = cas;
        self
    }
}

/// Reply to Set and Del
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReply {
    pub status: Status,
    pub key: RecordKey,
}

impl OpArgs for SetArgs {
    type Reply = SetReply;
    const CMD: CommandType = CommandType::Set;
    const MULTI_CMD: CommandType = CommandType::MSet;

    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.key.validate()?;
        validate_value(&self.value)
    }

    fn to_kv(&self, space: ColumnSpace) -> std::result::Result<KeyValueCtrl, ValidationError> {
        let kv = self
            .key
            .to_kv(space)
            .with_value(self.value.clone())
            .with_score(self.score);
        Ok(cas::write_request(kv, self.cas))
    }

    fn reply(kv: KeyValueCtrl) -> Result<SetReply> {
        Ok(SetReply {
            status: decode_item_status(&kv)?,
            key: RecordKey::from_kv(&kv),
        })
    }
}

// =============================================================================
// Incr
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrArgs {
    pub key: RecordKey,
    /// Amount added to the stored score
    pub score: i64,
    pub cas: u32,
}

impl IncrArgs {
    pub fn new(
        table_id: u8,
        row_key: impl Into<Vec<u8>>,
        col_key: impl Into<Vec<u8>>,
        score: i64,
    ) -> Self {
        Self {
            key: RecordKey::new(table_id, row_key, col_key),
            score,
            cas: cas::NO_CAS,
        }
    }

    pub fn with_cas(mut self, cas: u32) -> Self {
        self.cas = cas;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrReply {
    pub status: Status,
    pub key: RecordKey,
    pub value: Vec<u8>,
    /// Score after the increment
    pub score: i64,
}

impl OpArgs for IncrArgs {
    type Reply = IncrReply;
    const CMD: CommandType = CommandType::Incr;
    const MULTI_CMD: CommandType = CommandType::MIncr;

    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.key.validate()
    }

    fn to_kv(&self, space: ColumnSpace) -> std::result::Result<KeyValueCtrl, ValidationError> {
        let kv = self.key.to_kv(space).with_score(self.score);
        Ok(cas::write_request(kv, self.cas))
    }

    fn reply(kv: KeyValueCtrl) -> Result<IncrReply> {
        Ok(IncrReply {
            status: decode_item_status(&kv)?,
            key: RecordKey::from_kv(&kv),
            value: kv.value,
            score: kv.score,
        })
    }
}

// =============================================================================
// Del
// =============================================================================

/// Same shape as [`GetArgs`]; `cas` is an expected token here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelArgs {
    pub key: RecordKey,
    pub cas: u32,
}

impl DelArgs {
    pub fn new(table_id: u8, row_key: impl Into<Vec<u8>>, col_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: RecordKey::new(table_id, row_key, col_key),
            cas: cas::NO_CAS,
        }
    }

    pub fn with_cas(mut self, cas: u32) -> Self {
        self.cas = cas;
        self
    }
}

pub type DelReply = SetReply;

impl OpArgs for DelArgs {
    type Reply = DelReply;
    const CMD: CommandType = CommandType::Del;
    const MULTI_CMD: CommandType = CommandType::MDel;

    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.key.validate()
    }

    fn to_kv(&self, space: ColumnSpace) -> std::result::Result<KeyValueCtrl, ValidationError> {
        Ok(cas::write_request(self.key.to_kv(space), self.cas))
    }

    fn reply(kv: KeyValueCtrl) -> Result<DelReply> {
        SetArgs::reply(kv)
    }
}

/// Turn a failing item status into a call-scoped error
pub(crate) fn check_status(status: Status) -> Result<()> {
    if status.is_failure() {
        return Err(TableError::Server(status));
    }
    Ok(())
}
