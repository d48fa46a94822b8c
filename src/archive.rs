//! Dump Archive
//!
//! Persists dumped records to a file so a dump can be replayed or
//! inspected offline.
//!
//! ## File Format
//! ```text
//! ┌────────────┬─────────────┬─────────────────────────────┐
//! │ Magic (4)  │ Count (8)   │ bincode DumpRecord * Count  │
//! └────────────┴─────────────┴─────────────────────────────┘
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::DumpRecord;
use crate::error::{Result, TableError};

/// "TKVD"
const ARCHIVE_MAGIC: u32 = 0x544B_5644;

#[derive(Serialize)]
struct ArchiveOut<'a> {
    magic: u32,
    records: &'a [DumpRecord],
}

#[derive(Deserialize)]
struct ArchiveIn {
    magic: u32,
    records: Vec<DumpRecord>,
}

fn map_bincode(err: bincode::Error) -> TableError {
    match *err {
        bincode::ErrorKind::Io(e) => TableError::Io(e),
        other => TableError::Decode(format!("archive: {}", other)),
    }
}

/// Write `records` to `path`, replacing any existing file
pub fn write_archive(path: impl AsRef<Path>, records: &[DumpRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    let archive = ArchiveOut {
        magic: ARCHIVE_MAGIC,
        records,
    };
    bincode::serialize_into(&mut writer, &archive).map_err(map_bincode)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    tracing::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read every record from an archive written by [`write_archive`]
pub fn read_archive(path: impl AsRef<Path>) -> Result<Vec<DumpRecord>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let archive: ArchiveIn = bincode::deserialize_from(reader).map_err(map_bincode)?;
    if archive.magic != ARCHIVE_MAGIC {
        return Err(TableError::Decode(format!(
            "archive: bad magic 0x{:08x}",
            archive.magic
        )));
    }
    Ok(archive.records)
}
