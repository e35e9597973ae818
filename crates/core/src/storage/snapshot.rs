//! Full-state snapshots for log compaction.
//!
//! The key→value map is bincode-serialized with a `[magic][u32 CRC32 BE]`
//! footer and published crash-atomically: write to a temp file, then rename.
//! A crash mid-save leaves the previous snapshot intact, never a half-written
//! one.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "fusekv.snap";

/// Magic bytes preceding the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"FKS1";

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Serialize the full map and publish it atomically.
pub fn save(data: &HashMap<String, Vec<u8>>, dir: &Path) -> io::Result<()> {
    let bytes = bincode::serialize(data).map_err(|e| io::Error::other(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    fs::create_dir_all(dir)?;
    let path = snapshot_path(dir);
    let tmp_path = path.with_extension("snap.tmp");

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, &path)?;

    tracing::debug!(
        "saved snapshot ({} keys, {} bytes, CRC32={crc:#010x})",
        data.len(),
        bytes.len()
    );
    Ok(())
}

/// Load a previously saved map. `Ok(None)` when no snapshot exists — that is
/// "start empty", not an error. A corrupt snapshot is an error: silently
/// starting empty would discard acknowledged data.
pub fn load(dir: &Path) -> io::Result<Option<HashMap<String, Vec<u8>>>> {
    let raw = match fs::read(snapshot_path(dir)) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "snapshot missing CRC32 footer",
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot CRC32 mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"),
        ));
    }

    let data: HashMap<String, Vec<u8>> = bincode::deserialize(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    tracing::debug!("loaded snapshot ({} keys)", data.len());
    Ok(Some(data))
}
