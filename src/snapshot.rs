//! Snapshot file framing shared by both on-disk indexes.
//!
//! A snapshot is `[bincode payload][4-byte magic][u32 CRC32 BE]`. Writes go
//! through a temp file and an atomic rename so a crash never leaves a
//! half-written snapshot in place. The magic distinguishes the owning index
//! so a lexical snapshot is never deserialized as a vector one.

use std::fs;
use std::io;
use std::path::Path;

/// Appends the integrity footer and atomically writes `payload` to
/// `dir/file_name`.
pub(crate) fn write(dir: &Path, file_name: &str, magic: &[u8; 4], payload: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let crc = crc32fast::hash(payload);

    let mut framed = Vec::with_capacity(payload.len() + 8);
    framed.extend_from_slice(payload);
    framed.extend_from_slice(magic);
    framed.extend_from_slice(&crc.to_be_bytes());

    let path = dir.join(file_name);
    let tmp_path = dir.join(format!("{file_name}.tmp"));
    fs::write(&tmp_path, &framed)?;
    fs::rename(&tmp_path, &path)?;

    tracing::debug!(?path, bytes = payload.len(), crc, "wrote index snapshot");
    Ok(())
}

/// Reads `dir/file_name`, verifies the magic and CRC32, and returns the
/// payload. Returns `Ok(None)` when the file does not exist.
pub(crate) fn read(dir: &Path, file_name: &str, magic: &[u8; 4]) -> io::Result<Option<Vec<u8>>> {
    let path = dir.join(file_name);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != magic {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot {path:?} missing integrity footer"),
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
            format!(
                "snapshot {path:?} CRC32 mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
            ),
        ));
    }
    Ok(Some(payload.to_vec()))
}
