//! Serialized engine format
//!
//! ```text
//! magic(4) "EBNG" | version(2) | manifest_len(4) | manifest_crc(4) | manifest JSON
//! ```
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::engine::EngineManifest;
use crate::error::{Result, RuntimeError};

/// Engine magic bytes
pub const MAGIC: [u8; 4] = *b"EBNG";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

/// magic(4) + version(2) + manifest_len(4) + manifest_crc(4)
const PREAMBLE_SIZE: usize = 14;

/// Serialize a manifest into an engine blob
pub fn encode(manifest: &EngineManifest) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(manifest)?;
    let crc = crc32fast::hash(&body);

    let mut buf = Vec::with_capacity(PREAMBLE_SIZE + body.len());
    buf.write_all(&MAGIC)?;
    buf.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_u32::<LittleEndian>(body.len() as u32)?;
    buf.write_u32::<LittleEndian>(crc)?;
    buf.write_all(&body)?;
    Ok(buf)
}

/// Parse and verify an engine blob, including the manifest invariants
pub fn decode(data: &[u8]) -> Result<EngineManifest> {
    if data.len() < PREAMBLE_SIZE {
        return Err(RuntimeError::Truncated {
            need: PREAMBLE_SIZE,
            have: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(RuntimeError::InvalidEngine(format!("bad magic {:02x?}", magic)));
    }

    let version = cursor.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(RuntimeError::UnsupportedVersion(version));
    }

    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let expected_crc = cursor.read_u32::<LittleEndian>()?;

    let total = PREAMBLE_SIZE + len;
    if data.len() < total {
        return Err(RuntimeError::Truncated {
            need: total,
            have: data.len(),
        });
    }

    let body = &data[PREAMBLE_SIZE..total];
    let crc = crc32fast::hash(body);
    if crc != expected_crc {
        return Err(RuntimeError::ChecksumMismatch {
            expected: expected_crc,
            got: crc,
        });
    }

    let manifest: EngineManifest = serde_json::from_slice(body)?;
    manifest.validate()?;
    Ok(manifest)
}
