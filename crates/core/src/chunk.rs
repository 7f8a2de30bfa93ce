//! Chunk byte ranges and transient chunk file naming.

use crate::ids::UploadId;
use serde::{Deserialize, Serialize};

/// Suffix for transient chunk files.
pub const CHUNK_FILE_SUFFIX: &str = ".chunk";

/// A half-open byte range `[start, end)` within an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    /// First byte offset covered by the chunk.
    pub start: u64,
    /// One past the last byte offset covered by the chunk.
    pub end: u64,
}

impl ChunkRange {
    /// Create a validated range. `end` must be strictly greater than `start`.
    pub fn new(start: u64, end: u64) -> crate::Result<Self> {
        if end <= start {
            return Err(crate::Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Length of the range in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True when the range covers no bytes. Ranges built through [`new`]
    /// are never empty; this exists for deserialized values.
    ///
    /// [`new`]: ChunkRange::new
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether this range lies fully inside `[0, total)`.
    pub fn fits_within(&self, total: u64) -> bool {
        self.end <= total
    }
}

/// Build the deterministic transient file name for a chunk.
///
/// The name is `{upload_id}_{start}_{end}.chunk`, stable across process
/// restarts so an interrupted upload can resume against the same files.
pub fn chunk_file_name(upload_id: &UploadId, range: ChunkRange) -> String {
    format!(
        "{}_{}_{}{CHUNK_FILE_SUFFIX}",
        upload_id, range.start, range.end
    )
}

/// Parse a transient chunk file name back into its upload id and range.
pub fn parse_chunk_file_name(name: &str) -> crate::Result<(UploadId, ChunkRange)> {
    let err = || crate::Error::InvalidChunkFileName(name.to_string());
    let stem = name.strip_suffix(CHUNK_FILE_SUFFIX).ok_or_else(err)?;
    let (rest, end) = stem.rsplit_once('_').ok_or_else(err)?;
    let (id, start) = rest.rsplit_once('_').ok_or_else(err)?;
    let start: u64 = start.parse().map_err(|_| err())?;
    let end: u64 = end.parse().map_err(|_| err())?;
    let id = UploadId::parse(id)?;
    let range = ChunkRange::new(start, end).map_err(|_| err())?;
    Ok((id, range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validation() {
        assert!(ChunkRange::new(0, 1).is_ok());
        assert!(ChunkRange::new(5, 5).is_err());
        assert!(ChunkRange::new(6, 5).is_err());
        assert_eq!(ChunkRange::new(100, 250).unwrap().len(), 150);
    }

    #[test]
    fn test_range_fits_within() {
        let range = ChunkRange::new(100, 300).unwrap();
        assert!(range.fits_within(300));
        assert!(!range.fits_within(299));
    }

    #[test]
    fn test_chunk_file_name_roundtrip() {
        let id = UploadId::parse("abc123").unwrap();
        let range = ChunkRange::new(0, 100).unwrap();
        let name = chunk_file_name(&id, range);
        assert_eq!(name, "abc123_0_100.chunk");

        let (parsed_id, parsed_range) = parse_chunk_file_name(&name).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(parsed_range, range);
    }

    #[test]
    fn test_chunk_file_name_roundtrip_with_underscores_in_id() {
        let id = UploadId::parse("my_file_v2").unwrap();
        let range = ChunkRange::new(200, 300).unwrap();
        let (parsed_id, parsed_range) = parse_chunk_file_name(&chunk_file_name(&id, range)).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(parsed_range, range);
    }

    #[test]
    fn test_parse_chunk_file_name_rejects_garbage() {
        for bad in [
            "abc123_0_100",
            "abc123.chunk",
            "abc123_x_100.chunk",
            "abc123_100_50.chunk",
            "_0_100.chunk",
        ] {
            assert!(parse_chunk_file_name(bad).is_err(), "{bad} should fail");
        }
    }
}
