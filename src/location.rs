//! Location - the opaque value pointer.
//!
//! A location tells the store where a record physically resides: which
//! level, which file, at what offset, and how many bytes to read. The
//! external key index stores locations verbatim and never interprets
//! them; only this crate encodes and decodes the 20-byte form.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Encoded size of a location.
pub const LOCATION_SIZE: usize = 20;

/// A pointer to a record inside the value log.
///
/// Valid only as long as the `(level, file_number)` file it references has
/// not been deleted by compaction. The key index is updated to a fresh
/// location before the old file is removed, so a dangling location is only
/// observable by a reader racing a compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Total record size in bytes, header included.
    pub length: u32,
    /// File number within the level.
    pub file_number: u32,
    /// Byte offset of the record within the file.
    pub offset: u32,
    /// Sequence number assigned when the record was written.
    pub sequence: u32,
    /// Level holding the file.
    pub level: u32,
}

impl Location {
    /// Encode into the fixed 20-byte wire form.
    ///
    /// Fields are big-endian u32s in the order length, file_number,
    /// offset, sequence, level.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(LOCATION_SIZE);
        buf.put_u32(self.length);
        buf.put_u32(self.file_number);
        buf.put_u32(self.offset);
        buf.put_u32(self.sequence);
        buf.put_u32(self.level);
        buf.freeze()
    }

    /// Decode from the wire form.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() != LOCATION_SIZE {
            return Err(Error::Format(format!(
                "location must be {} bytes, got {}",
                LOCATION_SIZE,
                data.len()
            )));
        }

        Ok(Self {
            length: data.get_u32(),
            file_number: data.get_u32(),
            offset: data.get_u32(),
            sequence: data.get_u32(),
            level: data.get_u32(),
        })
    }
}
