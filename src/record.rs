//! Record - the on-disk value-log entry format.
//!
//! Layout: a 16-byte header of four big-endian u32s (`total_length`,
//! `key_length`, `value_length`, `sequence`) followed by the key bytes and
//! then the value bytes. `total_length` covers the header, so
//! `total_length == 16 + key_length + value_length` always holds.

use bytes::{Buf, BufMut, BytesMut};

use crate::{Error, Result};

/// Size of the record header.
pub const HEADER_SIZE: usize = 16;

/// Byte offset of the sequence field within the header.
const SEQUENCE_OFFSET: usize = 12;

/// An encoded record being prepared for append.
///
/// The sequence field is left zero at construction and patched in under the
/// store's write lock, immediately before the physical write.
#[derive(Debug, Clone)]
pub struct Record {
    buf: BytesMut,
    key_len: u32,
}

impl Record {
    /// Build a record from a key/value pair.
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self> {
        let total = HEADER_SIZE
            .checked_add(key.len())
            .and_then(|n| n.checked_add(value.len()))
            .filter(|n| *n <= u32::MAX as usize)
            .ok_or_else(|| Error::Format("record exceeds 32-bit length".into()))?;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u32(total as u32);
        buf.put_u32(key.len() as u32);
        buf.put_u32(value.len() as u32);
        buf.put_u32(0); // sequence, patched at write time
        buf.put_slice(key);
        buf.put_slice(value);

        Ok(Self {
            buf,
            key_len: key.len() as u32,
        })
    }

    /// Patch the sequence field.
    pub fn set_sequence(&mut self, sequence: u32) {
        self.buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4]
            .copy_from_slice(&sequence.to_be_bytes());
    }

    /// Total encoded size, header included.
    pub fn total_length(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Key length in bytes.
    pub fn key_length(&self) -> u32 {
        self.key_len
    }

    /// The encoded bytes, ready for a single bounded write.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Patch the sequence field of an already-encoded record buffer.
///
/// Used by the compactor when relocating a live record: the rewritten copy
/// carries the fresh sequence so that the on-disk header and the key index's
/// location stay in agreement for later passes.
pub fn patch_sequence(buf: &mut [u8], sequence: u32) {
    buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].copy_from_slice(&sequence.to_be_bytes());
}

/// A parsed view over an encoded record buffer.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    buf: &'a [u8],
    key_len: usize,
    value_len: usize,
    sequence: u32,
}

impl<'a> RecordView<'a> {
    /// Parse a full record from a raw buffer.
    ///
    /// The buffer must hold exactly one record; trailing bytes are a
    /// format error.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Format(format!(
                "record shorter than header: {} bytes",
                buf.len()
            )));
        }

        let mut header = buf;
        let total = header.get_u32() as usize;
        let key_len = header.get_u32() as usize;
        let value_len = header.get_u32() as usize;
        let sequence = header.get_u32();

        if total != HEADER_SIZE + key_len + value_len {
            return Err(Error::Format(format!(
                "inconsistent record header: total {} != 16 + {} + {}",
                total, key_len, value_len
            )));
        }

        if buf.len() != total {
            return Err(Error::Format(format!(
                "record buffer is {} bytes, header says {}",
                buf.len(),
                total
            )));
        }

        Ok(Self {
            buf,
            key_len,
            value_len,
            sequence,
        })
    }

    /// Total record size, header included.
    pub fn total_length(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Sequence number stored in the header.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The key bytes.
    pub fn key(&self) -> &'a [u8] {
        &self.buf[HEADER_SIZE..HEADER_SIZE + self.key_len]
    }

    /// The value bytes.
    pub fn value(&self) -> &'a [u8] {
        &self.buf[HEADER_SIZE + self.key_len..HEADER_SIZE + self.key_len + self.value_len]
    }
}
