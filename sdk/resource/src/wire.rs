//! Wire Encoding
//!
//! Fixed, big-endian binary layout shared by commitment derivation, proof
//! verification, transmission and storage.
//!
//! ```text
//! Resource   := owner[32] | label_len:u32 | label[label_len] | quantity:u64 | nonce[32]
//! Commitment := [32]
//! Nullifier  := tag[32] | authorization[64]
//! ```

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

/// Longest label accepted on the wire.
pub const MAX_LABEL_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("input truncated")]
    Truncated,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u16),
    #[error("unknown proof kind {0}")]
    UnknownProofKind(u8),
    #[error("label of {0} bytes exceeds the {max} byte limit", max = MAX_LABEL_LEN)]
    LabelTooLong(usize),
    #[error("label is not valid UTF-8")]
    InvalidLabel,
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Types with a canonical wire encoding.
pub trait WireEncode {
    fn encode_to(&self, out: &mut Vec<u8>);

    fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }
}

pub trait WireDecode: Sized {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError>;

    /// Decodes a complete message, rejecting trailing bytes.
    fn from_wire(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Writes a `u32` count. Lengths past `u32::MAX` cannot be represented.
pub fn put_len(out: &mut Vec<u8>, len: usize) {
    put_u32(out, u32::try_from(len).unwrap_or(u32::MAX));
}

/// Cursor over an encoded message.
pub struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        (len - self.cursor.position().min(len)) as usize
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.cursor.read_u8().map_err(|_| WireError::Truncated)
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| WireError::Truncated)
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| WireError::Truncated)
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| WireError::Truncated)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut arr = [0u8; N];
        self.cursor
            .read_exact(&mut arr)
            .map_err(|_| WireError::Truncated)?;
        Ok(arr)
    }

    /// Reads `len` raw bytes, checking the length against the remaining
    /// input before allocating.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        if len > self.remaining() {
            return Err(WireError::Truncated);
        }
        let mut buf = vec![0u8; len];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| WireError::Truncated)?;
        Ok(buf)
    }

    /// Reads a `u32` element count. Each element occupies at least
    /// `min_item_len` bytes, so counts the input cannot hold are rejected
    /// up front.
    pub fn read_count(&mut self, min_item_len: usize) -> Result<usize, WireError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_item_len) > self.remaining() {
            return Err(WireError::Truncated);
        }
        Ok(count)
    }

    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_big_endian() {
        let mut out = Vec::new();
        put_u16(&mut out, 0x0102);
        put_u32(&mut out, 0x03040506);
        put_u64(&mut out, 7);
        assert_eq!(&out[..6], &[1, 2, 3, 4, 5, 6]);

        let mut r = WireReader::new(&out);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_u32().unwrap(), 0x03040506);
        assert_eq!(r.read_u64().unwrap(), 7);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_reader_truncated() {
        let mut r = WireReader::new(&[0, 1]);
        assert_eq!(r.read_u32(), Err(WireError::Truncated));

        let mut r = WireReader::new(&[1, 2, 3]);
        assert_eq!(r.read_vec(4), Err(WireError::Truncated));
    }

    #[test]
    fn test_count_bounded_by_input() {
        let mut out = Vec::new();
        put_u32(&mut out, u32::MAX);
        let mut r = WireReader::new(&out);
        assert_eq!(r.read_count(32), Err(WireError::Truncated));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut r = WireReader::new(&[9, 9, 9]);
        r.read_u8().unwrap();
        assert_eq!(r.finish(), Err(WireError::TrailingBytes(2)));
    }
}
