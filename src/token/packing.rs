//! Binary packing primitives shared by both token formats
//!
//! Everything is little-endian. Byte strings carry a `u16` length prefix,
//! maps carry a `u16` entry count followed by key/value pairs in iteration
//! order.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    MalformedLength { declared: usize, remaining: usize },

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("byte string of {0} bytes does not fit a u16 length prefix")]
    Oversized(usize),
}

/// Append-only writer
#[derive(Debug, Default, Clone)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Length-prefixed byte string
    pub fn bytes(&mut self, v: &[u8]) -> Result<&mut Self, PackError> {
        let len = u16::try_from(v.len()).map_err(|_| PackError::Oversized(v.len()))?;
        self.u16(len);
        self.buf.extend_from_slice(v);
        Ok(self)
    }

    pub fn string(&mut self, v: &str) -> Result<&mut Self, PackError> {
        self.bytes(v.as_bytes())
    }

    /// `u16 -> u32` map, written in ascending key order
    pub fn map_u32(&mut self, map: &BTreeMap<u16, u32>) -> Result<&mut Self, PackError> {
        let count = u16::try_from(map.len()).map_err(|_| PackError::Oversized(map.len()))?;
        self.u16(count);
        for (k, v) in map {
            self.u16(*k).u32(*v);
        }
        Ok(self)
    }

    /// Raw bytes with no prefix
    pub fn raw(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub fn pack_u16(v: u16) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

pub fn pack_u32(v: u32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

pub fn pack_string(s: &str) -> Result<Vec<u8>, PackError> {
    let mut p = Packer::with_capacity(2 + s.len());
    p.string(s)?;
    Ok(p.finish())
}

pub fn pack_map(map: &BTreeMap<u16, u32>) -> Result<Vec<u8>, PackError> {
    let mut p = Packer::with_capacity(2 + map.len() * 6);
    p.map_u32(map)?;
    Ok(p.finish())
}

/// Cursor over a borrowed buffer
#[derive(Debug, Clone)]
pub struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        if self.remaining() < n {
            return Err(PackError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16, PackError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, PackError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], PackError> {
        let declared = self.u16()? as usize;
        if declared > self.remaining() {
            return Err(PackError::MalformedLength {
                declared,
                remaining: self.remaining(),
            });
        }
        self.take(declared)
    }

    pub fn string(&mut self) -> Result<String, PackError> {
        let raw = self.bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| PackError::InvalidUtf8)
    }

    pub fn map_u32(&mut self) -> Result<BTreeMap<u16, u32>, PackError> {
        let count = self.u16()? as usize;
        // each entry is 6 bytes; reject counts the buffer cannot hold
        if count * 6 > self.remaining() {
            return Err(PackError::MalformedLength {
                declared: count * 6,
                remaining: self.remaining(),
            });
        }
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let k = self.u16()?;
            let v = self.u32()?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(pack_u16(0x0102), vec![0x02, 0x01]);
        assert_eq!(pack_u32(0x0102_0304), vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(pack_string("ab").unwrap(), vec![2, 0, b'a', b'b']);
    }

    #[test]
    fn test_map_round_trip() {
        let mut map = BTreeMap::new();
        map.insert(4, 1_700_000_000);
        map.insert(1, 1_700_003_600);
        map.insert(1000, 0);

        let packed = pack_map(&map).unwrap();
        assert_eq!(packed.len(), 2 + 3 * 6);
        // ascending key order regardless of insertion order
        assert_eq!(&packed[2..4], &1u16.to_le_bytes());

        let mut u = Unpacker::new(&packed);
        assert_eq!(u.map_u32().unwrap(), map);
        assert!(u.is_exhausted());
    }

    #[test]
    fn test_mixed_sequence_round_trip() {
        let mut p = Packer::new();
        p.u32(7).u16(9);
        p.string("room42").unwrap();
        p.bytes(&[0xde, 0xad]).unwrap();
        let buf = p.finish();

        let mut u = Unpacker::new(&buf);
        assert_eq!(u.u32().unwrap(), 7);
        assert_eq!(u.u16().unwrap(), 9);
        assert_eq!(u.string().unwrap(), "room42");
        assert_eq!(u.bytes().unwrap(), &[0xde, 0xad]);
        assert!(u.is_exhausted());
    }

    #[test]
    fn test_truncated() {
        let mut u = Unpacker::new(&[1, 2, 3]);
        assert_eq!(
            u.u32(),
            Err(PackError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_declared_length_too_long() {
        let mut u = Unpacker::new(&[10, 0, b'a', b'b']);
        assert_eq!(
            u.bytes(),
            Err(PackError::MalformedLength {
                declared: 10,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_map_count_too_large() {
        let mut u = Unpacker::new(&[0xff, 0xff, 1, 0]);
        assert!(matches!(
            u.map_u32(),
            Err(PackError::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut u = Unpacker::new(&[2, 0, 0xff, 0xfe]);
        assert_eq!(u.string(), Err(PackError::InvalidUtf8));
    }

    #[test]
    fn test_oversized_bytes() {
        let big = vec![0u8; u16::MAX as usize + 1];
        let mut p = Packer::new();
        assert_eq!(p.bytes(&big).unwrap_err(), PackError::Oversized(big.len()));
    }
}
