// src/codec/mod.rs
//
// Byte-level reading and writing for module files.
//
// Integers in the format are mostly "packed": a signed 64-bit value stored in
// one to nine bytes depending on magnitude.
//
//   small   1 byte   value in -64..=127, stored as the signed byte itself
//   medium  2 bytes  0b100xxxxx + 1 byte, a 13-bit signed value
//   large   3-9      0b101nnnnn, then n+1 (2..=8) big-endian two's-complement bytes
//
// The lead byte 0xA0 (the "huge" form) is reserved and rejected on read.

use strata_identity::ConstantId;

use crate::errors::FormatError;
use crate::errors::format::at;

/// Number of bytes `value` occupies in packed form.
pub fn packed_len(value: i64) -> usize {
    if (-64..=127).contains(&value) {
        1
    } else if (-4096..=4095).contains(&value) {
        2
    } else {
        1 + significant_bytes(value)
    }
}

/// Bytes needed to hold `value` in two's complement, at least two.
fn significant_bytes(value: i64) -> usize {
    let redundant = if value < 0 {
        (!value).leading_zeros()
    } else {
        value.leading_zeros()
    };
    let bits = 65 - redundant as usize;
    bits.div_ceil(8).max(2)
}

/// Forward-only reader over a byte slice.
///
/// `base` is the absolute offset of the slice inside the original stream, so
/// errors raised while parsing a deferred child block still point at the right
/// place in the file.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn eof(&self, needed: usize) -> FormatError {
        FormatError::UnexpectedEof {
            needed: needed - self.remaining(),
            span: at(self.position()),
        }
    }

    pub fn peek_u8(&self) -> Result<u8, FormatError> {
        self.bytes.get(self.pos).copied().ok_or_else(|| self.eof(1))
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < len {
            return Err(self.eof(len));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_packed(&mut self) -> Result<i64, FormatError> {
        let start = self.position();
        let b = self.read_u8()?;

        if b & 0xC0 != 0x80 {
            return Ok(b as i8 as i64);
        }

        if b & 0xE0 == 0x80 {
            let high = ((b & 0x1F) as i64) << 59 >> 51;
            let low = self.read_u8()? as i64;
            return Ok(high | low);
        }

        let len = (b & 0x1F) as usize + 1;
        if !(2..=8).contains(&len) {
            return Err(FormatError::InvalidPackedInteger { span: at(start) });
        }
        let bytes = self.read_bytes(len)?;
        let mut value = bytes[0] as i8 as i64;
        for &byte in &bytes[1..] {
            value = (value << 8) | byte as i64;
        }
        Ok(value)
    }

    /// A packed count or length; must be in `0..=i32::MAX`.
    pub fn read_magnitude(&mut self) -> Result<usize, FormatError> {
        let start = self.position();
        let value = self.read_packed()?;
        if !(0..=i32::MAX as i64).contains(&value) {
            return Err(FormatError::InvalidMagnitude {
                value,
                span: at(start),
            });
        }
        Ok(value as usize)
    }

    /// A packed constant index, with -1 meaning "none".
    pub fn read_index(&mut self) -> Result<Option<u32>, FormatError> {
        let start = self.position();
        match self.read_packed()? {
            -1 => Ok(None),
            value if (0..=i32::MAX as i64).contains(&value) => Ok(Some(value as u32)),
            value => Err(FormatError::InvalidMagnitude {
                value,
                span: at(start),
            }),
        }
    }

    pub fn read_id(&mut self) -> Result<ConstantId, FormatError> {
        Ok(ConstantId::new(self.read_magnitude()? as u32))
    }

    pub fn read_opt_id(&mut self) -> Result<Option<ConstantId>, FormatError> {
        Ok(self.read_index()?.map(ConstantId::new))
    }

    /// A packed byte length followed by that many UTF-8 bytes.
    pub fn read_utf8(&mut self) -> Result<&'a str, FormatError> {
        let len = self.read_magnitude()?;
        let start = self.position();
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8 { span: at(start) })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_packed(&mut self, value: i64) {
        if (-64..=127).contains(&value) {
            self.buf.push(value as u8);
        } else if (-4096..=4095).contains(&value) {
            self.buf.push(0x80 | ((value >> 8) as u8 & 0x1F));
            self.buf.push(value as u8);
        } else {
            let len = significant_bytes(value);
            self.buf.push(0xA0 | (len as u8 - 1));
            self.buf.extend_from_slice(&value.to_be_bytes()[8 - len..]);
        }
    }

    pub fn write_magnitude(&mut self, value: usize) {
        debug_assert!(value <= i32::MAX as usize);
        self.write_packed(value as i64);
    }

    pub fn write_id(&mut self, id: ConstantId) {
        self.write_packed(id.index() as i64);
    }

    pub fn write_opt_id(&mut self, id: Option<ConstantId>) {
        self.write_packed(id.map_or(-1, |id| id.index() as i64));
    }

    pub fn write_utf8(&mut self, text: &str) {
        self.write_magnitude(text.len());
        self.buf.extend_from_slice(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: i64) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_packed(value);
        w.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<i64, FormatError> {
        ByteReader::new(bytes).read_packed()
    }

    #[test]
    fn form_boundaries() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(127), [0x7F]);
        assert_eq!(encode(-64), [0xC0]);
        assert_eq!(encode(-1), [0xFF]);
        assert_eq!(encode(128), [0x80, 0x80]);
        assert_eq!(encode(-65), [0x9F, 0xBF]);
        assert_eq!(encode(4095), [0x8F, 0xFF]);
        assert_eq!(encode(-4096), [0x90, 0x00]);
        assert_eq!(encode(4096), [0xA1, 0x10, 0x00]);
    }

    #[test]
    fn lengths_match_encoding() {
        for value in [0, 127, 128, -64, -65, 4095, 4096, -4097, 1 << 40, i64::MAX, i64::MIN] {
            assert_eq!(packed_len(value), encode(value).len(), "value {value}");
        }
        assert_eq!(packed_len(i64::MIN), 9);
    }

    #[test]
    fn decodes_extremes() {
        for value in [i64::MIN, i64::MAX, -4097, 65_536, -100, 200] {
            assert_eq!(decode(&encode(value)).unwrap(), value);
        }
    }

    #[test]
    fn huge_form_is_rejected() {
        let err = decode(&[0xA0, 0x01]).unwrap_err();
        assert!(matches!(err, FormatError::InvalidPackedInteger { .. }));
    }

    #[test]
    fn oversized_large_form_is_rejected() {
        let err = decode(&[0xBF]).unwrap_err();
        assert!(matches!(err, FormatError::InvalidPackedInteger { .. }));
    }

    #[test]
    fn truncation_reports_offset() {
        let err = ByteReader::with_base(&[0xA3, 0x01], 40).read_packed().unwrap_err();
        match err {
            FormatError::UnexpectedEof { needed, span } => {
                assert_eq!(needed, 3);
                assert_eq!(span.offset(), 41);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn magnitude_rejects_negative_and_oversized() {
        assert!(ByteReader::new(&encode(-2)).read_magnitude().is_err());
        assert!(ByteReader::new(&encode(i32::MAX as i64 + 1)).read_magnitude().is_err());
        assert_eq!(ByteReader::new(&encode(i32::MAX as i64)).read_magnitude().unwrap(), i32::MAX as usize);
    }

    #[test]
    fn index_minus_one_is_none() {
        let mut w = ByteWriter::new();
        w.write_opt_id(None);
        w.write_opt_id(Some(ConstantId::new(300)));
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_opt_id().unwrap(), None);
        assert_eq!(r.read_opt_id().unwrap(), Some(ConstantId::new(300)));
        assert!(r.is_empty());
    }

    #[test]
    fn strings_and_fixed_width() {
        let mut w = ByteWriter::new();
        w.write_u32(0xEC57_A5EE);
        w.write_u16(7);
        w.write_utf8("módulo");
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 0xEC57_A5EE);
        assert_eq!(r.read_u16().unwrap(), 7);
        assert_eq!(r.read_utf8().unwrap(), "módulo");
    }

    #[test]
    fn bad_utf8_is_reported() {
        let err = ByteReader::new(&[0x02, 0xC3, 0x28]).read_utf8().unwrap_err();
        assert!(matches!(err, FormatError::InvalidUtf8 { .. }));
    }
}
