//! Big-endian cursor over class-file bytes.

use super::{ClassFileError, ClassFileErrorKind};

pub(crate) struct ByteReader<'a> {
    input: &'a [u8],
    pos: usize,
    /// Offset of `input` within the whole class file, for error positions.
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            base: 0,
        }
    }

    pub(crate) const fn position(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn error(&self, kind: ClassFileErrorKind) -> ClassFileError {
        ClassFileError {
            kind,
            pos: self.position(),
        }
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        if self.input.len() - self.pos < len {
            return Err(self.error(ClassFileErrorKind::UnexpectedEof));
        }
        let bytes = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// A reader over the next `len` bytes, advancing past them.
    pub(crate) fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>, ClassFileError> {
        let base = self.position();
        let input = self.bytes(len)?;
        Ok(ByteReader {
            input,
            pos: 0,
            base,
        })
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.bytes(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) const fn is_at_end(&self) -> bool {
        self.pos == self.input.len()
    }
}

/// Decode the "modified UTF-8" used by `CONSTANT_Utf8` entries.
///
/// It differs from UTF-8 in encoding U+0000 as two bytes and supplementary
/// characters as surrogate pairs, so well-formed UTF-8 is tried first and the
/// slow path rebuilds UTF-16 code units.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = core::str::from_utf8(bytes) {
        return Some(s.to_string());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        match bytes[i] {
            0x01..=0x7f => {
                units.push(b0);
                i += 1;
            }
            0xc0..=0xdf => {
                let b1 = *bytes.get(i + 1)? as u16;
                units.push(((b0 & 0x1f) << 6) | (b1 & 0x3f));
                i += 2;
            }
            0xe0..=0xef => {
                let b1 = *bytes.get(i + 1)? as u16;
                let b2 = *bytes.get(i + 2)? as u16;
                units.push(((b0 & 0x0f) << 12) | ((b1 & 0x3f) << 6) | (b2 & 0x3f));
                i += 3;
            }
            _ => return None,
        }
    }
    String::from_utf16(&units).ok()
}
