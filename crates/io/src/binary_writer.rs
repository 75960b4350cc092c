//! Binary writer for serializing Neo data structures.

use crate::{IoResult, Serializable};
use bytes::{BufMut, BytesMut};

/// A writer that serializes Neo data structures to a growable buffer.
///
/// All multi-byte integers are written little-endian.
pub struct BinaryWriter {
    buffer: BytesMut,
}

impl BinaryWriter {
    /// Creates a new binary writer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Creates a new binary writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) -> IoResult<()> {
        self.buffer.put_u8(value);
        Ok(())
    }

    /// Writes a raw byte slice with no length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> IoResult<()> {
        self.buffer.put_slice(value);
        Ok(())
    }

    /// Writes a boolean as a single byte (1 or 0).
    pub fn write_bool(&mut self, value: bool) -> IoResult<()> {
        self.write_byte(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> IoResult<()> {
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> IoResult<()> {
        self.buffer.put_u32_le(value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> IoResult<()> {
        self.buffer.put_u64_le(value);
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> IoResult<()> {
        self.buffer.put_i8(value);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> IoResult<()> {
        self.buffer.put_i16_le(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> IoResult<()> {
        self.buffer.put_i32_le(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> IoResult<()> {
        self.buffer.put_i64_le(value);
        Ok(())
    }

    /// Writes a variable-length integer.
    ///
    /// Values below 0xFD are written inline; larger values get a one-byte
    /// width prefix (0xFD: u16, 0xFE: u32, 0xFF: u64).
    pub fn write_var_int(&mut self, value: u64) -> IoResult<()> {
        if value < 0xFD {
            self.write_byte(value as u8)
        } else if value <= 0xFFFF {
            self.write_byte(0xFD)?;
            self.write_u16(value as u16)
        } else if value <= 0xFFFF_FFFF {
            self.write_byte(0xFE)?;
            self.write_u32(value as u32)
        } else {
            self.write_byte(0xFF)?;
            self.write_u64(value)
        }
    }

    /// Writes a length-prefixed byte slice.
    pub fn write_var_bytes(&mut self, value: &[u8]) -> IoResult<()> {
        self.write_var_int(value.len() as u64)?;
        self.write_bytes(value)
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_var_string(&mut self, value: &str) -> IoResult<()> {
        self.write_var_bytes(value.as_bytes())
    }

    /// Writes a serializable object.
    pub fn write_serializable<T: Serializable>(&mut self, value: &T) -> IoResult<()> {
        value.serialize(self)
    }

    /// Writes a length-prefixed array of serializable objects.
    pub fn write_serializable_array<T: Serializable>(&mut self, items: &[T]) -> IoResult<()> {
        self.write_var_int(items.len() as u64)?;
        for item in items {
            item.serialize(self)?;
        }
        Ok(())
    }

    /// Consumes the writer and returns the written bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Returns the written bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian_integers() {
        let mut writer = BinaryWriter::new();
        writer.write_u32(0x0102_0304).unwrap();
        assert_eq!(writer.to_bytes(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn var_int_width_selection() {
        for (value, expected) in [
            (0x00u64, vec![0x00]),
            (0xFC, vec![0xFC]),
            (0xFD, vec![0xFD, 0xFD, 0x00]),
            (0xFFFF, vec![0xFD, 0xFF, 0xFF]),
            (0x10000, vec![0xFE, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ] {
            let mut writer = BinaryWriter::new();
            writer.write_var_int(value).unwrap();
            assert_eq!(writer.to_bytes(), expected, "value {value:#x}");
        }
    }

    #[test]
    fn var_bytes_prefixes_length() {
        let mut writer = BinaryWriter::new();
        writer.write_var_bytes(b"neo").unwrap();
        assert_eq!(writer.to_bytes(), vec![3, b'n', b'e', b'o']);
    }

    proptest::proptest! {
        #[test]
        fn var_int_round_trip(value in proptest::prelude::any::<u64>()) {
            let mut writer = BinaryWriter::new();
            writer.write_var_int(value).unwrap();
            let bytes = writer.to_bytes();
            let mut reader = crate::MemoryReader::new(&bytes);
            proptest::prop_assert_eq!(reader.read_var_int(u64::MAX).unwrap(), value);
            proptest::prop_assert_eq!(reader.remaining(), 0);
        }

        #[test]
        fn var_bytes_round_trip(data in proptest::collection::vec(
            proptest::prelude::any::<u8>(), 0..512,
        )) {
            let mut writer = BinaryWriter::new();
            writer.write_var_bytes(&data).unwrap();
            let bytes = writer.to_bytes();
            let mut reader = crate::MemoryReader::new(&bytes);
            proptest::prop_assert_eq!(reader.read_var_bytes(512).unwrap(), data);
        }
    }
}
