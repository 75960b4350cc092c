//! Memory reader for deserializing Neo data structures.

use crate::error::{IoError, IoResult};

/// A reader over an in-memory byte slice.
///
/// Every read is bounds-checked; var-int reads additionally reject
/// non-canonical encodings so that serialization stays bijective.
pub struct MemoryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    /// Creates a new reader over the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position in the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the input.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the input is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn ensure(&self, count: usize, context: &str) -> IoResult<()> {
        if self.remaining() < count {
            return Err(IoError::end_of_stream(count - self.remaining(), context));
        }
        Ok(())
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> IoResult<u8> {
        self.ensure(1, "u8")?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Reads `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> IoResult<Vec<u8>> {
        self.ensure(count, "bytes")?;
        let value = self.data[self.pos..self.pos + count].to_vec();
        self.pos += count;
        Ok(value)
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        self.ensure(N, "array")?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Reads a boolean; any value other than 0 or 1 is invalid.
    pub fn read_bool(&mut self) -> IoResult<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(IoError::invalid_data("bool", &other.to_string())),
        }
    }

    pub fn read_u16(&mut self) -> IoResult<u16> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> IoResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> IoResult<u64> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_byte()? as i8)
    }

    pub fn read_i16(&mut self) -> IoResult<i16> {
        Ok(i16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_i32(&mut self) -> IoResult<i32> {
        Ok(i32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_i64(&mut self) -> IoResult<i64> {
        Ok(i64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Reads a variable-length integer, rejecting values above `max` and
    /// non-canonical encodings.
    pub fn read_var_int(&mut self, max: u64) -> IoResult<u64> {
        let prefix = self.read_byte()?;
        let value = match prefix {
            0xFD => {
                let v = self.read_u16()? as u64;
                if v < 0xFD {
                    return Err(IoError::NonCanonicalVarInt { value: v, prefix });
                }
                v
            }
            0xFE => {
                let v = self.read_u32()? as u64;
                if v <= 0xFFFF {
                    return Err(IoError::NonCanonicalVarInt { value: v, prefix });
                }
                v
            }
            0xFF => {
                let v = self.read_u64()?;
                if v <= 0xFFFF_FFFF {
                    return Err(IoError::NonCanonicalVarInt { value: v, prefix });
                }
                v
            }
            inline => inline as u64,
        };
        if value > max {
            return Err(IoError::ExceedsMaximum {
                context: "var_int".to_string(),
                actual: value,
                max,
            });
        }
        Ok(value)
    }

    /// Reads a length-prefixed byte array of at most `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> IoResult<Vec<u8>> {
        let len = self.read_var_int(max as u64)? as usize;
        self.read_bytes(len)
    }

    /// Reads a length-prefixed UTF-8 string of at most `max` bytes.
    pub fn read_var_string(&mut self, max: usize) -> IoResult<String> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes)
            .map_err(|e| IoError::invalid_data("utf8 string", &e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryWriter;

    #[test]
    fn round_trips_integers() {
        let mut writer = BinaryWriter::new();
        writer.write_u16(0xBEEF).unwrap();
        writer.write_i64(-42).unwrap();
        let bytes = writer.to_bytes();

        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i64().unwrap(), -42);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn rejects_non_canonical_var_int() {
        // 0x20 must be encoded inline, not as a u16.
        let bytes = [0xFD, 0x20, 0x00];
        let mut reader = MemoryReader::new(&bytes);
        assert!(matches!(
            reader.read_var_int(u64::MAX),
            Err(IoError::NonCanonicalVarInt { value: 0x20, .. })
        ));
    }

    #[test]
    fn rejects_var_int_above_max() {
        let bytes = [0xFC];
        let mut reader = MemoryReader::new(&bytes);
        assert!(matches!(
            reader.read_var_int(0x10),
            Err(IoError::ExceedsMaximum { .. })
        ));
    }

    #[test]
    fn rejects_truncated_reads() {
        let mut reader = MemoryReader::new(&[0x01]);
        assert!(reader.read_u32().is_err());
    }

    #[test]
    fn bool_rejects_nonzero_nonone() {
        let mut reader = MemoryReader::new(&[0x02]);
        assert!(reader.read_bool().is_err());
    }
}
