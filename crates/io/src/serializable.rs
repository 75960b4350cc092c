//! Serialization traits for Neo objects.

use crate::{BinaryWriter, IoResult, MemoryReader};

/// Represents NEO objects that can be serialized to the deterministic
/// binary wire format.
pub trait Serializable {
    /// The size of the object in bytes after serialization.
    fn size(&self) -> usize;

    /// Serializes the object using the specified writer.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Deserializes the object using the specified reader.
    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self>
    where
        Self: Sized;
}

/// Extension methods for serializable objects.
pub trait SerializableExt: Serializable {
    /// Converts the object to a byte array.
    fn to_array(&self) -> IoResult<Vec<u8>> {
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.serialize(&mut writer)?;
        Ok(writer.to_bytes())
    }

    /// Creates an object from a byte array, requiring that all input
    /// bytes are consumed.
    fn from_array(data: &[u8]) -> IoResult<Self>
    where
        Self: Sized,
    {
        let mut reader = MemoryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(crate::IoError::invalid_data(
                "trailing bytes after deserialization",
                &reader.remaining().to_string(),
            ));
        }
        Ok(value)
    }
}

impl<T: Serializable> SerializableExt for T {}

/// Helper functions for serializing collections.
pub mod helper {
    use super::Serializable;
    use crate::{BinaryWriter, IoResult, MemoryReader};

    /// Serializes a length-prefixed collection.
    pub fn serialize_array<T: Serializable>(
        items: &[T],
        writer: &mut BinaryWriter,
    ) -> IoResult<()> {
        writer.write_var_int(items.len() as u64)?;
        for item in items {
            item.serialize(writer)?;
        }
        Ok(())
    }

    /// Deserializes a length-prefixed collection of at most `max` items.
    pub fn deserialize_array<T: Serializable>(
        reader: &mut MemoryReader<'_>,
        max: usize,
    ) -> IoResult<Vec<T>> {
        let count = reader.read_var_int(max as u64)? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::deserialize(reader)?);
        }
        Ok(items)
    }

    /// Gets the serialized size of a length-prefixed collection.
    pub fn get_array_size<T: Serializable>(items: &[T]) -> usize {
        get_var_size(items.len() as u64) + items.iter().map(Serializable::size).sum::<usize>()
    }

    /// Gets the encoded size of a variable-length integer.
    pub fn get_var_size(value: u64) -> usize {
        if value < 0xFD {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Gets the encoded size of a length-prefixed byte slice.
    pub fn get_var_bytes_size(value: &[u8]) -> usize {
        get_var_size(value.len() as u64) + value.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoError;

    #[derive(Debug, PartialEq)]
    struct Pair(u16, u16);

    impl Serializable for Pair {
        fn size(&self) -> usize {
            4
        }

        fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
            writer.write_u16(self.0)?;
            writer.write_u16(self.1)
        }

        fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
            Ok(Pair(reader.read_u16()?, reader.read_u16()?))
        }
    }

    #[test]
    fn to_array_from_array_round_trip() {
        let pair = Pair(7, 9);
        let bytes = pair.to_array().unwrap();
        assert_eq!(bytes.len(), pair.size());
        assert_eq!(Pair::from_array(&bytes).unwrap(), pair);
    }

    #[test]
    fn from_array_rejects_trailing_bytes() {
        let mut bytes = Pair(1, 2).to_array().unwrap();
        bytes.push(0);
        assert!(matches!(
            Pair::from_array(&bytes),
            Err(IoError::InvalidData { .. })
        ));
    }

    #[test]
    fn array_helpers_round_trip() {
        let items = vec![Pair(1, 2), Pair(3, 4)];
        let mut writer = BinaryWriter::new();
        helper::serialize_array(&items, &mut writer).unwrap();
        assert_eq!(writer.len(), helper::get_array_size(&items));

        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        let parsed: Vec<Pair> = helper::deserialize_array(&mut reader, 16).unwrap();
        assert_eq!(parsed, items);
    }
}
