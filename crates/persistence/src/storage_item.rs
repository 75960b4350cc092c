//! Storage items: value bytes plus a read-only flag.

use crate::error::{PersistenceError, PersistenceResult};

/// A value held in contract storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageItem {
    pub value: Vec<u8>,
    /// Read-only items reject Put and Delete.
    pub read_only: bool,
}

impl StorageItem {
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            read_only: false,
        }
    }

    pub fn read_only(value: Vec<u8>) -> Self {
        Self {
            value,
            read_only: true,
        }
    }

    /// Stored form: the value with a one-byte read-only suffix.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.value.len() + 1);
        out.extend_from_slice(&self.value);
        out.push(u8::from(self.read_only));
        out
    }

    /// Parses the stored form.
    pub fn from_bytes(data: &[u8]) -> PersistenceResult<Self> {
        let (flag, value) = data
            .split_last()
            .ok_or_else(|| PersistenceError::InvalidData("empty storage item".to_string()))?;
        let read_only = match flag {
            0 => false,
            1 => true,
            other => {
                return Err(PersistenceError::InvalidData(format!(
                    "invalid read-only flag {other}"
                )))
            }
        };
        Ok(Self {
            value: value.to_vec(),
            read_only,
        })
    }
}

impl From<Vec<u8>> for StorageItem {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for item in [
            StorageItem::new(vec![1, 2, 3]),
            StorageItem::read_only(vec![]),
        ] {
            assert_eq!(StorageItem::from_bytes(&item.to_bytes()).unwrap(), item);
        }
    }

    #[test]
    fn empty_bytes_rejected() {
        assert!(StorageItem::from_bytes(&[]).is_err());
    }

    #[test]
    fn bad_flag_rejected() {
        assert!(StorageItem::from_bytes(&[0x01, 0x02]).is_err());
    }
}
