//! Storage contexts handed to contracts by System.Storage.GetContext.

/// A capability to read (and possibly write) one contract's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageContext {
    /// The owning contract's id.
    pub id: i32,
    /// Read-only contexts reject Put and Delete.
    pub is_read_only: bool,
}

impl StorageContext {
    pub fn new(id: i32, is_read_only: bool) -> Self {
        Self { id, is_read_only }
    }

    /// A read-only view of the same storage.
    pub fn as_read_only(&self) -> Self {
        Self {
            id: self.id,
            is_read_only: true,
        }
    }
}

/// Options controlling System.Storage.Find results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindOptions(pub u8);

impl FindOptions {
    pub const NONE: Self = Self(0);
    /// Yield keys only.
    pub const KEYS_ONLY: Self = Self(0x01);
    /// Strip the search prefix from yielded keys.
    pub const REMOVE_PREFIX: Self = Self(0x02);
    /// Yield values only.
    pub const VALUES_ONLY: Self = Self(0x04);
    /// Deserialize values as stack items.
    pub const DESERIALIZE_VALUES: Self = Self(0x08);
    /// With DeserializeValues, yield field 0 of each value.
    pub const PICK_FIELD_0: Self = Self(0x10);
    /// With DeserializeValues, yield field 1 of each value.
    pub const PICK_FIELD_1: Self = Self(0x20);
    /// Iterate backwards.
    pub const BACKWARDS: Self = Self(0x80);

    const ALL: u8 = 0x01 | 0x02 | 0x04 | 0x08 | 0x10 | 0x20 | 0x80;

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub fn contains(&self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_downgrade_keeps_id() {
        let context = StorageContext::new(7, false);
        let read_only = context.as_read_only();
        assert_eq!(read_only.id, 7);
        assert!(read_only.is_read_only);
    }

    #[test]
    fn find_options_validate_bits() {
        assert!(FindOptions::from_bits(0x40).is_none());
        let options = FindOptions::from_bits(0x03).unwrap();
        assert!(options.contains(FindOptions::KEYS_ONLY));
        assert!(options.contains(FindOptions::REMOVE_PREFIX));
        assert!(!options.contains(FindOptions::VALUES_ONLY));
    }
}
