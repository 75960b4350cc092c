//! Deployed contract state: NEF file plus manifest.

use crate::error::{ContractError, ContractResult};
use crate::manifest::ContractManifest;
use neo3_core::UInt160;
use neo3_cryptography::hash256;
use neo3_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable, SerializableExt};
use serde::{Deserialize, Serialize};

/// "NEF3" little-endian.
pub const NEF_MAGIC: u32 = 0x3346454e;

/// Maximum NEF script size.
pub const MAX_NEF_SCRIPT_SIZE: usize = 512 * 1024;

/// A compiled contract container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NefFile {
    pub compiler: String,
    pub source: String,
    pub script: Vec<u8>,
    pub checksum: u32,
}

impl NefFile {
    /// Builds a NEF with a freshly computed checksum.
    pub fn new(compiler: &str, script: Vec<u8>) -> ContractResult<Self> {
        if script.is_empty() || script.len() > MAX_NEF_SCRIPT_SIZE {
            return Err(ContractError::InvalidArgument(format!(
                "invalid NEF script length {}",
                script.len()
            )));
        }
        let mut nef = Self {
            compiler: compiler.to_string(),
            source: String::new(),
            script,
            checksum: 0,
        };
        nef.checksum = nef.compute_checksum()?;
        Ok(nef)
    }

    /// Double SHA-256 over the header and script, first four bytes LE.
    pub fn compute_checksum(&self) -> ContractResult<u32> {
        let mut writer = BinaryWriter::new();
        self.serialize_without_checksum(&mut writer)?;
        let digest = hash256(writer.as_slice());
        Ok(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    fn serialize_without_checksum(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(NEF_MAGIC)?;
        // Fixed 64-byte compiler field, zero padded.
        let mut compiler = [0u8; 64];
        let bytes = self.compiler.as_bytes();
        let len = bytes.len().min(64);
        compiler[..len].copy_from_slice(&bytes[..len]);
        writer.write_bytes(&compiler)?;
        writer.write_var_string(&self.source)?;
        // Reserved byte and empty method-token table.
        writer.write_byte(0)?;
        writer.write_var_int(0)?;
        writer.write_u16(0)?;
        writer.write_var_bytes(&self.script)
    }

    /// Validates the embedded checksum.
    pub fn verify_checksum(&self) -> ContractResult<()> {
        if self.compute_checksum()? != self.checksum {
            return Err(ContractError::InvalidArgument(
                "NEF checksum mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

impl Serializable for NefFile {
    fn size(&self) -> usize {
        // Magic + compiler + source + reserved + tokens + reserved + script + checksum.
        4 + 64
            + neo3_io::helper::get_var_bytes_size(self.source.as_bytes())
            + 1
            + 1
            + 2
            + neo3_io::helper::get_var_bytes_size(&self.script)
            + 4
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_without_checksum(writer)?;
        writer.write_u32(self.checksum)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(IoError::invalid_data("NEF magic", &format!("{magic:#x}")));
        }
        let compiler_bytes = reader.read_bytes(64)?;
        let compiler = String::from_utf8_lossy(&compiler_bytes)
            .trim_end_matches('\0')
            .to_string();
        let source = reader.read_var_string(256)?;
        let _reserved = reader.read_byte()?;
        let token_count = reader.read_var_int(128)?;
        if token_count != 0 {
            return Err(IoError::invalid_data(
                "NEF method tokens are not supported",
                &token_count.to_string(),
            ));
        }
        let _reserved2 = reader.read_u16()?;
        let script = reader.read_var_bytes(MAX_NEF_SCRIPT_SIZE)?;
        if script.is_empty() {
            return Err(IoError::invalid_data("NEF script", "empty"));
        }
        let checksum = reader.read_u32()?;
        Ok(Self {
            compiler,
            source,
            script,
            checksum,
        })
    }
}

/// A deployed (or native) contract as stored by ContractManagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub id: i32,
    pub update_counter: u16,
    pub hash: UInt160,
    pub nef: NefFile,
    pub manifest: ContractManifest,
}

impl ContractState {
    /// Serializes for storage (NEF bytes + manifest JSON).
    pub fn to_storage_bytes(&self) -> ContractResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        writer.write_i32(self.id)?;
        writer.write_u16(self.update_counter)?;
        self.hash.serialize(&mut writer)?;
        writer.write_var_bytes(&self.nef.to_array()?)?;
        writer.write_var_bytes(&self.manifest.to_json_bytes()?)?;
        Ok(writer.to_bytes())
    }

    /// Parses the storage form.
    pub fn from_storage_bytes(data: &[u8]) -> ContractResult<Self> {
        let mut reader = MemoryReader::new(data);
        let id = reader.read_i32()?;
        let update_counter = reader.read_u16()?;
        let hash = UInt160::deserialize(&mut reader)?;
        let nef_bytes = reader.read_var_bytes(MAX_NEF_SCRIPT_SIZE + 1024)?;
        let nef = NefFile::from_array(&nef_bytes)?;
        let manifest_bytes = reader.read_var_bytes(crate::manifest::MAX_MANIFEST_SIZE)?;
        let manifest = ContractManifest::from_json_bytes(&manifest_bytes)?;
        Ok(Self {
            id,
            update_counter,
            hash,
            nef,
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MethodDescriptor;

    fn sample_state() -> ContractState {
        let nef = NefFile::new("neo-core-v3.0", vec![0x11, 0x40]).unwrap();
        let mut manifest = ContractManifest::new("Sample");
        manifest.abi.methods.push(MethodDescriptor {
            name: "main".to_string(),
            parameters: vec![],
            offset: 0,
            return_type: "Integer".to_string(),
            safe: true,
        });
        ContractState {
            id: 1,
            update_counter: 0,
            hash: UInt160::from_script(&[0x11, 0x40]),
            nef,
            manifest,
        }
    }

    #[test]
    fn nef_round_trip_and_checksum() {
        let nef = NefFile::new("test-compiler", vec![1, 2, 3]).unwrap();
        nef.verify_checksum().unwrap();
        let bytes = nef.to_array().unwrap();
        let parsed = NefFile::from_array(&bytes).unwrap();
        assert_eq!(parsed, nef);
        parsed.verify_checksum().unwrap();
    }

    #[test]
    fn tampered_script_fails_checksum() {
        let mut nef = NefFile::new("test-compiler", vec![1, 2, 3]).unwrap();
        nef.script[0] = 9;
        assert!(nef.verify_checksum().is_err());
    }

    #[test]
    fn state_round_trips_through_storage_form() {
        let state = sample_state();
        let bytes = state.to_storage_bytes().unwrap();
        let parsed = ContractState::from_storage_bytes(&bytes).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn empty_nef_script_rejected() {
        assert!(NefFile::new("c", vec![]).is_err());
    }
}
