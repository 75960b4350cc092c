//! Witnesses: the invocation/verification script pair satisfying a signer.

use crate::uint160::UInt160;
use neo3_io::{helper, BinaryWriter, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};

/// Maximum size of an invocation script in bytes.
pub const MAX_INVOCATION_SCRIPT: usize = 1024;
/// Maximum size of a verification script in bytes.
pub const MAX_VERIFICATION_SCRIPT: usize = 1024;

/// The executable proof attached to a signer.
///
/// Verification runs `invocation_script ++ verification_script` on a fresh
/// VM; the verification script's hash160 must equal the signer's account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

impl Witness {
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }

    /// An empty witness, used when another contract supplies verification.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The script hash the witness answers for.
    pub fn script_hash(&self) -> UInt160 {
        UInt160::from_script(&self.verification_script)
    }
}

impl Serializable for Witness {
    fn size(&self) -> usize {
        helper::get_var_bytes_size(&self.invocation_script)
            + helper::get_var_bytes_size(&self.verification_script)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.invocation_script)?;
        writer.write_var_bytes(&self.verification_script)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            invocation_script: reader.read_var_bytes(MAX_INVOCATION_SCRIPT)?,
            verification_script: reader.read_var_bytes(MAX_VERIFICATION_SCRIPT)?,
        })
    }
}
