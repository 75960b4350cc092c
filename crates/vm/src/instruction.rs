//! Decoded instructions.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use num_bigint::BigInt;

/// A decoded instruction: opcode plus operand bytes.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Vec<u8>,
    /// Offset of the opcode byte within the script.
    pub ip: usize,
    /// Total encoded length including prefix and operand.
    pub len: usize,
}

impl Instruction {
    /// Decodes the instruction starting at `ip`.
    pub fn decode(script: &[u8], ip: usize) -> VmResult<Self> {
        let opcode_byte = *script
            .get(ip)
            .ok_or_else(|| VmError::InvalidScript(format!("ip {ip} beyond script end")))?;
        let opcode = OpCode::from_byte(opcode_byte)?;

        let prefix_size = opcode.operand_prefix_size();
        let mut cursor = ip + 1;
        let operand_size = if prefix_size > 0 {
            let prefix = script
                .get(cursor..cursor + prefix_size)
                .ok_or_else(|| VmError::InvalidScript("truncated operand prefix".to_string()))?;
            cursor += prefix_size;
            let mut value = 0usize;
            for (i, byte) in prefix.iter().enumerate() {
                value |= (*byte as usize) << (8 * i);
            }
            value
        } else {
            opcode.operand_size()
        };

        let operand = script
            .get(cursor..cursor + operand_size)
            .ok_or_else(|| VmError::InvalidScript("truncated operand".to_string()))?
            .to_vec();

        Ok(Self {
            opcode,
            operand,
            ip,
            len: 1 + prefix_size + operand_size,
        })
    }

    fn expect(&self, bytes: usize) -> VmResult<&[u8]> {
        self.operand
            .get(..bytes)
            .ok_or_else(|| VmError::InvalidScript("operand too short".to_string()))
    }

    pub fn token_i8(&self) -> VmResult<i8> {
        Ok(self.expect(1)?[0] as i8)
    }

    /// The second i8 operand (TRY catch/finally pair).
    pub fn token_i8_1(&self) -> VmResult<i8> {
        Ok(*self
            .operand
            .get(1)
            .ok_or_else(|| VmError::InvalidScript("operand too short".to_string()))?
            as i8)
    }

    pub fn token_u8(&self) -> VmResult<u8> {
        Ok(self.expect(1)?[0])
    }

    pub fn token_u8_1(&self) -> VmResult<u8> {
        Ok(*self
            .operand
            .get(1)
            .ok_or_else(|| VmError::InvalidScript("operand too short".to_string()))?)
    }

    pub fn token_i16(&self) -> VmResult<i16> {
        let bytes = self.expect(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn token_u16(&self) -> VmResult<u16> {
        let bytes = self.expect(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn token_i32(&self) -> VmResult<i32> {
        let bytes = self.expect(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// The second i32 operand (TRY_L catch/finally pair).
    pub fn token_i32_1(&self) -> VmResult<i32> {
        let bytes = self
            .operand
            .get(4..8)
            .ok_or_else(|| VmError::InvalidScript("operand too short".to_string()))?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn token_u32(&self) -> VmResult<u32> {
        let bytes = self.expect(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn token_i64(&self) -> VmResult<i64> {
        let bytes = self.expect(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(out))
    }

    /// The operand as a little-endian two's complement integer.
    pub fn token_integer(&self) -> BigInt {
        BigInt::from_signed_bytes_le(&self.operand)
    }
}
