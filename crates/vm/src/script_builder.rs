//! Script builder for assembling bytecode.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use neo3_cryptography::sha256;
use num_bigint::BigInt;
use num_traits::Signed;

/// Computes the 32-bit identifier of a system call from its name.
pub fn syscall_hash(name: &str) -> u32 {
    let digest = sha256(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Assembles Neo VM bytecode.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Emits a bare opcode.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.script.push(opcode as u8);
        self
    }

    /// Emits an opcode with a fixed operand.
    pub fn emit_with(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.script.push(opcode as u8);
        self.script.extend_from_slice(operand);
        self
    }

    /// Emits the shortest push for an integer.
    pub fn emit_push_int(&mut self, value: &BigInt) -> VmResult<&mut Self> {
        if let Ok(small) = i64::try_from(value.clone()) {
            if (-1..=16).contains(&small) {
                let opcode_byte = (OpCode::PUSH0 as u8 as i64 + small) as u8;
                self.script.push(opcode_byte);
                return Ok(self);
            }
        }
        let bytes = value.to_signed_bytes_le();
        let (opcode, width) = match bytes.len() {
            0..=1 => (OpCode::PUSHINT8, 1),
            2 => (OpCode::PUSHINT16, 2),
            3..=4 => (OpCode::PUSHINT32, 4),
            5..=8 => (OpCode::PUSHINT64, 8),
            9..=16 => (OpCode::PUSHINT128, 16),
            17..=32 => (OpCode::PUSHINT256, 32),
            _ => return Err(VmError::IntegerOutOfRange),
        };
        let fill = if value.is_negative() { 0xff } else { 0x00 };
        let mut operand = vec![fill; width];
        operand[..bytes.len()].copy_from_slice(&bytes);
        self.script.push(opcode as u8);
        self.script.extend_from_slice(&operand);
        Ok(self)
    }

    /// Emits an i64 push.
    pub fn emit_push_i64(&mut self, value: i64) -> &mut Self {
        self.emit_push_int(&BigInt::from(value))
            .expect("i64 always fits")
    }

    /// Emits a boolean push.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    /// Emits a data push with the narrowest PUSHDATA form.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> VmResult<&mut Self> {
        if data.len() <= 0xff {
            self.script.push(OpCode::PUSHDATA1 as u8);
            self.script.push(data.len() as u8);
        } else if data.len() <= 0xffff {
            self.script.push(OpCode::PUSHDATA2 as u8);
            self.script
                .extend_from_slice(&(data.len() as u16).to_le_bytes());
        } else if data.len() <= 0xffff_ffff {
            self.script.push(OpCode::PUSHDATA4 as u8);
            self.script
                .extend_from_slice(&(data.len() as u32).to_le_bytes());
        } else {
            return Err(VmError::ItemTooLarge {
                size: data.len(),
                limit: 0xffff_ffff,
            });
        }
        self.script.extend_from_slice(data);
        Ok(self)
    }

    /// Emits a string push.
    pub fn emit_push_string(&mut self, text: &str) -> VmResult<&mut Self> {
        self.emit_push_bytes(text.as_bytes())
    }

    /// Emits PUSHNULL.
    pub fn emit_push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PUSHNULL)
    }

    /// Emits a SYSCALL by name.
    pub fn emit_syscall(&mut self, name: &str) -> &mut Self {
        let hash = syscall_hash(name);
        self.emit_with(OpCode::SYSCALL, &hash.to_le_bytes())
    }

    /// Emits a jump with a 32-bit offset.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> &mut Self {
        self.emit_with(opcode, &offset.to_le_bytes())
    }

    /// The assembled bytes.
    pub fn to_array(&self) -> Vec<u8> {
        self.script.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ints_use_push_n() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_i64(0);
        builder.emit_push_i64(16);
        builder.emit_push_i64(-1);
        assert_eq!(builder.to_array(), vec![0x10, 0x20, 0x0F]);
    }

    #[test]
    fn wider_ints_select_width() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_i64(17);
        assert_eq!(builder.to_array(), vec![0x00, 17]);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_i64(-300);
        let bytes = builder.to_array();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(i16::from_le_bytes([bytes[1], bytes[2]]), -300);
    }

    #[test]
    fn negative_sign_extension() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(&BigInt::from(-2i64).pow(39)).unwrap();
        let bytes = builder.to_array();
        assert_eq!(bytes[0], 0x03); // PUSHINT64
        assert_eq!(
            i64::from_le_bytes(bytes[1..9].try_into().unwrap()),
            -(1i64 << 39)
        );
    }

    #[test]
    fn pushdata_width_selection() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0xAB; 3]).unwrap();
        assert_eq!(builder.to_array()[..2], [0x0C, 3]);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&vec![0u8; 300]).unwrap();
        assert_eq!(builder.to_array()[0], 0x0D);
    }

    #[test]
    fn syscall_hash_is_first_four_bytes_of_sha256() {
        let digest = sha256(b"System.Runtime.Notify");
        let expected = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(syscall_hash("System.Runtime.Notify"), expected);
    }
}
