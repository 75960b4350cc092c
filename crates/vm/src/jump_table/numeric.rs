//! Arithmetic opcodes.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Maximum shift amount for SHL/SHR.
const MAX_SHIFT: u32 = 256;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::SIGN, sign);
    table.set(OpCode::ABS, abs);
    table.set(OpCode::NEGATE, negate);
    table.set(OpCode::INC, inc);
    table.set(OpCode::DEC, dec);
    table.set(OpCode::ADD, add);
    table.set(OpCode::SUB, sub);
    table.set(OpCode::MUL, mul);
    table.set(OpCode::DIV, div);
    table.set(OpCode::MOD, rem);
    table.set(OpCode::POW, pow);
    table.set(OpCode::SQRT, sqrt);
    table.set(OpCode::MODMUL, mod_mul);
    table.set(OpCode::MODPOW, mod_pow);
    table.set(OpCode::SHL, shl);
    table.set(OpCode::SHR, shr);
    table.set(OpCode::NOT, not);
    table.set(OpCode::BOOLAND, bool_and);
    table.set(OpCode::BOOLOR, bool_or);
    table.set(OpCode::NZ, nz);
    table.set(OpCode::NUMEQUAL, num_equal);
    table.set(OpCode::NUMNOTEQUAL, num_not_equal);
    table.set(OpCode::LT, lt);
    table.set(OpCode::LE, le);
    table.set(OpCode::GT, gt);
    table.set(OpCode::GE, ge);
    table.set(OpCode::MIN, min);
    table.set(OpCode::MAX, max);
    table.set(OpCode::WITHIN, within);
}

fn unary(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::check_integer(f(x)?)?)
}

fn binary(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(BigInt, BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::check_integer(f(a, b)?)?)
}

fn compare(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::from_bool(f(&a, &b)))
}

fn sign(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::from_int(x.signum()))
}

fn abs(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    unary(engine, |x| Ok(x.abs()))
}

fn negate(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    unary(engine, |x| Ok(-x))
}

fn inc(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    unary(engine, |x| Ok(x + 1))
}

fn dec(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    unary(engine, |x| Ok(x - 1))
}

fn add(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| Ok(a + b))
}

fn sub(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| Ok(a - b))
}

fn mul(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| Ok(a * b))
}

fn div(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| {
        if b.is_zero() {
            Err(VmError::DivisionByZero)
        } else {
            Ok(a / b)
        }
    })
}

fn rem(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| {
        if b.is_zero() {
            Err(VmError::DivisionByZero)
        } else {
            Ok(a % b)
        }
    })
}

fn pow(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| {
        let exponent = b
            .to_u32()
            .ok_or_else(|| VmError::InvalidOperation("invalid exponent".to_string()))?;
        Ok(a.pow(exponent))
    })
}

/// Integer square root by Newton's method.
fn isqrt(value: &BigInt) -> BigInt {
    if value.is_zero() {
        return BigInt::zero();
    }
    let mut x = value.clone();
    let mut y: BigInt = (&x + 1) / 2;
    while y < x {
        x = y.clone();
        y = (&x + value / &x) / 2;
    }
    x
}

fn sqrt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    unary(engine, |x| {
        if x.is_negative() {
            Err(VmError::InvalidOperation(
                "square root of a negative number".to_string(),
            ))
        } else {
            Ok(isqrt(&x))
        }
    })
}

fn mod_mul(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    if modulus.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    engine.push(StackItem::check_integer((a * b) % modulus)?)
}

/// Modular inverse by the extended Euclidean algorithm.
fn mod_inverse(value: &BigInt, modulus: &BigInt) -> VmResult<BigInt> {
    let modulus = modulus.abs();
    let mut t = BigInt::zero();
    let mut new_t = BigInt::from(1);
    let mut r = modulus.clone();
    let mut new_r = ((value % &modulus) + &modulus) % &modulus;
    while !new_r.is_zero() {
        let quotient = &r / &new_r;
        let next_t = &t - &quotient * &new_t;
        t = std::mem::replace(&mut new_t, next_t);
        let next_r = &r - &quotient * &new_r;
        r = std::mem::replace(&mut new_r, next_r);
    }
    if r != BigInt::from(1) {
        return Err(VmError::InvalidOperation(
            "value has no modular inverse".to_string(),
        ));
    }
    Ok(((t % &modulus) + &modulus) % modulus)
}

fn mod_pow(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    let exponent = engine.pop_int()?;
    let base = engine.pop_int()?;
    if modulus.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    let result = if exponent == BigInt::from(-1) {
        mod_inverse(&base, &modulus)?
    } else if exponent.is_negative() {
        return Err(VmError::InvalidOperation(
            "negative exponent".to_string(),
        ));
    } else {
        let normalized = ((&base % &modulus.abs()) + modulus.abs()) % modulus.abs();
        normalized.modpow(&exponent, &modulus.abs())
    };
    engine.push(StackItem::check_integer(result)?)
}

fn shift_amount(value: BigInt) -> VmResult<u32> {
    let shift = value
        .to_u32()
        .ok_or_else(|| VmError::InvalidOperation("invalid shift amount".to_string()))?;
    if shift > MAX_SHIFT {
        return Err(VmError::InvalidOperation("shift amount too large".to_string()));
    }
    Ok(shift)
}

fn shl(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let shift = shift_amount(engine.pop_int()?)?;
    let x = engine.pop_int()?;
    engine.push(StackItem::check_integer(x << shift)?)
}

fn shr(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let shift = shift_amount(engine.pop_int()?)?;
    let x = engine.pop_int()?;
    engine.push(StackItem::check_integer(x >> shift)?)
}

fn not(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_bool()?;
    engine.push(StackItem::from_bool(!x))
}

fn bool_and(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_bool()?;
    let a = engine.pop_bool()?;
    engine.push(StackItem::from_bool(a && b))
}

fn bool_or(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_bool()?;
    let a = engine.pop_bool()?;
    engine.push(StackItem::from_bool(a || b))
}

fn nz(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::from_bool(!x.is_zero()))
}

fn num_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a == b)
}

fn num_not_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a != b)
}

fn lt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a < b)
}

fn le(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a <= b)
}

fn gt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a > b)
}

fn ge(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a >= b)
}

fn min(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| Ok(a.min(b)))
}

fn max(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    binary(engine, |a, b| Ok(a.max(b)))
}

fn within(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    let x = engine.pop_int()?;
    engine.push(StackItem::from_bool(a <= x && x < b))
}
