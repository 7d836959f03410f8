//! Flag-exact arithmetic.
//!
//! Each arithmetic kind carries its own carry/overflow rule; there is no
//! shared "update flags from result" helper taking booleans, because C and V
//! mean different things per operation class. Z and N are uniform: Z is
//! result == 0, N is bit 31.

use burst_asm::Flags;

use crate::error::{VmError, VmResult};

/// ADD/ADDI rule: C is the unsigned carry out of bit 31, V the signed
/// overflow `((a^r) & (b^r))[31]`.
pub(crate) fn add(flags: &mut Flags, a: u32, b: u32) -> u32 {
    let r = a.wrapping_add(b);
    flags.set_zn(r);
    flags.set(Flags::C, (a as u64 + b as u64) > u32::MAX as u64);
    flags.set(Flags::V, ((a ^ r) & (b ^ r)) & 0x8000_0000 != 0);
    r
}

/// SUB/CMP/CMPI rule: C is the unsigned borrow `a < b`, V the signed
/// overflow `((a^b) & (a^r))[31]`.
pub(crate) fn sub(flags: &mut Flags, a: u32, b: u32) -> u32 {
    let r = a.wrapping_sub(b);
    flags.set_zn(r);
    flags.set(Flags::C, a < b);
    flags.set(Flags::V, ((a ^ b) & (a ^ r)) & 0x8000_0000 != 0);
    r
}

/// MUL keeps the low 32 bits and writes zero to C and V.
pub(crate) fn mul(flags: &mut Flags, a: u32, b: u32) -> u32 {
    let r = a.wrapping_mul(b);
    flags.set_zn(r);
    flags.remove(Flags::C | Flags::V);
    r
}

/// Signed division truncating toward zero. `i32::MIN / -1` wraps.
pub(crate) fn div(flags: &mut Flags, a: u32, b: u32) -> VmResult<u32> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    let r = (a as i32).wrapping_div(b as i32) as u32;
    flags.set_zn(r);
    flags.remove(Flags::C | Flags::V);
    Ok(r)
}

/// Signed remainder; the sign follows the dividend.
pub(crate) fn rem(flags: &mut Flags, a: u32, b: u32) -> VmResult<u32> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    let r = (a as i32).wrapping_rem(b as i32) as u32;
    flags.set_zn(r);
    flags.remove(Flags::C | Flags::V);
    Ok(r)
}

/// AND/OR/XOR rule: the caller computes the result, C and V clear.
pub(crate) fn bitwise(flags: &mut Flags, r: u32) -> u32 {
    flags.set_zn(r);
    flags.remove(Flags::C | Flags::V);
    r
}

/// Shift count is the low five bits of the right operand.
#[inline]
fn count(b: u32) -> u32 {
    b & 0x1f
}

/// Logical shift left.
pub(crate) fn shl(flags: &mut Flags, a: u32, b: u32) -> u32 {
    bitwise(flags, a << count(b))
}

/// Logical shift right.
pub(crate) fn shr(flags: &mut Flags, a: u32, b: u32) -> u32 {
    bitwise(flags, a >> count(b))
}

/// Arithmetic shift right, preserving the sign bit.
pub(crate) fn sar(flags: &mut Flags, a: u32, b: u32) -> u32 {
    bitwise(flags, ((a as i32) >> count(b)) as u32)
}

/// Rotate left within 32 bits.
pub(crate) fn rol(flags: &mut Flags, a: u32, b: u32) -> u32 {
    bitwise(flags, a.rotate_left(count(b)))
}

/// Rotate right within 32 bits.
pub(crate) fn ror(flags: &mut Flags, a: u32, b: u32) -> u32 {
    bitwise(flags, a.rotate_right(count(b)))
}

/// INC/DEC/NEG/NOT rule: Z and N only, C and V untouched.
pub(crate) fn unary(flags: &mut Flags, r: u32) -> u32 {
    flags.set_zn(r);
    r
}
