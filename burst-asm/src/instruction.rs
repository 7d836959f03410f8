//! Typed instruction representation and its byte-level encoding.
//!
//! Decode produces a value the interpreter can match on directly; the numeric
//! opcode byte exists only at the serialisation boundary.

use core::fmt;

use crate::{Cond, Imm16, Imm24, Imm32, Imm8, InvalidOpcode, Layout, Opcode, RegId};

/// Maximum encoded instruction size in bytes.
pub const MAX_INSTRUCTION_SIZE: usize = 6;

/// The 16-bit little-endian instruction header.
///
/// Bits 15..13 carry the condition, bits 12..8 the opcode-specific flag
/// field, bits 7..0 the opcode byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Conditional-execution predicate.
    pub cond: Cond,
    /// Opcode-specific field; zero for most opcodes.
    pub field: u8,
    /// Raw opcode byte.
    pub opcode: u8,
}

impl Header {
    /// Assemble the raw 16-bit header value.
    pub const fn to_raw(self) -> u16 {
        ((self.cond.bits() as u16) << 13)
            | (((self.field & 0x1f) as u16) << 8)
            | self.opcode as u16
    }

    /// Split a raw 16-bit header into its fields.
    pub const fn from_raw(raw: u16) -> Self {
        Self {
            cond: Cond::from_bits_truncate((raw >> 13) as u8),
            field: ((raw >> 8) & 0x1f) as u8,
            opcode: raw as u8,
        }
    }
}

/// A single decoded instruction.
///
/// The condition prefix is not part of this type; it travels in the
/// [`Header`] and applies uniformly to every opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// Stop execution.
    Halt,
    /// Do nothing.
    Nop,
    /// Pop the program counter.
    Ret,
    /// Pop flags, then the program counter.
    Reti,
    /// Tear down the current stack frame.
    Leave,
    /// Invoke the system call selected by r0.
    Syscall,

    /// `dst = lhs + rhs`
    Add { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs - rhs`
    Sub { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs * rhs` (low 32 bits)
    Mul { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs / rhs` (signed)
    Div { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs % rhs` (signed)
    Mod { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs & rhs`
    And { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs | rhs`
    Or { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs ^ rhs`
    Xor { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs << (rhs & 0x1f)`
    Shl { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs >> (rhs & 0x1f)` (logical)
    Shr { dst: RegId, lhs: RegId, rhs: RegId },
    /// `dst = lhs >> (rhs & 0x1f)` (arithmetic)
    Sar { dst: RegId, lhs: RegId, rhs: RegId },
    /// Rotate left.
    Rol { dst: RegId, lhs: RegId, rhs: RegId },
    /// Rotate right.
    Ror { dst: RegId, lhs: RegId, rhs: RegId },

    /// Copy a register.
    Mov { dst: RegId, src: RegId },
    /// Compare, setting flags only.
    Cmp { lhs: RegId, rhs: RegId },
    /// Push a register.
    Push { reg: RegId },
    /// Pop into a register.
    Pop { reg: RegId },
    /// Increment.
    Inc { reg: RegId },
    /// Decrement.
    Dec { reg: RegId },
    /// Two's-complement negate.
    Neg { reg: RegId },
    /// Bitwise complement.
    Not { reg: RegId },

    /// Load a sign-extended 16-bit immediate.
    Movi { reg: RegId, imm: Imm16 },
    /// Replace the high half, preserving the low half.
    Movhi { reg: RegId, imm: Imm16 },
    /// `dst = src + sext(imm)`
    Addi { dst: RegId, src: RegId, imm: Imm8 },
    /// Compare against a sign-extended 8-bit immediate.
    Cmpi { reg: RegId, imm: Imm8 },
    /// Load a full 32-bit immediate.
    Limm { reg: RegId, imm: Imm32 },

    /// Load a 32-bit word from `[base + sext(offset)]`.
    Load { dst: RegId, base: RegId, offset: Imm8 },
    /// Store a 32-bit word to `[base + sext(offset)]`.
    Store { src: RegId, base: RegId, offset: Imm8 },
    /// Load a zero-extended byte.
    Loadb { dst: RegId, base: RegId, offset: Imm8 },
    /// Store the low byte.
    Storeb { src: RegId, base: RegId, offset: Imm8 },

    /// Jump to a 24-bit address.
    Jmp { target: Imm24 },
    /// Call a 24-bit address.
    Call { target: Imm24 },
    /// Jump to the address in a register.
    Jmpr { reg: RegId },
    /// Call the address in a register.
    Calli { reg: RegId },
    /// Set up a stack frame with `locals` 4-byte slots.
    Enter { locals: Imm16 },
    /// Raise software trap `number`.
    Trap { number: Imm8 },
}

/// Encoded form of a single instruction: up to six bytes plus the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    bytes: [u8; MAX_INSTRUCTION_SIZE],
    len: usize,
}

impl Encoded {
    /// The encoded byte length.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false; every instruction is at least a header.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::ops::Deref for Encoded {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Failure to decode an instruction from bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The opcode byte is not assigned.
    #[error(transparent)]
    InvalidOpcode(#[from] InvalidOpcode),
    /// Fewer operand bytes than the opcode's size requires.
    #[error("truncated instruction: need {needed} operand bytes, have {have}")]
    Truncated {
        /// Operand bytes the opcode requires.
        needed: usize,
        /// Operand bytes available.
        have: usize,
    },
}

const fn pack_pair(lo: RegId, hi: RegId) -> u8 {
    lo.to_u8() | (hi.to_u8() << 4)
}

const fn unpack_pair(byte: u8) -> (RegId, RegId) {
    (RegId::new_truncate(byte), RegId::new_truncate(byte >> 4))
}

impl Instruction {
    /// The opcode of this instruction.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Halt => Opcode::HALT,
            Self::Nop => Opcode::NOP,
            Self::Ret => Opcode::RET,
            Self::Reti => Opcode::RETI,
            Self::Leave => Opcode::LEAVE,
            Self::Syscall => Opcode::SYSCALL,
            Self::Add { .. } => Opcode::ADD,
            Self::Sub { .. } => Opcode::SUB,
            Self::Mul { .. } => Opcode::MUL,
            Self::Div { .. } => Opcode::DIV,
            Self::Mod { .. } => Opcode::MOD,
            Self::And { .. } => Opcode::AND,
            Self::Or { .. } => Opcode::OR,
            Self::Xor { .. } => Opcode::XOR,
            Self::Shl { .. } => Opcode::SHL,
            Self::Shr { .. } => Opcode::SHR,
            Self::Sar { .. } => Opcode::SAR,
            Self::Rol { .. } => Opcode::ROL,
            Self::Ror { .. } => Opcode::ROR,
            Self::Mov { .. } => Opcode::MOV,
            Self::Cmp { .. } => Opcode::CMP,
            Self::Push { .. } => Opcode::PUSH,
            Self::Pop { .. } => Opcode::POP,
            Self::Inc { .. } => Opcode::INC,
            Self::Dec { .. } => Opcode::DEC,
            Self::Neg { .. } => Opcode::NEG,
            Self::Not { .. } => Opcode::NOT,
            Self::Movi { .. } => Opcode::MOVI,
            Self::Movhi { .. } => Opcode::MOVHI,
            Self::Addi { .. } => Opcode::ADDI,
            Self::Cmpi { .. } => Opcode::CMPI,
            Self::Limm { .. } => Opcode::LIMM,
            Self::Load { .. } => Opcode::LOAD,
            Self::Store { .. } => Opcode::STORE,
            Self::Loadb { .. } => Opcode::LOADB,
            Self::Storeb { .. } => Opcode::STOREB,
            Self::Jmp { .. } => Opcode::JMP,
            Self::Call { .. } => Opcode::CALL,
            Self::Jmpr { .. } => Opcode::JMPR,
            Self::Calli { .. } => Opcode::CALLI,
            Self::Enter { .. } => Opcode::ENTER,
            Self::Trap { .. } => Opcode::TRAP,
        }
    }

    /// Encoded size in bytes, header included.
    pub const fn size(&self) -> u32 {
        self.opcode().size()
    }

    /// Encode under the given condition.
    pub fn encode(&self, cond: Cond) -> Encoded {
        let opcode = self.opcode();
        let mut field = 0u8;
        let mut operands = [0u8; MAX_INSTRUCTION_SIZE - 2];

        match *self {
            Self::Halt | Self::Nop | Self::Ret | Self::Reti | Self::Leave | Self::Syscall => {}

            Self::Add { dst, lhs, rhs }
            | Self::Sub { dst, lhs, rhs }
            | Self::Mul { dst, lhs, rhs }
            | Self::Div { dst, lhs, rhs }
            | Self::Mod { dst, lhs, rhs }
            | Self::And { dst, lhs, rhs }
            | Self::Or { dst, lhs, rhs }
            | Self::Xor { dst, lhs, rhs }
            | Self::Shl { dst, lhs, rhs }
            | Self::Shr { dst, lhs, rhs }
            | Self::Sar { dst, lhs, rhs }
            | Self::Rol { dst, lhs, rhs }
            | Self::Ror { dst, lhs, rhs } => {
                operands[0] = dst.to_u8();
                operands[1] = pack_pair(lhs, rhs);
            }

            Self::Mov { dst, src } => operands[0] = pack_pair(dst, src),
            Self::Cmp { lhs, rhs } => operands[0] = pack_pair(lhs, rhs),

            Self::Push { reg }
            | Self::Pop { reg }
            | Self::Inc { reg }
            | Self::Dec { reg }
            | Self::Neg { reg }
            | Self::Not { reg }
            | Self::Jmpr { reg }
            | Self::Calli { reg } => operands[0] = reg.to_u8(),

            Self::Addi { dst, src, imm } => {
                operands[0] = pack_pair(dst, src);
                operands[1] = imm.to_u8();
            }
            Self::Cmpi { reg, imm } => {
                operands[0] = reg.to_u8();
                operands[1] = imm.to_u8();
            }

            Self::Load { dst: reg, base, offset }
            | Self::Loadb { dst: reg, base, offset }
            | Self::Store { src: reg, base, offset }
            | Self::Storeb { src: reg, base, offset } => {
                operands[0] = pack_pair(reg, base);
                operands[1] = offset.to_u8();
            }

            Self::Movi { reg, imm } | Self::Movhi { reg, imm } => {
                field = reg.to_u8();
                operands[..2].copy_from_slice(&imm.to_u16().to_le_bytes());
            }
            Self::Enter { locals } => {
                operands[..2].copy_from_slice(&locals.to_u16().to_le_bytes());
            }
            Self::Trap { number } => operands[0] = number.to_u8(),

            Self::Limm { reg, imm } => {
                field = reg.to_u8();
                operands.copy_from_slice(&imm.to_u32().to_le_bytes());
            }

            Self::Jmp { target } | Self::Call { target } => {
                let raw = target.to_u32().to_le_bytes();
                operands[0] = raw[0];
                operands[1] = raw[1];
                operands[2] = raw[2];
            }
        }

        let header = Header {
            cond,
            field,
            opcode: opcode as u8,
        };

        let len = opcode.size() as usize;
        let mut bytes = [0u8; MAX_INSTRUCTION_SIZE];
        bytes[..2].copy_from_slice(&header.to_raw().to_le_bytes());
        bytes[2..len].copy_from_slice(&operands[..len - 2]);

        Encoded { bytes, len }
    }

    /// Decode from a header and the operand bytes that follow it.
    ///
    /// `operands` must hold at least `size - 2` bytes; extra bytes are
    /// ignored so a caller may pass the rest of the image.
    pub fn decode(header: Header, operands: &[u8]) -> Result<Self, DecodeError> {
        let opcode = Opcode::try_from(header.opcode)?;

        let needed = opcode.size() as usize - 2;
        if operands.len() < needed {
            return Err(DecodeError::Truncated {
                needed,
                have: operands.len(),
            });
        }
        let operands = &operands[..needed];

        let hdr_reg = RegId::new_truncate(header.field);

        let instruction = match opcode.layout() {
            Layout::Nullary => match opcode {
                Opcode::HALT => Self::Halt,
                Opcode::NOP => Self::Nop,
                Opcode::RET => Self::Ret,
                Opcode::RETI => Self::Reti,
                Opcode::LEAVE => Self::Leave,
                _ => Self::Syscall,
            },
            Layout::ThreeReg => {
                let dst = RegId::new_truncate(operands[0]);
                let (lhs, rhs) = unpack_pair(operands[1]);
                match opcode {
                    Opcode::ADD => Self::Add { dst, lhs, rhs },
                    Opcode::SUB => Self::Sub { dst, lhs, rhs },
                    Opcode::MUL => Self::Mul { dst, lhs, rhs },
                    Opcode::DIV => Self::Div { dst, lhs, rhs },
                    Opcode::MOD => Self::Mod { dst, lhs, rhs },
                    Opcode::AND => Self::And { dst, lhs, rhs },
                    Opcode::OR => Self::Or { dst, lhs, rhs },
                    Opcode::XOR => Self::Xor { dst, lhs, rhs },
                    Opcode::SHL => Self::Shl { dst, lhs, rhs },
                    Opcode::SHR => Self::Shr { dst, lhs, rhs },
                    Opcode::SAR => Self::Sar { dst, lhs, rhs },
                    Opcode::ROL => Self::Rol { dst, lhs, rhs },
                    _ => Self::Ror { dst, lhs, rhs },
                }
            }
            Layout::RegPair => {
                let (a, b) = unpack_pair(operands[0]);
                match opcode {
                    Opcode::MOV => Self::Mov { dst: a, src: b },
                    _ => Self::Cmp { lhs: a, rhs: b },
                }
            }
            Layout::SingleReg => {
                let reg = RegId::new_truncate(operands[0]);
                match opcode {
                    Opcode::PUSH => Self::Push { reg },
                    Opcode::POP => Self::Pop { reg },
                    Opcode::INC => Self::Inc { reg },
                    Opcode::DEC => Self::Dec { reg },
                    Opcode::NEG => Self::Neg { reg },
                    Opcode::NOT => Self::Not { reg },
                    Opcode::JMPR => Self::Jmpr { reg },
                    _ => Self::Calli { reg },
                }
            }
            Layout::RegRegImm8 => {
                let (dst, src) = unpack_pair(operands[0]);
                Self::Addi {
                    dst,
                    src,
                    imm: Imm8::new(operands[1]),
                }
            }
            Layout::RegImm8 => Self::Cmpi {
                reg: RegId::new_truncate(operands[0]),
                imm: Imm8::new(operands[1]),
            },
            Layout::Mem => {
                let (reg, base) = unpack_pair(operands[0]);
                let offset = Imm8::new(operands[1]);
                match opcode {
                    Opcode::LOAD => Self::Load { dst: reg, base, offset },
                    Opcode::STORE => Self::Store { src: reg, base, offset },
                    Opcode::LOADB => Self::Loadb { dst: reg, base, offset },
                    _ => Self::Storeb { src: reg, base, offset },
                }
            }
            Layout::HdrRegImm16 => {
                let imm = Imm16::new(u16::from_le_bytes([operands[0], operands[1]]));
                match opcode {
                    Opcode::MOVI => Self::Movi { reg: hdr_reg, imm },
                    _ => Self::Movhi { reg: hdr_reg, imm },
                }
            }
            Layout::Imm16 => Self::Enter {
                locals: Imm16::new(u16::from_le_bytes([operands[0], operands[1]])),
            },
            Layout::Imm8 => Self::Trap {
                number: Imm8::new(operands[0]),
            },
            Layout::HdrRegImm32 => Self::Limm {
                reg: hdr_reg,
                imm: Imm32::new(u32::from_le_bytes([
                    operands[0],
                    operands[1],
                    operands[2],
                    operands[3],
                ])),
            },
            Layout::Addr24 => {
                let target = Imm24::new_truncate(u32::from_le_bytes([
                    operands[0],
                    operands[1],
                    operands[2],
                    0,
                ]));
                match opcode {
                    Opcode::JMP => Self::Jmp { target },
                    _ => Self::Call { target },
                }
            }
        };

        Ok(instruction)
    }

    /// Decode an instruction and its condition from the front of `bytes`.
    pub fn decode_bytes(bytes: &[u8]) -> Result<(Cond, Self), DecodeError> {
        if bytes.len() < 2 {
            return Err(DecodeError::Truncated {
                needed: 2,
                have: bytes.len(),
            });
        }
        let header = Header::from_raw(u16::from_le_bytes([bytes[0], bytes[1]]));
        let instruction = Self::decode(header, &bytes[2..])?;
        Ok((header.cond, instruction))
    }
}

impl fmt::Display for Instruction {
    /// Canonical assembly text without a condition prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mn = self.opcode().mnemonic();
        match *self {
            Self::Halt | Self::Nop | Self::Ret | Self::Reti | Self::Leave | Self::Syscall => {
                f.write_str(mn)
            }

            Self::Add { dst, lhs, rhs }
            | Self::Sub { dst, lhs, rhs }
            | Self::Mul { dst, lhs, rhs }
            | Self::Div { dst, lhs, rhs }
            | Self::Mod { dst, lhs, rhs }
            | Self::And { dst, lhs, rhs }
            | Self::Or { dst, lhs, rhs }
            | Self::Xor { dst, lhs, rhs }
            | Self::Shl { dst, lhs, rhs }
            | Self::Shr { dst, lhs, rhs }
            | Self::Sar { dst, lhs, rhs }
            | Self::Rol { dst, lhs, rhs }
            | Self::Ror { dst, lhs, rhs } => write!(f, "{mn} {dst}, {lhs}, {rhs}"),

            Self::Mov { dst, src } => write!(f, "{mn} {dst}, {src}"),
            Self::Cmp { lhs, rhs } => write!(f, "{mn} {lhs}, {rhs}"),

            Self::Push { reg }
            | Self::Pop { reg }
            | Self::Inc { reg }
            | Self::Dec { reg }
            | Self::Neg { reg }
            | Self::Not { reg }
            | Self::Jmpr { reg }
            | Self::Calli { reg } => write!(f, "{mn} {reg}"),

            Self::Movi { reg, imm } => write!(f, "{mn} {reg}, #{}", imm.to_i16()),
            Self::Movhi { reg, imm } => write!(f, "{mn} {reg}, #0x{:x}", imm.to_u16()),
            Self::Addi { dst, src, imm } => write!(f, "{mn} {dst}, {src}, #{}", imm.to_i8()),
            Self::Cmpi { reg, imm } => write!(f, "{mn} {reg}, #{}", imm.to_i8()),
            Self::Limm { reg, imm } => write!(f, "{mn} {reg}, #0x{:x}", imm.to_u32()),

            Self::Load { dst: reg, base, offset }
            | Self::Loadb { dst: reg, base, offset }
            | Self::Store { src: reg, base, offset }
            | Self::Storeb { src: reg, base, offset } => {
                let off = offset.to_i8();
                if off == 0 {
                    write!(f, "{mn} {reg}, [{base}]")
                } else if off > 0 {
                    write!(f, "{mn} {reg}, [{base}+{off}]")
                } else {
                    write!(f, "{mn} {reg}, [{base}{off}]")
                }
            }

            Self::Jmp { target } | Self::Call { target } => {
                write!(f, "{mn} 0x{:x}", target.to_u32())
            }
            Self::Enter { locals } => write!(f, "{mn} #{}", locals.to_u16()),
            Self::Trap { number } => write!(f, "{mn} #{}", number.to_u8()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    fn reg(id: u8) -> RegId {
        RegId::new(id).unwrap()
    }

    /// One representative instruction per opcode, with distinguishable
    /// register and immediate values.
    fn sample(opcode: Opcode) -> Instruction {
        let (a, b, c) = (reg(1), reg(2), reg(3));
        match opcode {
            Opcode::HALT => Instruction::Halt,
            Opcode::NOP => Instruction::Nop,
            Opcode::RET => Instruction::Ret,
            Opcode::RETI => Instruction::Reti,
            Opcode::LEAVE => Instruction::Leave,
            Opcode::SYSCALL => Instruction::Syscall,
            Opcode::ADD => Instruction::Add { dst: a, lhs: b, rhs: c },
            Opcode::SUB => Instruction::Sub { dst: a, lhs: b, rhs: c },
            Opcode::MUL => Instruction::Mul { dst: a, lhs: b, rhs: c },
            Opcode::DIV => Instruction::Div { dst: a, lhs: b, rhs: c },
            Opcode::MOD => Instruction::Mod { dst: a, lhs: b, rhs: c },
            Opcode::AND => Instruction::And { dst: a, lhs: b, rhs: c },
            Opcode::OR => Instruction::Or { dst: a, lhs: b, rhs: c },
            Opcode::XOR => Instruction::Xor { dst: a, lhs: b, rhs: c },
            Opcode::SHL => Instruction::Shl { dst: a, lhs: b, rhs: c },
            Opcode::SHR => Instruction::Shr { dst: a, lhs: b, rhs: c },
            Opcode::SAR => Instruction::Sar { dst: a, lhs: b, rhs: c },
            Opcode::ROL => Instruction::Rol { dst: a, lhs: b, rhs: c },
            Opcode::ROR => Instruction::Ror { dst: a, lhs: b, rhs: c },
            Opcode::MOV => Instruction::Mov { dst: a, src: reg(15) },
            Opcode::CMP => Instruction::Cmp { lhs: a, rhs: reg(15) },
            Opcode::PUSH => Instruction::Push { reg: a },
            Opcode::POP => Instruction::Pop { reg: a },
            Opcode::INC => Instruction::Inc { reg: a },
            Opcode::DEC => Instruction::Dec { reg: a },
            Opcode::NEG => Instruction::Neg { reg: a },
            Opcode::NOT => Instruction::Not { reg: a },
            Opcode::MOVI => Instruction::Movi { reg: a, imm: Imm16::from(-2i16) },
            Opcode::MOVHI => Instruction::Movhi { reg: a, imm: Imm16::new(0xbeef) },
            Opcode::ADDI => Instruction::Addi { dst: a, src: b, imm: Imm8::from(-5i8) },
            Opcode::CMPI => Instruction::Cmpi { reg: a, imm: Imm8::new(0x80) },
            Opcode::LIMM => Instruction::Limm { reg: reg(14), imm: Imm32::new(0xdead_beef) },
            Opcode::LOAD => Instruction::Load { dst: a, base: b, offset: Imm8::from(-4i8) },
            Opcode::STORE => Instruction::Store { src: a, base: b, offset: Imm8::new(8) },
            Opcode::LOADB => Instruction::Loadb { dst: a, base: b, offset: Imm8::new(0) },
            Opcode::STOREB => Instruction::Storeb { src: a, base: b, offset: Imm8::new(1) },
            Opcode::JMP => Instruction::Jmp { target: Imm24::new(0x123456).unwrap() },
            Opcode::CALL => Instruction::Call { target: Imm24::new(0xfffffe).unwrap() },
            Opcode::JMPR => Instruction::Jmpr { reg: a },
            Opcode::CALLI => Instruction::Calli { reg: a },
            Opcode::ENTER => Instruction::Enter { locals: Imm16::new(4) },
            Opcode::TRAP => Instruction::Trap { number: Imm8::new(7) },
        }
    }

    #[test]
    fn header_round_trip_all_opcodes() {
        for op in Opcode::iter() {
            for cond_bits in 0..8u8 {
                let header = Header {
                    cond: Cond::from_bits_truncate(cond_bits),
                    field: 0x15,
                    opcode: op as u8,
                };
                assert_eq!(Header::from_raw(header.to_raw()), header);
            }
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        for op in Opcode::iter() {
            let instruction = sample(op);
            assert_eq!(instruction.opcode(), op);
            for cond_bits in 0..8u8 {
                let cond = Cond::from_bits_truncate(cond_bits);
                let encoded = instruction.encode(cond);
                assert_eq!(encoded.len(), op.size() as usize);

                let (dcond, decoded) = Instruction::decode_bytes(&encoded).unwrap();
                assert_eq!(dcond, cond);
                assert_eq!(decoded, instruction, "{op}");
            }
        }
    }

    #[test]
    fn header_is_little_endian() {
        let encoded = Instruction::Halt.encode(Cond::Eq);
        // cond 0b101 in bits 15..13 of the second byte
        assert_eq!(encoded.as_ref(), &[Opcode::HALT as u8, 0b1010_0000]);
    }

    #[test]
    fn decode_rejects_unassigned_opcodes() {
        let err = Instruction::decode_bytes(&[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(
            err,
            Err(DecodeError::InvalidOpcode(InvalidOpcode(0x00)))
        );
    }

    #[test]
    fn decode_rejects_truncated_operands() {
        let encoded = Instruction::Jmp { target: Imm24::new_truncate(0x10) }.encode(Cond::Always);
        let err = Instruction::decode_bytes(&encoded[..4]);
        assert_eq!(err, Err(DecodeError::Truncated { needed: 4, have: 2 }));
    }

    #[rstest]
    #[case(Instruction::Halt, &[0x01, 0x00])]
    #[case(Instruction::Syscall, &[0x06, 0x00])]
    #[case(
        Instruction::Add { dst: RegId::new_truncate(1), lhs: RegId::new_truncate(2), rhs: RegId::new_truncate(3) },
        &[0x10, 0x00, 0x01, 0x32]
    )]
    #[case(
        Instruction::Mov { dst: RegId::new_truncate(4), src: RegId::new_truncate(15) },
        &[0x20, 0x00, 0xf4, 0x00]
    )]
    #[case(Instruction::Push { reg: RegId::new_truncate(9) }, &[0x22, 0x00, 0x09, 0x00])]
    #[case(
        Instruction::Addi { dst: RegId::new_truncate(1), src: RegId::new_truncate(2), imm: Imm8::new(0xfb) },
        &[0x32, 0x00, 0x21, 0xfb]
    )]
    #[case(
        Instruction::Cmpi { reg: RegId::new_truncate(7), imm: Imm8::new(0x7f) },
        &[0x33, 0x00, 0x07, 0x7f]
    )]
    #[case(
        Instruction::Load { dst: RegId::new_truncate(1), base: RegId::new_truncate(15), offset: Imm8::new(0xfc) },
        &[0x40, 0x00, 0xf1, 0xfc]
    )]
    #[case(
        Instruction::Movi { reg: RegId::new_truncate(5), imm: Imm16::new(0x1234) },
        &[0x30, 0x05, 0x34, 0x12]
    )]
    #[case(Instruction::Enter { locals: Imm16::new(2) }, &[0x54, 0x00, 0x02, 0x00])]
    #[case(Instruction::Trap { number: Imm8::new(7) }, &[0x55, 0x00, 0x07, 0x00])]
    #[case(
        Instruction::Limm { reg: RegId::new_truncate(14), imm: Imm32::new(0xdeadbeef) },
        &[0x34, 0x0e, 0xef, 0xbe, 0xad, 0xde]
    )]
    #[case(
        Instruction::Jmp { target: Imm24::new_truncate(0x123456) },
        &[0x50, 0x00, 0x56, 0x34, 0x12, 0x00]
    )]
    fn golden_encodings(#[case] instruction: Instruction, #[case] expected: &[u8]) {
        assert_eq!(instruction.encode(Cond::Always).as_ref(), expected);
    }

    #[test]
    fn condition_occupies_the_top_three_bits() {
        let bytes = Instruction::Nop.encode(Cond::Le);
        // cond 0b111 shifted into bits 15..13 of the little-endian header
        assert_eq!(bytes.as_ref(), &[0x02, 0b1110_0000]);
    }

    #[test]
    fn movi_register_travels_in_the_header_field() {
        let i = Instruction::Movi { reg: reg(13), imm: Imm16::new(0x1234) };
        let bytes = i.encode(Cond::Always);
        assert_eq!(bytes.len(), 4);
        let header = Header::from_raw(u16::from_le_bytes([bytes[0], bytes[1]]));
        assert_eq!(header.field, 13);
        assert_eq!(&bytes[2..4], &[0x34, 0x12]);
    }
}
