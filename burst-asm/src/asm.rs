//! Two-pass assembler for BURST source.
//!
//! Pass 1 sizes every line from the shared opcode table and records label
//! addresses; pass 2 parses operands, validates them against the opcode's
//! layout, resolves symbols and emits bytes. Forward references need no
//! fixups because all addresses are known before anything is emitted.

mod parse;

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use crate::{Cond, Imm16, Imm24, Imm32, Imm8, Instruction, Opcode, RegId};

use parse::{Body, Directive, Operand, ParseError, Value};

/// Assembly failure, carrying the 1-based source line.
#[derive(Debug, thiserror::Error)]
pub enum AsmError {
    /// Mnemonic is neither a base opcode, an alias, nor prefixed.
    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic {
        /// 1-based source line.
        line: usize,
        /// The offending mnemonic.
        mnemonic: String,
    },
    /// Operand count or type mismatch.
    #[error("line {line}: {message}")]
    BadOperand {
        /// 1-based source line.
        line: usize,
        /// Precise description, e.g. "`mov` operand 2 must be a register".
        message: String,
    },
    /// Immediate, offset or address outside its encodable range.
    #[error("line {line}: value {value} out of range for {what}")]
    OutOfRange {
        /// 1-based source line.
        line: usize,
        /// The parsed value.
        value: i64,
        /// The slot the value was destined for.
        what: &'static str,
    },
    /// Reference to a label no line defines.
    #[error("line {line}: undefined label `{label}`")]
    UndefinedLabel {
        /// 1-based source line.
        line: usize,
        /// The unresolved name.
        label: String,
    },
    /// Label defined more than once.
    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel {
        /// 1-based source line.
        line: usize,
        /// The redefined name.
        label: String,
    },
    /// Unknown directive or malformed directive arguments.
    #[error("line {line}: {message}")]
    BadDirective {
        /// 1-based source line.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// Any other malformed input.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based source line.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// Source or output file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

impl AsmError {
    fn from_parse(line: usize, err: ParseError) -> Self {
        match err {
            ParseError::Syntax(message) => Self::Syntax { line, message },
            ParseError::BadOperand(message) => Self::BadOperand { line, message },
            ParseError::BadDirective(message) => Self::BadDirective { line, message },
        }
    }
}

/// Options for [`assemble_file`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Where to write the image; defaults to the source path with a `bin`
    /// extension.
    pub output: Option<PathBuf>,
    /// Skip writing the image to disk.
    pub no_output: bool,
}

/// A finished assembly job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// The emitted image; byte 0 is the entry point.
    pub program: Vec<u8>,
    /// Label addresses, in name order.
    pub symbols: BTreeMap<String, u32>,
    /// One span per emitting source line, in address order.
    pub source_map: Vec<SourceSpan>,
    /// Image path when the job wrote one.
    pub output_file: Option<PathBuf>,
}

impl Assembled {
    /// The source line whose bytes cover `address`, if any.
    pub fn line_at(&self, address: u32) -> Option<usize> {
        self.source_map
            .iter()
            .find(|span| span.address <= address && address < span.address + span.size)
            .map(|span| span.line)
    }

    /// The address a source line emitted to, if it emitted anything.
    pub fn address_of_line(&self, line: usize) -> Option<u32> {
        self.source_map
            .iter()
            .find(|span| span.line == line)
            .map(|span| span.address)
    }
}

/// Association of an emitting source line with its image bytes, so a
/// debugger can report and set locations in source terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    /// 1-based source line.
    pub line: usize,
    /// First emitted byte.
    pub address: u32,
    /// Number of bytes the line emitted.
    pub size: u32,
}

/// A single line assembled in isolation, e.g. from a debugger prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    /// Address the line was assembled for.
    pub address: u32,
    /// Emitted bytes; empty for blank or label-only lines.
    pub bytes: Vec<u8>,
    /// Byte length of `bytes`.
    pub size: u32,
}

/// Legacy conditional mnemonics kept as aliases for the prefixed forms.
fn legacy_alias(mnemonic: &str) -> Option<(Cond, Opcode)> {
    let resolved = match mnemonic {
        "jz" | "jeq" => (Cond::Eq, Opcode::JMP),
        "jnz" | "jne" => (Cond::Ne, Opcode::JMP),
        "jlt" => (Cond::Lt, Opcode::JMP),
        "jle" => (Cond::Le, Opcode::JMP),
        "jgt" => (Cond::Gt, Opcode::JMP),
        "jge" => (Cond::Ge, Opcode::JMP),
        "movz" | "moveq" => (Cond::Eq, Opcode::MOV),
        "movnz" | "movne" => (Cond::Ne, Opcode::MOV),
        "movlt" => (Cond::Lt, Opcode::MOV),
        "movle" => (Cond::Le, Opcode::MOV),
        "movgt" => (Cond::Gt, Opcode::MOV),
        "movge" => (Cond::Ge, Opcode::MOV),
        _ => return None,
    };
    Some(resolved)
}

/// Resolve a mnemonic and optional explicit prefix to `(cond, opcode)`.
fn resolve_mnemonic(
    line: usize,
    cond: Option<Cond>,
    mnemonic: &str,
) -> Result<(Cond, Opcode), AsmError> {
    let unknown = || AsmError::UnknownMnemonic {
        line,
        mnemonic: mnemonic.to_string(),
    };

    match cond {
        // An explicit prefix only composes with base opcodes.
        Some(cond) => Opcode::from_mnemonic(mnemonic)
            .map(|op| (cond, op))
            .ok_or_else(unknown),
        None => legacy_alias(mnemonic)
            .or_else(|| Opcode::from_mnemonic(mnemonic).map(|op| (Cond::Always, op)))
            .ok_or_else(unknown),
    }
}

/// Size in bytes a parsed body will occupy, without emitting anything.
fn body_size(line: usize, body: &Body<'_>) -> Result<u32, AsmError> {
    let size = match body {
        Body::Instr { cond, mnemonic, .. } => {
            let (_, opcode) = resolve_mnemonic(line, *cond, mnemonic)?;
            opcode.size()
        }
        Body::Directive(Directive::Byte(values)) => values.len() as u32,
        Body::Directive(Directive::Word(values)) => 4 * values.len() as u32,
        Body::Directive(Directive::Str(s)) => s.len() as u32,
        Body::Directive(Directive::Space(n)) => *n,
    };
    Ok(size)
}

/// Operand categories used for table-driven validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Reg,
    Imm,
    Mem,
    Addr,
}

impl ArgKind {
    const fn describe(self) -> &'static str {
        match self {
            Self::Reg => "a register",
            Self::Imm => "an immediate",
            Self::Mem => "a memory reference",
            Self::Addr => "an address",
        }
    }
}

fn expected_args(opcode: Opcode) -> &'static [ArgKind] {
    use crate::Layout;
    match opcode.layout() {
        Layout::Nullary => &[],
        Layout::ThreeReg => &[ArgKind::Reg, ArgKind::Reg, ArgKind::Reg],
        Layout::RegPair => &[ArgKind::Reg, ArgKind::Reg],
        Layout::SingleReg => &[ArgKind::Reg],
        Layout::RegRegImm8 => &[ArgKind::Reg, ArgKind::Reg, ArgKind::Imm],
        Layout::RegImm8 => &[ArgKind::Reg, ArgKind::Imm],
        Layout::Mem => &[ArgKind::Reg, ArgKind::Mem],
        Layout::HdrRegImm16 | Layout::HdrRegImm32 => &[ArgKind::Reg, ArgKind::Imm],
        Layout::Imm16 | Layout::Imm8 => &[ArgKind::Imm],
        Layout::Addr24 => &[ArgKind::Addr],
    }
}

struct Emitter<'s> {
    symbols: &'s BTreeMap<String, u32>,
}

impl Emitter<'_> {
    fn value(&self, line: usize, value: &Value<'_>) -> Result<i64, AsmError> {
        match value {
            Value::Num(n) => Ok(*n),
            Value::Sym(name) => self
                .symbols
                .get(*name)
                .map(|&addr| addr as i64)
                .ok_or_else(|| AsmError::UndefinedLabel {
                    line,
                    label: name.to_string(),
                }),
        }
    }

    fn reg(&self, operands: &[Operand<'_>], index: usize) -> RegId {
        match operands[index] {
            Operand::Reg(reg) => reg,
            _ => unreachable!("operand types were validated"),
        }
    }

    fn imm(&self, line: usize, operands: &[Operand<'_>], index: usize) -> Result<i64, AsmError> {
        match &operands[index] {
            Operand::Imm(value) => self.value(line, value),
            _ => unreachable!("operand types were validated"),
        }
    }

    fn imm8(&self, line: usize, ops: &[Operand<'_>], index: usize) -> Result<Imm8, AsmError> {
        let v = self.imm(line, ops, index)?;
        if !(-128..=255).contains(&v) {
            return Err(AsmError::OutOfRange { line, value: v, what: "imm8" });
        }
        Ok(Imm8::new(v as u8))
    }

    fn imm16(&self, line: usize, ops: &[Operand<'_>], index: usize) -> Result<Imm16, AsmError> {
        let v = self.imm(line, ops, index)?;
        if !(-32768..=65535).contains(&v) {
            return Err(AsmError::OutOfRange { line, value: v, what: "imm16" });
        }
        Ok(Imm16::new(v as u16))
    }

    fn imm32(&self, line: usize, ops: &[Operand<'_>], index: usize) -> Result<Imm32, AsmError> {
        let v = self.imm(line, ops, index)?;
        if !(0..=u32::MAX as i64).contains(&v) {
            return Err(AsmError::OutOfRange { line, value: v, what: "imm32" });
        }
        Ok(Imm32::new(v as u32))
    }

    fn addr24(&self, line: usize, ops: &[Operand<'_>], index: usize) -> Result<Imm24, AsmError> {
        let v = match &ops[index] {
            Operand::Addr(value) => self.value(line, value)?,
            _ => unreachable!("operand types were validated"),
        };
        if !(0..=Imm24::MAX as i64).contains(&v) {
            return Err(AsmError::OutOfRange { line, value: v, what: "address" });
        }
        Ok(Imm24::new_truncate(v as u32))
    }

    fn mem(&self, line: usize, ops: &[Operand<'_>], index: usize) -> Result<(RegId, Imm8), AsmError> {
        match ops[index] {
            Operand::Mem { base, offset } => {
                if !(-128..=127).contains(&offset) {
                    return Err(AsmError::OutOfRange { line, value: offset, what: "offset8" });
                }
                Ok((base, Imm8::new(offset as i8 as u8)))
            }
            _ => unreachable!("operand types were validated"),
        }
    }

    fn instruction(
        &self,
        line: usize,
        cond: Cond,
        opcode: Opcode,
        ops: &[Operand<'_>],
    ) -> Result<Vec<u8>, AsmError> {
        let expected = expected_args(opcode);
        let mnemonic = opcode.mnemonic();

        if ops.len() != expected.len() {
            return Err(AsmError::BadOperand {
                line,
                message: format!(
                    "`{mnemonic}` expects {} operand{}, got {}",
                    expected.len(),
                    if expected.len() == 1 { "" } else { "s" },
                    ops.len()
                ),
            });
        }

        for (index, (op, want)) in ops.iter().zip(expected).enumerate() {
            let got = match op {
                Operand::Reg(_) => ArgKind::Reg,
                Operand::Imm(_) => ArgKind::Imm,
                Operand::Mem { .. } => ArgKind::Mem,
                Operand::Addr(_) => ArgKind::Addr,
            };
            if got != *want {
                let detail = if *want == ArgKind::Imm && got == ArgKind::Addr {
                    // bare number in an immediate slot
                    format!(
                        "`{mnemonic}` operand {} must be an immediate (prefix the value with `#`)",
                        index + 1
                    )
                } else {
                    format!(
                        "`{mnemonic}` operand {} must be {}",
                        index + 1,
                        want.describe()
                    )
                };
                return Err(AsmError::BadOperand { line, message: detail });
            }
        }

        let instruction = match opcode {
            Opcode::HALT => Instruction::Halt,
            Opcode::NOP => Instruction::Nop,
            Opcode::RET => Instruction::Ret,
            Opcode::RETI => Instruction::Reti,
            Opcode::LEAVE => Instruction::Leave,
            Opcode::SYSCALL => Instruction::Syscall,

            Opcode::ADD | Opcode::SUB | Opcode::MUL | Opcode::DIV | Opcode::MOD
            | Opcode::AND | Opcode::OR | Opcode::XOR | Opcode::SHL | Opcode::SHR
            | Opcode::SAR | Opcode::ROL | Opcode::ROR => {
                let dst = self.reg(ops, 0);
                let lhs = self.reg(ops, 1);
                let rhs = self.reg(ops, 2);
                match opcode {
                    Opcode::ADD => Instruction::Add { dst, lhs, rhs },
                    Opcode::SUB => Instruction::Sub { dst, lhs, rhs },
                    Opcode::MUL => Instruction::Mul { dst, lhs, rhs },
                    Opcode::DIV => Instruction::Div { dst, lhs, rhs },
                    Opcode::MOD => Instruction::Mod { dst, lhs, rhs },
                    Opcode::AND => Instruction::And { dst, lhs, rhs },
                    Opcode::OR => Instruction::Or { dst, lhs, rhs },
                    Opcode::XOR => Instruction::Xor { dst, lhs, rhs },
                    Opcode::SHL => Instruction::Shl { dst, lhs, rhs },
                    Opcode::SHR => Instruction::Shr { dst, lhs, rhs },
                    Opcode::SAR => Instruction::Sar { dst, lhs, rhs },
                    Opcode::ROL => Instruction::Rol { dst, lhs, rhs },
                    _ => Instruction::Ror { dst, lhs, rhs },
                }
            }

            Opcode::MOV => Instruction::Mov { dst: self.reg(ops, 0), src: self.reg(ops, 1) },
            Opcode::CMP => Instruction::Cmp { lhs: self.reg(ops, 0), rhs: self.reg(ops, 1) },
            Opcode::PUSH => Instruction::Push { reg: self.reg(ops, 0) },
            Opcode::POP => Instruction::Pop { reg: self.reg(ops, 0) },
            Opcode::INC => Instruction::Inc { reg: self.reg(ops, 0) },
            Opcode::DEC => Instruction::Dec { reg: self.reg(ops, 0) },
            Opcode::NEG => Instruction::Neg { reg: self.reg(ops, 0) },
            Opcode::NOT => Instruction::Not { reg: self.reg(ops, 0) },
            Opcode::JMPR => Instruction::Jmpr { reg: self.reg(ops, 0) },
            Opcode::CALLI => Instruction::Calli { reg: self.reg(ops, 0) },

            Opcode::MOVI => Instruction::Movi {
                reg: self.reg(ops, 0),
                imm: self.imm16(line, ops, 1)?,
            },
            Opcode::MOVHI => Instruction::Movhi {
                reg: self.reg(ops, 0),
                imm: self.imm16(line, ops, 1)?,
            },
            Opcode::ADDI => Instruction::Addi {
                dst: self.reg(ops, 0),
                src: self.reg(ops, 1),
                imm: self.imm8(line, ops, 2)?,
            },
            Opcode::CMPI => Instruction::Cmpi {
                reg: self.reg(ops, 0),
                imm: self.imm8(line, ops, 1)?,
            },
            Opcode::LIMM => Instruction::Limm {
                reg: self.reg(ops, 0),
                imm: self.imm32(line, ops, 1)?,
            },

            Opcode::LOAD => {
                let (base, offset) = self.mem(line, ops, 1)?;
                Instruction::Load { dst: self.reg(ops, 0), base, offset }
            }
            Opcode::STORE => {
                let (base, offset) = self.mem(line, ops, 1)?;
                Instruction::Store { src: self.reg(ops, 0), base, offset }
            }
            Opcode::LOADB => {
                let (base, offset) = self.mem(line, ops, 1)?;
                Instruction::Loadb { dst: self.reg(ops, 0), base, offset }
            }
            Opcode::STOREB => {
                let (base, offset) = self.mem(line, ops, 1)?;
                Instruction::Storeb { src: self.reg(ops, 0), base, offset }
            }

            Opcode::JMP => Instruction::Jmp { target: self.addr24(line, ops, 0)? },
            Opcode::CALL => Instruction::Call { target: self.addr24(line, ops, 0)? },
            Opcode::ENTER => Instruction::Enter { locals: self.imm16(line, ops, 0)? },
            Opcode::TRAP => Instruction::Trap { number: self.imm8(line, ops, 0)? },
        };

        Ok(instruction.encode(cond).as_ref().to_vec())
    }

    fn directive(&self, line: usize, directive: &Directive<'_>) -> Result<Vec<u8>, AsmError> {
        let mut out = Vec::new();
        match directive {
            Directive::Byte(values) => {
                for value in values {
                    let v = self.value(line, value)?;
                    if !(-128..=255).contains(&v) {
                        return Err(AsmError::OutOfRange { line, value: v, what: "byte" });
                    }
                    out.push(v as u8);
                }
            }
            Directive::Word(values) => {
                for value in values {
                    let v = self.value(line, value)?;
                    if !(i32::MIN as i64..=u32::MAX as i64).contains(&v) {
                        return Err(AsmError::OutOfRange { line, value: v, what: "word" });
                    }
                    out.extend_from_slice(&(v as u32).to_le_bytes());
                }
            }
            Directive::Str(s) => out.extend_from_slice(s.as_bytes()),
            Directive::Space(n) => out.resize(*n as usize, 0),
        }
        Ok(out)
    }
}

/// Assemble a complete source text into an image.
pub fn assemble_source(source: &str) -> Result<Assembled, AsmError> {
    let mut stmts = Vec::new();
    let mut symbols = BTreeMap::new();

    // Pass 1: sizes and label addresses.
    let mut address: u32 = 0;
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let stmt = parse::parse_line(raw).map_err(|e| AsmError::from_parse(line, e))?;

        if let Some(label) = stmt.label {
            if symbols.insert(label.to_string(), address).is_some() {
                return Err(AsmError::DuplicateLabel { line, label: label.to_string() });
            }
        }
        if let Some(body) = &stmt.body {
            let size = body_size(line, body)?;
            address = address.checked_add(size).ok_or(AsmError::OutOfRange {
                line,
                value: size as i64,
                what: "image size",
            })?;
        }
        stmts.push((line, stmt));
    }

    // Pass 2: emission.
    let emitter = Emitter { symbols: &symbols };
    let mut program = Vec::with_capacity(address as usize);
    let mut source_map = Vec::new();
    for (line, stmt) in &stmts {
        let Some(body) = &stmt.body else { continue };
        let bytes = match body {
            Body::Instr { cond, mnemonic, operands } => {
                let (cond, opcode) = resolve_mnemonic(*line, *cond, mnemonic)?;
                emitter.instruction(*line, cond, opcode, operands)?
            }
            Body::Directive(directive) => emitter.directive(*line, directive)?,
        };
        if !bytes.is_empty() {
            source_map.push(SourceSpan {
                line: *line,
                address: program.len() as u32,
                size: bytes.len() as u32,
            });
        }
        program.extend_from_slice(&bytes);
    }

    debug_assert_eq!(program.len() as u32, address);

    Ok(Assembled {
        program,
        symbols,
        source_map,
        output_file: None,
    })
}

/// Assemble a source file, writing the image beside it unless told otherwise.
pub fn assemble_file(path: impl AsRef<Path>, options: &Options) -> Result<Assembled, AsmError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| AsmError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut assembled = assemble_source(&source)?;

    if !options.no_output {
        let output = options
            .output
            .clone()
            .unwrap_or_else(|| path.with_extension("bin"));
        std::fs::write(&output, &assembled.program).map_err(|source| AsmError::Io {
            path: output.clone(),
            source,
        })?;
        assembled.output_file = Some(output);
    }

    Ok(assembled)
}

/// Assemble a single line for `address`, without a symbol table.
///
/// Label definitions are rejected: one line cannot define a symbol anything
/// else could see.
pub fn assemble_line(line: &str, address: u32) -> Result<AssembledLine, AsmError> {
    let stmt = parse::parse_line(line).map_err(|e| AsmError::from_parse(1, e))?;

    if stmt.label.is_some() {
        return Err(AsmError::Syntax {
            line: 1,
            message: "labels need a full assembly pass".into(),
        });
    }

    let symbols = BTreeMap::new();
    let emitter = Emitter { symbols: &symbols };

    let bytes = match &stmt.body {
        None => Vec::new(),
        Some(Body::Instr { cond, mnemonic, operands }) => {
            let (cond, opcode) = resolve_mnemonic(1, *cond, mnemonic)?;
            emitter.instruction(1, cond, opcode, operands)?
        }
        Some(Body::Directive(directive)) => emitter.directive(1, directive)?,
    };

    Ok(AssembledLine {
        address,
        size: bytes.len() as u32,
        bytes,
    })
}

/// Size in bytes a single line would occupy, without emitting it.
pub fn estimate_size(line: &str) -> Result<u32, AsmError> {
    let stmt = parse::parse_line(line).map_err(|e| AsmError::from_parse(1, e))?;
    match &stmt.body {
        None => Ok(0),
        Some(body) => body_size(1, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Header, Opcode};

    fn assemble(src: &str) -> Assembled {
        assemble_source(src).expect("assembly failed")
    }

    #[test]
    fn hello_add_image() {
        let out = assemble(
            "movi r1, #3\n\
             movi r2, #4\n\
             add  r0, r1, r2\n\
             halt\n",
        );
        assert_eq!(out.program.len(), 4 + 4 + 4 + 2);

        // last instruction is a bare HALT header
        let tail = &out.program[12..];
        let header = Header::from_raw(u16::from_le_bytes([tail[0], tail[1]]));
        assert_eq!(header.opcode, Opcode::HALT as u8);
        assert_eq!(header.cond, Cond::Always);
    }

    #[test]
    fn label_resolution_forward_and_back() {
        let out = assemble(
            "start: movi r0, #1\n\
             jmp end\n\
             movi r0, #2\n\
             end: halt\n",
        );
        assert_eq!(out.symbols["start"], 0);
        // movi(4) + jmp(6) + movi(4)
        assert_eq!(out.symbols["end"], 14);

        // the jmp target bytes point at `end`
        let jmp = &out.program[4..10];
        assert_eq!(&jmp[2..5], &[14, 0, 0]);

        // the unreachable movi is still present at its pass-1 address
        let header = Header::from_raw(u16::from_le_bytes([out.program[10], out.program[11]]));
        assert_eq!(header.opcode, Opcode::MOVI as u8);
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let err = assemble_source("a: nop\na: nop\n").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateLabel { line: 2, ref label } if label == "a"));
    }

    #[test]
    fn undefined_label_is_rejected() {
        let err = assemble_source("jmp nowhere\n").unwrap_err();
        assert!(matches!(err, AsmError::UndefinedLabel { line: 1, ref label } if label == "nowhere"));
    }

    #[test]
    fn operand_count_message() {
        let err = assemble_source("add r0, r1\n").unwrap_err();
        let AsmError::BadOperand { message, .. } = err else {
            panic!("expected BadOperand, got {err:?}");
        };
        assert_eq!(message, "`add` expects 3 operands, got 2");
    }

    #[test]
    fn operand_type_message() {
        let err = assemble_source("mov r0, #1\n").unwrap_err();
        let AsmError::BadOperand { message, .. } = err else {
            panic!("expected BadOperand, got {err:?}");
        };
        assert_eq!(message, "`mov` operand 2 must be a register");
    }

    #[test]
    fn bare_number_in_immediate_slot() {
        let err = assemble_source("movi r0, 3\n").unwrap_err();
        let AsmError::BadOperand { message, .. } = err else {
            panic!("expected BadOperand, got {err:?}");
        };
        assert!(message.contains("must be an immediate"), "{message}");
    }

    #[test]
    fn immediate_ranges() {
        assert!(assemble_source("movi r0, #65535\n").is_ok());
        assert!(assemble_source("movi r0, #-32768\n").is_ok());
        assert!(matches!(
            assemble_source("movi r0, #65536\n"),
            Err(AsmError::OutOfRange { what: "imm16", .. })
        ));
        assert!(matches!(
            assemble_source("addi r0, r0, #256\n"),
            Err(AsmError::OutOfRange { what: "imm8", .. })
        ));
        assert!(matches!(
            assemble_source("load r0, [r1+200]\n"),
            Err(AsmError::OutOfRange { what: "offset8", .. })
        ));
    }

    #[test]
    fn negative_immediates_store_twos_complement() {
        let out = assemble("movi r5, #-1\n");
        assert_eq!(&out.program[2..4], &[0xff, 0xff]);
        let header = Header::from_raw(u16::from_le_bytes([out.program[0], out.program[1]]));
        assert_eq!(header.field, 5);
    }

    #[test]
    fn legacy_aliases_expand_to_conditional_forms() {
        let a = assemble("jz 0x20\n").program;
        let b = assemble("ifeq jmp 0x20\n").program;
        assert_eq!(a, b);

        let a = assemble("movnz r1, r2\n").program;
        let b = assemble("ifne mov r1, r2\n").program;
        assert_eq!(a, b);
    }

    #[test]
    fn alias_with_explicit_prefix_is_unknown() {
        assert!(matches!(
            assemble_source("ifeq jz 0\n"),
            Err(AsmError::UnknownMnemonic { ref mnemonic, .. }) if mnemonic == "jz"
        ));
    }

    #[test]
    fn directives_emit_expected_bytes() {
        let out = assemble(
            "msg: .string \"ok\\n\"\n\
             .byte 1, 2, 0xff\n\
             .word 0x11223344\n\
             .space 3\n",
        );
        assert_eq!(
            out.program,
            [b'o', b'k', b'\n', 1, 2, 0xff, 0x44, 0x33, 0x22, 0x11, 0, 0, 0]
        );
        assert_eq!(out.symbols["msg"], 0);
    }

    #[test]
    fn word_directive_accepts_labels() {
        let out = assemble(
            ".word after\n\
             after: halt\n",
        );
        assert_eq!(&out.program[..4], &[4, 0, 0, 0]);
    }

    #[test]
    fn labels_land_on_following_instruction() {
        let out = assemble(
            "nop\n\
             here:\n\
             halt\n",
        );
        assert_eq!(out.symbols["here"], 2);
        assert_eq!(out.program.len(), 4);
    }

    #[test]
    fn immediate_label_values_work() {
        // a label address used as an immediate
        let out = assemble(
            "limm r1, #msg\n\
             halt\n\
             msg: .byte 9\n",
        );
        // limm(6) + halt(2) => msg at 8
        assert_eq!(out.symbols["msg"], 8);
        assert_eq!(&out.program[2..6], &[8, 0, 0, 0]);
    }

    #[test]
    fn assemble_line_round() {
        let line = assemble_line("add r0, r1, r2", 0x100).unwrap();
        assert_eq!(line.address, 0x100);
        assert_eq!(line.size, 4);

        let blank = assemble_line("; nothing here", 0).unwrap();
        assert_eq!(blank.size, 0);

        assert!(matches!(
            assemble_line("x: nop", 0),
            Err(AsmError::Syntax { .. })
        ));
    }

    #[test]
    fn estimate_size_matches_table() {
        assert_eq!(estimate_size("halt").unwrap(), 2);
        assert_eq!(estimate_size("add r0, r1, r2").unwrap(), 4);
        assert_eq!(estimate_size("jmp 0").unwrap(), 6);
        assert_eq!(estimate_size(".word 1, 2").unwrap(), 8);
        assert_eq!(estimate_size(".string \"ab\"").unwrap(), 2);
        assert_eq!(estimate_size("label: ; comment").unwrap(), 0);
    }

    #[test]
    fn source_map_covers_the_image() {
        let out = assemble(
            "; leading comment\n\
             start: movi r0, #1\n\
             jmp start\n\
             \n\
             msg: .string \"hi\"\n",
        );

        assert_eq!(
            out.source_map,
            [
                SourceSpan { line: 2, address: 0, size: 4 },
                SourceSpan { line: 3, address: 4, size: 6 },
                SourceSpan { line: 5, address: 10, size: 2 },
            ]
        );
        assert_eq!(out.line_at(0), Some(2));
        assert_eq!(out.line_at(9), Some(3));
        assert_eq!(out.line_at(12), None);
        assert_eq!(out.address_of_line(5), Some(10));
        assert_eq!(out.address_of_line(1), None);
    }

    #[test]
    fn enter_and_trap_take_hash_immediates() {
        assert!(assemble_source("enter #2\ntrap #7\n").is_ok());
        assert!(matches!(
            assemble_source("enter 2\n"),
            Err(AsmError::BadOperand { .. })
        ));
    }
}
