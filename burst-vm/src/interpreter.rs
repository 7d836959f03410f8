//! [`Vm`] implementation.
//!
//! One `Vm` owns its memory, register file, flags, heap allocator, trap table
//! and debugger state exclusively; nothing is shared between instances. The
//! hot path is [`Vm::step`]: decode the header at PC, evaluate the condition
//! prefix, then dispatch directly on the typed instruction. No trait-object
//! indirection sits between the loop and the opcode semantics.

use std::io;

use burst_asm::{Flags, Header, Instruction, Opcode, RegId};

use crate::{
    consts::{HEAP_BASE, MEM_SIZE, STACK_RESERVE, VM_REGISTER_COUNT},
    debugger::Debugger,
    error::{VmError, VmResult},
    heap::Allocator,
    memory::Memory,
    state::{ExecuteState, StopReason},
};

mod alu;
mod flow;
pub mod syscall;
mod trap;

pub use trap::{TrapContext, TrapHandler};

/// Construction-time VM configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmParams {
    /// Total memory size in bytes. Must be 8-byte aligned and leave room
    /// for the reserved low region and the initial stack.
    pub memory_size: usize,
}

impl Default for VmParams {
    fn default() -> Self {
        Self {
            memory_size: MEM_SIZE,
        }
    }
}

/// The BURST virtual machine.
pub struct Vm {
    registers: [u32; VM_REGISTER_COUNT],
    pc: u32,
    sp: u32,
    flags: Flags,
    halted: bool,
    memory: Memory,
    allocator: Allocator,
    debugger: Debugger,
    traps: trap::TrapTable,
    output: Box<dyn io::Write + Send>,
    params: VmParams,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Vm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vm")
            .field("pc", &self.pc)
            .field("sp", &self.sp)
            .field("flags", &self.flags)
            .field("halted", &self.halted)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl Vm {
    /// Create a VM with the default parameters, writing to stdout.
    pub fn new() -> Self {
        Self::with_params(VmParams::default())
    }

    /// Create a VM with explicit parameters.
    ///
    /// Panics if `memory_size` is unaligned or too small to hold the
    /// reserved region, the heap and the initial stack.
    pub fn with_params(params: VmParams) -> Self {
        let size = params.memory_size;
        assert!(
            size as u64 > (HEAP_BASE + STACK_RESERVE) as u64 && size % 8 == 0,
            "memory size {size} cannot hold the reserved region and a stack"
        );

        Self {
            registers: [0; VM_REGISTER_COUNT],
            pc: 0,
            sp: size as u32 - STACK_RESERVE,
            flags: Flags::empty(),
            halted: false,
            memory: Memory::new(size),
            allocator: Allocator::new(HEAP_BASE, size as u32),
            debugger: Debugger::default(),
            traps: trap::TrapTable::default(),
            output: Box::new(io::stdout()),
            params,
        }
    }

    /// Replace the output sink used by PRINT and PUTCHAR.
    pub fn with_output(mut self, output: Box<dyn io::Write + Send>) -> Self {
        self.output = output;
        self
    }

    /// Reset registers, flags, PC, SP, memory and the heap.
    ///
    /// Debugger state and trap handlers persist; clear them explicitly.
    pub fn reset(&mut self) {
        self.registers = [0; VM_REGISTER_COUNT];
        self.pc = 0;
        self.sp = self.params.memory_size as u32 - STACK_RESERVE;
        self.flags = Flags::empty();
        self.halted = false;
        self.memory.clear();
        self.allocator.reset();
    }

    /// Copy a program image to address 0. The caller keeps its buffer.
    pub fn load_program(&mut self, bytes: &[u8]) -> VmResult<()> {
        self.load_program_at(bytes, 0)
    }

    /// Copy a program image to an arbitrary address.
    pub fn load_program_at(&mut self, bytes: &[u8], addr: u32) -> VmResult<()> {
        self.memory.write_slice(addr, bytes)
    }

    // --- register file, PC, SP, flags -----------------------------------

    /// Read a register.
    pub fn get_register(&self, reg: RegId) -> u32 {
        self.registers[usize::from(reg)]
    }

    /// Write a register.
    pub fn set_register(&mut self, reg: RegId, value: u32) {
        self.registers[usize::from(reg)] = value;
    }

    /// All sixteen registers.
    pub const fn registers(&self) -> &[u32; VM_REGISTER_COUNT] {
        &self.registers
    }

    /// Current program counter.
    pub const fn get_pc(&self) -> u32 {
        self.pc
    }

    /// Move the program counter.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// Current stack pointer.
    pub const fn get_sp(&self) -> u32 {
        self.sp
    }

    /// Move the stack pointer.
    pub fn set_sp(&mut self, sp: u32) {
        self.sp = sp;
    }

    /// Test a flag bit, e.g. `vm.flag(Flags::Z)`.
    pub fn flag(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    /// The whole flag word.
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// True once HALT, EXIT or an error stopped execution.
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Total memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    // --- memory access ---------------------------------------------------

    /// Read one byte.
    pub fn read_byte(&self, addr: u32) -> VmResult<u8> {
        self.memory.read_u8(addr)
    }

    /// Write one byte.
    pub fn write_byte(&mut self, addr: u32, value: u8) -> VmResult<()> {
        self.memory.write_u8(addr, value)
    }

    /// Read a 16-bit little-endian word.
    pub fn read_word16(&self, addr: u32) -> VmResult<u16> {
        self.memory.read_u16(addr)
    }

    /// Write a 16-bit little-endian word.
    pub fn write_word16(&mut self, addr: u32, value: u16) -> VmResult<()> {
        self.memory.write_u16(addr, value)
    }

    /// Read a 32-bit little-endian word.
    pub fn read_word(&self, addr: u32) -> VmResult<u32> {
        self.memory.read_u32(addr)
    }

    /// Write a 32-bit little-endian word.
    pub fn write_word(&mut self, addr: u32, value: u32) -> VmResult<()> {
        self.memory.write_u32(addr, value)
    }

    /// The raw memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable access to the raw memory.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// The heap allocator state.
    pub const fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    // --- debugger --------------------------------------------------------

    /// Debug handler.
    pub const fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    /// Mutable debug handler.
    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    /// Flip a breakpoint at `pc`; returns true when it is now set.
    pub fn toggle_breakpoint(&mut self, pc: u32) -> bool {
        self.debugger.toggle_breakpoint(pc)
    }

    /// Flip a watchpoint on the word at `addr`, recording the current value
    /// as the baseline; returns true when it is now set.
    pub fn toggle_watchpoint(&mut self, addr: u32) -> VmResult<bool> {
        let current = self.memory.read_u32(addr)?;
        Ok(self.debugger.toggle_watchpoint(addr, current))
    }

    // --- execution -------------------------------------------------------

    /// Execute exactly one instruction cycle.
    ///
    /// Any error halts the VM; no memory or register write is committed
    /// after a failing access.
    pub fn step(&mut self) -> VmResult<ExecuteState> {
        match self.step_inner() {
            Ok(state) => Ok(state),
            Err(error) => {
                self.halted = true;
                tracing::debug!(pc = self.pc, %error, "execution fault");
                Err(error)
            }
        }
    }

    fn step_inner(&mut self) -> VmResult<ExecuteState> {
        if self.halted {
            return Ok(ExecuteState::Halted);
        }

        let pc = self.pc;
        let header = Header::from_raw(self.memory.read_u16(pc)?);
        let opcode = Opcode::try_from(header.opcode).map_err(|_| VmError::UnknownOpcode {
            opcode: header.opcode,
        })?;
        let size = opcode.size();

        if !header.cond.eval(self.flags) {
            // a skipped instruction has no effect beyond the PC
            self.pc = pc.wrapping_add(size);
            return Ok(ExecuteState::Skipped);
        }

        let mut operands = [0u8; 4];
        let count = (size - 2) as usize;
        operands[..count].copy_from_slice(self.memory.slice(pc + 2, size - 2)?);

        // advance before executing so control flow can overwrite
        self.pc = pc.wrapping_add(size);

        let instruction = Instruction::decode(header, &operands[..count])
            .map_err(|_| VmError::UnknownOpcode {
                opcode: header.opcode,
            })?;

        tracing::trace!(pc, %instruction, "execute");

        self.execute(instruction)?;
        Ok(ExecuteState::Proceed)
    }

    /// Run until halt, breakpoint, watchpoint, error or cooperative stop.
    pub fn run(&mut self) -> VmResult<StopReason> {
        self.debugger.running = true;

        loop {
            if self.halted {
                self.debugger.running = false;
                return Ok(StopReason::Halted);
            }
            if !self.debugger.running {
                return Ok(StopReason::Stopped);
            }

            if self.debugger.breakpoints.contains(&self.pc)
                && self.debugger.last_break != Some(self.pc)
            {
                self.debugger.last_break = Some(self.pc);
                self.debugger.running = false;
                tracing::debug!(pc = self.pc, "breakpoint hit");
                return Ok(StopReason::Breakpoint { pc: self.pc });
            }

            let mut hit = None;
            for (&addr, last) in self.debugger.watchpoints.iter_mut() {
                if let Ok(now) = self.memory.read_u32(addr) {
                    if now != *last {
                        hit = Some((addr, *last, now));
                        *last = now;
                        break;
                    }
                }
            }
            if let Some((addr, old, new)) = hit {
                self.debugger.running = false;
                tracing::debug!(addr, old, new, "watchpoint hit");
                return Ok(StopReason::Watchpoint { addr, old, new });
            }

            match self.step() {
                Ok(ExecuteState::Halted) => continue,
                Ok(_) => self.debugger.last_break = None,
                Err(error) => {
                    self.debugger.running = false;
                    return Err(error);
                }
            }

            if self.halted {
                continue;
            }
            if self.debugger.single_stepping {
                self.debugger.running = false;
                return Ok(StopReason::Step { pc: self.pc });
            }
        }
    }

    /// Register a host trap handler for TRAP `number`.
    pub fn register_trap(&mut self, number: u8, handler: TrapHandler) {
        self.traps.register(number, handler);
    }

    /// Remove the handler for TRAP `number`, if any.
    pub fn unregister_trap(&mut self, number: u8) {
        self.traps.unregister(number);
    }

    #[inline]
    fn reg(&self, reg: RegId) -> u32 {
        self.registers[usize::from(reg)]
    }

    #[inline]
    fn set_reg(&mut self, reg: RegId, value: u32) {
        self.registers[usize::from(reg)] = value;
    }

    /// Per-opcode semantics. Flag-writing instructions defer to their own
    /// rule in [`alu`]; everything else leaves the flag word alone.
    fn execute(&mut self, instruction: Instruction) -> VmResult<()> {
        use Instruction as I;

        match instruction {
            I::Halt => self.halted = true,
            I::Nop => {}
            I::Syscall => self.syscall()?,

            I::Ret => self.pc = self.pop()?,
            I::Reti => {
                let word = self.pop()?;
                self.flags = Flags::from_bits_truncate(word as u8);
                self.pc = self.pop()?;
            }
            I::Leave => self.leave()?,
            I::Enter { locals } => self.enter(locals.to_u16())?,

            I::Add { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::add(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Sub { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::sub(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Mul { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::mul(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Div { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::div(&mut self.flags, a, b)?;
                self.set_reg(dst, r);
            }
            I::Mod { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::rem(&mut self.flags, a, b)?;
                self.set_reg(dst, r);
            }
            I::And { dst, lhs, rhs } => {
                let v = self.reg(lhs) & self.reg(rhs);
                let r = alu::bitwise(&mut self.flags, v);
                self.set_reg(dst, r);
            }
            I::Or { dst, lhs, rhs } => {
                let v = self.reg(lhs) | self.reg(rhs);
                let r = alu::bitwise(&mut self.flags, v);
                self.set_reg(dst, r);
            }
            I::Xor { dst, lhs, rhs } => {
                let v = self.reg(lhs) ^ self.reg(rhs);
                let r = alu::bitwise(&mut self.flags, v);
                self.set_reg(dst, r);
            }
            I::Shl { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::shl(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Shr { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::shr(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Sar { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::sar(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Rol { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::rol(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }
            I::Ror { dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                let r = alu::ror(&mut self.flags, a, b);
                self.set_reg(dst, r);
            }

            I::Cmp { lhs, rhs } => {
                let (a, b) = (self.reg(lhs), self.reg(rhs));
                alu::sub(&mut self.flags, a, b);
            }
            I::Cmpi { reg, imm } => {
                let a = self.reg(reg);
                alu::sub(&mut self.flags, a, imm.sext());
            }
            I::Addi { dst, src, imm } => {
                let a = self.reg(src);
                let r = alu::add(&mut self.flags, a, imm.sext());
                self.set_reg(dst, r);
            }

            I::Inc { reg } => {
                let v = self.reg(reg).wrapping_add(1);
                let r = alu::unary(&mut self.flags, v);
                self.set_reg(reg, r);
            }
            I::Dec { reg } => {
                let v = self.reg(reg).wrapping_sub(1);
                let r = alu::unary(&mut self.flags, v);
                self.set_reg(reg, r);
            }
            I::Neg { reg } => {
                let v = self.reg(reg).wrapping_neg();
                let r = alu::unary(&mut self.flags, v);
                self.set_reg(reg, r);
            }
            I::Not { reg } => {
                let v = !self.reg(reg);
                let r = alu::unary(&mut self.flags, v);
                self.set_reg(reg, r);
            }

            I::Mov { dst, src } => {
                let v = self.reg(src);
                self.set_reg(dst, v);
            }
            I::Movi { reg, imm } => self.set_reg(reg, imm.sext()),
            I::Movhi { reg, imm } => {
                let v = (self.reg(reg) & 0x0000_ffff) | ((imm.to_u16() as u32) << 16);
                self.set_reg(reg, v);
            }
            I::Limm { reg, imm } => self.set_reg(reg, imm.to_u32()),

            I::Load { dst, base, offset } => {
                let addr = self.reg(base).wrapping_add(offset.sext());
                let v = self.memory.read_u32(addr)?;
                self.set_reg(dst, v);
            }
            I::Store { src, base, offset } => {
                let addr = self.reg(base).wrapping_add(offset.sext());
                let v = self.reg(src);
                self.memory.write_u32(addr, v)?;
            }
            I::Loadb { dst, base, offset } => {
                let addr = self.reg(base).wrapping_add(offset.sext());
                let v = self.memory.read_u8(addr)?;
                self.set_reg(dst, v as u32);
            }
            I::Storeb { src, base, offset } => {
                let addr = self.reg(base).wrapping_add(offset.sext());
                let v = self.reg(src) as u8;
                self.memory.write_u8(addr, v)?;
            }

            I::Push { reg } => {
                let v = self.reg(reg);
                self.push(v)?;
            }
            I::Pop { reg } => {
                let v = self.pop()?;
                self.set_reg(reg, v);
            }

            I::Jmp { target } => self.pc = target.to_u32(),
            I::Call { target } => {
                self.push(self.pc)?;
                self.pc = target.to_u32();
            }
            I::Jmpr { reg } => self.pc = self.reg(reg),
            I::Calli { reg } => {
                let target = self.reg(reg);
                self.push(self.pc)?;
                self.pc = target;
            }

            I::Trap { number } => self.trap(number.to_u8())?,
        }

        Ok(())
    }
}
