//! Runtime error implementation.
//!
//! Every kind is a distinct tagged value; the interpreter halts on all of
//! them. Allocator exhaustion is deliberately not represented here: a failed
//! allocation returns address 0 so guest programs can recover.

/// Runtime failure raised during instruction execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[must_use]
pub enum VmError {
    /// Memory access outside `[0, memory_size)`.
    #[error("memory access violation at 0x{addr:08x}")]
    MemoryAccessViolation {
        /// The offending address.
        addr: u32,
    },
    /// The stack grew below address zero.
    #[error("stack overflow")]
    StackOverflow,
    /// The stack pointer rose past the end of memory.
    #[error("stack underflow")]
    StackUnderflow,
    /// DIV or MOD with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// The byte at the program counter is not an assigned opcode.
    #[error("unknown opcode 0x{opcode:02x}")]
    UnknownOpcode {
        /// The unassigned byte.
        opcode: u8,
    },
    /// TRAP with no handler registered for the number.
    #[error("unhandled trap {number}")]
    UnhandledTrap {
        /// The trap number.
        number: u8,
    },
    /// SYSCALL with an unrecognised number.
    ///
    /// The interpreter maps this to a NOSYS result code in r0 and keeps
    /// running; it only escapes to callers of the raw syscall dispatch.
    #[error("syscall {number} not implemented")]
    SyscallNotImplemented {
        /// The unrecognised syscall number.
        number: u32,
    },
}

/// Result alias for VM operations.
pub type VmResult<T> = Result<T, VmError>;
