//! System call surface.
//!
//! r0 selects the call, r1..r3 carry arguments, r0 receives the result. The
//! layer owns the numeric tables; the only state it touches is the allocator,
//! the output sink and the halted flag.

use std::io::Write;

use super::Vm;
use crate::{
    error::{VmError, VmResult},
    heap::Realloc,
};

/// Recognised syscall numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Allocate r1 bytes; r0 receives the address or 0.
    Alloc = 1,
    /// Release the allocation at r1; r0 receives OK or INVALID.
    Free = 2,
    /// Resize the allocation at r1 to r2 bytes; r0 receives the address or 0.
    Realloc = 3,
    /// Halt with exit code r1; r0 receives the code.
    Exit = 20,
    /// Write r2 bytes at r1 to the output sink; r0 receives the count.
    Print = 30,
    /// Write the low byte of r1 to the output sink; r0 receives 1.
    Putchar = 32,
}

impl TryFrom<u32> for SyscallNumber {
    type Error = VmError;

    fn try_from(number: u32) -> Result<Self, VmError> {
        let call = match number {
            1 => Self::Alloc,
            2 => Self::Free,
            3 => Self::Realloc,
            20 => Self::Exit,
            30 => Self::Print,
            32 => Self::Putchar,
            _ => return Err(VmError::SyscallNotImplemented { number }),
        };
        Ok(call)
    }
}

/// Result codes written to r0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SysCode {
    /// Success.
    Ok = 0,
    /// Out of memory.
    Nomem = 1,
    /// Bad file descriptor.
    Badfd = 2,
    /// Object not found.
    Notfound = 3,
    /// Permission denied.
    Perm = 4,
    /// Input/output failure.
    Io = 5,
    /// Syscall not implemented.
    Nosys = 6,
    /// Invalid argument.
    Invalid = 7,
}

impl Vm {
    /// SYSCALL: dispatch on r0.
    ///
    /// Unrecognised numbers surface internally as
    /// [`VmError::SyscallNotImplemented`] and are mapped to a NOSYS result
    /// code here; the program keeps running. Every other error halts.
    pub(crate) fn syscall(&mut self) -> VmResult<()> {
        match self.dispatch_syscall() {
            Ok(result) => {
                self.registers[0] = result;
                Ok(())
            }
            Err(VmError::SyscallNotImplemented { number }) => {
                tracing::warn!(number, "syscall not implemented");
                self.registers[0] = SysCode::Nosys as u32;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Raw dispatch, exposed for tooling that wants the error rather than
    /// the NOSYS mapping.
    pub fn dispatch_syscall(&mut self) -> VmResult<u32> {
        let number = self.registers[0];
        let call = SyscallNumber::try_from(number)?;

        match call {
            SyscallNumber::Alloc => Ok(self.allocator.alloc(self.registers[1])),

            SyscallNumber::Free => Ok(if self.allocator.free(self.registers[1]) {
                SysCode::Ok as u32
            } else {
                SysCode::Invalid as u32
            }),

            SyscallNumber::Realloc => {
                let addr = self.registers[1];
                let new_size = self.registers[2];
                match self.allocator.realloc(addr, new_size) {
                    Realloc::Moved { to, copy } => {
                        self.memory.copy_within(addr, to, copy)?;
                        Ok(to)
                    }
                    other => Ok(other.address()),
                }
            }

            SyscallNumber::Exit => {
                self.halted = true;
                Ok(self.registers[1])
            }

            SyscallNumber::Print => {
                let ptr = self.registers[1];
                let len = self.registers[2];
                let data = self.memory.slice(ptr, len)?.to_vec();
                match self.output.write_all(&data).and_then(|()| self.output.flush()) {
                    Ok(()) => Ok(len),
                    Err(_) => Ok(SysCode::Io as u32),
                }
            }

            SyscallNumber::Putchar => {
                let byte = [self.registers[1] as u8];
                match self.output.write_all(&byte).and_then(|()| self.output.flush()) {
                    Ok(()) => Ok(1),
                    Err(_) => Ok(SysCode::Io as u32),
                }
            }
        }
    }
}
