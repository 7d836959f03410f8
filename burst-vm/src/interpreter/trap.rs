//! Software trap dispatch.
//!
//! Handlers are host callbacks registered per trap number. They see the
//! register file, flags, SP/PC and memory through [`TrapContext`] but not the
//! trap table itself, so a handler cannot re-enter dispatch.

use burst_asm::Flags;
use hashbrown::HashMap;

use super::Vm;
use crate::{
    consts::VM_REGISTER_COUNT,
    debugger::Debugger,
    error::{VmError, VmResult},
    memory::Memory,
};

/// Mutable view of the VM a trap handler operates on.
pub struct TrapContext<'a> {
    /// General-purpose registers.
    pub registers: &'a mut [u32; VM_REGISTER_COUNT],
    /// Program counter, already advanced past the TRAP instruction.
    pub pc: &'a mut u32,
    /// Stack pointer.
    pub sp: &'a mut u32,
    /// Flag word.
    pub flags: &'a mut Flags,
    /// VM memory.
    pub memory: &'a mut Memory,
    /// Debugger state, e.g. to request a cooperative stop.
    pub debugger: &'a mut Debugger,
}

/// A registered trap handler.
pub type TrapHandler = Box<dyn FnMut(&mut TrapContext<'_>) -> VmResult<()> + Send>;

/// Trap number to handler table.
#[derive(Default)]
pub(crate) struct TrapTable {
    handlers: HashMap<u8, TrapHandler>,
}

impl TrapTable {
    pub(crate) fn register(&mut self, number: u8, handler: TrapHandler) {
        self.handlers.insert(number, handler);
    }

    pub(crate) fn unregister(&mut self, number: u8) {
        self.handlers.remove(&number);
    }
}

impl Vm {
    /// TRAP n: invoke the registered handler, or halt with Unhandled-Trap.
    pub(crate) fn trap(&mut self, number: u8) -> VmResult<()> {
        let Some(handler) = self.traps.handlers.get_mut(&number) else {
            return Err(VmError::UnhandledTrap { number });
        };

        let mut cx = TrapContext {
            registers: &mut self.registers,
            pc: &mut self.pc,
            sp: &mut self.sp,
            flags: &mut self.flags,
            memory: &mut self.memory,
            debugger: &mut self.debugger,
        };
        handler(&mut cx)
    }
}
