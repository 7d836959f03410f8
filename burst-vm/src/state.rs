//! Execution state representation.

/// Outcome of a single [`crate::Vm::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteState {
    /// The instruction executed normally.
    Proceed,
    /// The condition prefix evaluated false; only the PC advanced.
    Skipped,
    /// The VM is halted (HALT, EXIT or a previous error).
    Halted,
}

/// Why [`crate::Vm::run`] returned control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The program halted.
    Halted,
    /// Execution reached a breakpoint.
    Breakpoint {
        /// The breakpoint address.
        pc: u32,
    },
    /// Single-stepping mode paused after one instruction.
    Step {
        /// PC after the instruction.
        pc: u32,
    },
    /// A watched word changed.
    Watchpoint {
        /// The watched address.
        addr: u32,
        /// Word value before the change.
        old: u32,
        /// Word value after the change.
        new: u32,
    },
    /// [`crate::debugger::Debugger::stop`] cleared the running flag.
    Stopped,
}

impl StopReason {
    /// True when the VM can simply be resumed with another `run()`.
    pub const fn is_resumable(&self) -> bool {
        !matches!(self, Self::Halted)
    }
}
