//! Debugger state: breakpoints, watchpoints and the user symbol table.
//!
//! This state deliberately survives [`crate::Vm::reset`] so a session keeps
//! its breakpoints across program reloads; `clear` wipes it explicitly.

use hashbrown::{HashMap, HashSet};

/// Debugger bookkeeping attached to a VM.
#[derive(Debug, Default, Clone)]
pub struct Debugger {
    pub(crate) breakpoints: HashSet<u32>,
    /// Watched address mapped to the last observed word.
    pub(crate) watchpoints: HashMap<u32, u32>,
    symbols: HashMap<String, u32>,
    pub(crate) running: bool,
    pub(crate) single_stepping: bool,
    /// Breakpoint that already reported at the current PC, so resuming does
    /// not immediately re-trigger it.
    pub(crate) last_break: Option<u32>,
}

impl Debugger {
    /// Flip a breakpoint; returns true when the breakpoint is now set.
    pub fn toggle_breakpoint(&mut self, pc: u32) -> bool {
        if self.breakpoints.remove(&pc) {
            false
        } else {
            self.breakpoints.insert(pc);
            true
        }
    }

    /// True when `pc` carries a breakpoint.
    pub fn has_breakpoint(&self, pc: u32) -> bool {
        self.breakpoints.contains(&pc)
    }

    /// Breakpoint addresses in unspecified order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Flip a watchpoint, recording `current` as the baseline word on
    /// creation; returns true when the watchpoint is now set.
    pub fn toggle_watchpoint(&mut self, addr: u32, current: u32) -> bool {
        if self.watchpoints.remove(&addr).is_some() {
            false
        } else {
            self.watchpoints.insert(addr, current);
            true
        }
    }

    /// True when `addr` is being watched.
    pub fn has_watchpoint(&self, addr: u32) -> bool {
        self.watchpoints.contains_key(&addr)
    }

    /// Watched addresses in unspecified order.
    pub fn watchpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.watchpoints.keys().copied()
    }

    /// Define or move a symbol.
    pub fn set_symbol(&mut self, name: impl Into<String>, addr: u32) {
        self.symbols.insert(name.into(), addr);
    }

    /// Remove a symbol; returns its address if it existed.
    pub fn remove_symbol(&mut self, name: &str) -> Option<u32> {
        self.symbols.remove(name)
    }

    /// Copy a whole symbol table, e.g. the assembler's output.
    pub fn import_symbols<I>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        self.symbols.extend(symbols);
    }

    /// Resolve `name` or `name+offset` / `name-offset` to an address.
    pub fn resolve(&self, expr: &str) -> Option<u32> {
        let expr = expr.trim();
        let (name, offset) = match expr.find(|c| c == '+' || c == '-') {
            Some(pos) => {
                let offset_str = &expr[pos..];
                let magnitude = parse_number(offset_str[1..].trim())?;
                let offset = if offset_str.starts_with('-') {
                    magnitude.wrapping_neg()
                } else {
                    magnitude
                };
                (expr[..pos].trim_end(), offset)
            }
            None => (expr, 0),
        };
        let base = self.symbols.get(name)?;
        Some(base.wrapping_add(offset))
    }

    /// Cooperative cancellation: the run loop notices between instructions.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// True while `run()` is looping.
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Get single-stepping mode.
    pub const fn single_stepping(&self) -> bool {
        self.single_stepping
    }

    /// Set single-stepping mode: `run()` pauses after every instruction.
    pub fn set_single_stepping(&mut self, single_stepping: bool) {
        self.single_stepping = single_stepping;
    }

    /// Forget breakpoints, watchpoints and symbols.
    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.watchpoints.clear();
        self.symbols.clear();
        self.last_break = None;
    }
}

fn parse_number(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_toggle() {
        let mut d = Debugger::default();
        assert!(d.toggle_breakpoint(0x10));
        assert!(d.has_breakpoint(0x10));
        assert!(!d.toggle_breakpoint(0x10));
        assert!(!d.has_breakpoint(0x10));
    }

    #[test]
    fn watchpoints_record_baseline() {
        let mut d = Debugger::default();
        assert!(d.toggle_watchpoint(0x100, 7));
        assert_eq!(d.watchpoints.get(&0x100), Some(&7));
        assert!(!d.toggle_watchpoint(0x100, 7));
        assert!(!d.has_watchpoint(0x100));
    }

    #[test]
    fn symbol_resolution_with_offsets() {
        let mut d = Debugger::default();
        d.set_symbol("main", 0x40);
        assert_eq!(d.resolve("main"), Some(0x40));
        assert_eq!(d.resolve("main+8"), Some(0x48));
        assert_eq!(d.resolve("main + 0x10"), Some(0x50));
        assert_eq!(d.resolve("main-4"), Some(0x3c));
        assert_eq!(d.resolve("missing"), None);
        assert_eq!(d.resolve("main+zz"), None);
    }

    #[test]
    fn clear_wipes_everything() {
        let mut d = Debugger::default();
        d.toggle_breakpoint(1);
        d.toggle_watchpoint(2, 0);
        d.set_symbol("x", 3);
        d.clear();
        assert_eq!(d.breakpoints().count(), 0);
        assert_eq!(d.watchpoints().count(), 0);
        assert_eq!(d.resolve("x"), None);
    }
}
