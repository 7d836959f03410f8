//! VM parameters.

use core::mem;

/// Number of general-purpose registers.
pub const VM_REGISTER_COUNT: usize = 16;

/// Length of a machine word, in bytes.
pub const WORD_SIZE: usize = mem::size_of::<u32>();

/// Default size of VM memory, in bytes.
pub const MEM_SIZE: usize = 1024 * 1024;

/// First byte the heap allocator owns; everything below is reserved for the
/// loaded program, static data and early stack frames.
pub const HEAP_BASE: u32 = 0x10000;

/// Gap between the top of memory and the initial stack pointer.
pub const STACK_RESERVE: u32 = 8;

/// Heap allocation granularity and alignment, in bytes.
pub const HEAP_ALIGN: u32 = 8;
