//! Syscall layer driven from guest programs.

mod common;

use burst_vm::prelude::*;
use common::{load_vm, load_vm_with_output, reg, run_to_halt};

#[test]
fn print_writes_bytes_and_returns_count() {
    let (mut vm, out) = load_vm_with_output(
        "limm r1, #msg\n\
         movi r2, #7\n\
         movi r0, #30\n\
         syscall\n\
         halt\n\
         msg: .string \"hello \"\n\
         .byte 10\n",
    );

    assert_eq!(vm.run().unwrap(), StopReason::Halted);
    assert_eq!(out.as_string(), "hello \n");
    assert_eq!(vm.get_register(reg(0)), 7);
}

#[test]
fn putchar_writes_one_byte() {
    let (mut vm, out) = load_vm_with_output(
        "movi r1, #65\n\
         movi r0, #32\n\
         syscall\n\
         movi r1, #10\n\
         movi r0, #32\n\
         syscall\n\
         halt\n",
    );

    assert_eq!(vm.run().unwrap(), StopReason::Halted);
    assert_eq!(out.contents(), b"A\n");
    assert_eq!(vm.get_register(reg(0)), 1);
}

#[test]
fn exit_halts_with_the_code_in_r0() {
    let vm = run_to_halt(
        "movi r1, #42\n\
         movi r0, #20\n\
         syscall\n\
         movi r1, #99\n\
         halt\n",
    );
    // the instruction after EXIT never ran
    assert_eq!(vm.get_register(reg(1)), 42);
    assert_eq!(vm.get_register(reg(0)), 42);
}

#[test]
fn unknown_syscall_returns_nosys_and_continues() {
    let vm = run_to_halt(
        "movi r0, #99\n\
         syscall\n\
         movi r3, #1\n\
         halt\n",
    );
    assert_eq!(vm.get_register(reg(0)), SysCode::Nosys as u32);
    assert_eq!(vm.get_register(reg(3)), 1);
}

#[test]
fn raw_dispatch_exposes_the_not_implemented_error() {
    let mut vm = Vm::new();
    vm.set_register(reg(0), 17);
    assert_eq!(
        vm.dispatch_syscall(),
        Err(VmError::SyscallNotImplemented { number: 17 })
    );
}

#[test]
fn free_of_a_bogus_address_returns_invalid() {
    let vm = run_to_halt(
        "limm r1, #0x12345\n\
         movi r0, #2\n\
         syscall\n\
         halt\n",
    );
    assert_eq!(vm.get_register(reg(0)), SysCode::Invalid as u32);
}

#[test]
fn realloc_grow_in_place_keeps_the_address() {
    let vm = run_to_halt(
        "limm r0, #1\n\
         limm r1, #64\n\
         syscall\n\
         mov r4, r0\n\
         mov r1, r4\n\
         limm r2, #256\n\
         limm r0, #3\n\
         syscall\n\
         halt\n",
    );
    assert_eq!(vm.get_register(reg(0)), vm.get_register(reg(4)));
    assert_eq!(vm.allocator().size_of(HEAP_BASE), Some(256));
}

#[test]
fn realloc_move_copies_the_payload() {
    // allocate a, write a marker into it, fence it in, grow it
    let vm = run_to_halt(
        "limm r0, #1\n\
         limm r1, #8\n\
         syscall\n\
         mov r4, r0\n\
         limm r5, #0xfeedface\n\
         store r5, [r4]\n\
         limm r0, #1\n\
         limm r1, #8\n\
         syscall\n\
         mov r6, r0\n\
         mov r1, r4\n\
         limm r2, #64\n\
         limm r0, #3\n\
         syscall\n\
         mov r7, r0\n\
         load r8, [r7]\n\
         halt\n",
    );

    let from = vm.get_register(reg(4));
    let to = vm.get_register(reg(7));
    assert_ne!(from, to, "a fenced-in grow must move");
    assert_eq!(vm.get_register(reg(8)), 0xfeed_face);
    assert_eq!(vm.allocator().size_of(to), Some(64));
    assert_eq!(vm.allocator().size_of(from), None);
}

#[test]
fn alloc_exhaustion_returns_zero_not_an_error() {
    let mut vm = load_vm(
        "limm r1, #0xffffff00\n\
         limm r0, #1\n\
         syscall\n\
         halt\n",
    );
    assert_eq!(vm.run().unwrap(), StopReason::Halted);
    assert_eq!(vm.get_register(reg(0)), 0);
}

#[test]
fn broken_output_sink_reports_the_io_code() {
    struct BrokenSink;

    impl std::io::Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let mut vm = Vm::new().with_output(Box::new(BrokenSink));
    vm.load_program(&common::assemble(
        "movi r1, #65\n\
         movi r0, #32\n\
         syscall\n\
         halt\n",
    ))
    .unwrap();

    assert_eq!(vm.run().unwrap(), StopReason::Halted);
    assert_eq!(vm.get_register(reg(0)), SysCode::Io as u32);
}

#[test]
fn print_with_bad_pointer_is_a_memory_violation() {
    let mut vm = load_vm(
        "limm r1, #0xfffffff0\n\
         movi r2, #64\n\
         movi r0, #30\n\
         syscall\n\
         halt\n",
    );
    assert_eq!(
        vm.run(),
        Err(VmError::MemoryAccessViolation { addr: 0xfffffff0 })
    );
    assert!(vm.is_halted());
}
