#![allow(dead_code)]

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use burst_vm::prelude::*;

/// Output sink the tests can read back after the VM wrote to it.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8(self.contents()).expect("output was not UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn reg(index: u8) -> RegId {
    RegId::new(index).expect("register index out of range")
}

pub fn assemble(src: &str) -> Vec<u8> {
    burst_asm::asm::assemble_source(src)
        .expect("assembly failed")
        .program
}

/// Assemble `src` and load it at address 0 of a fresh VM.
pub fn load_vm(src: &str) -> Vm {
    let mut vm = Vm::new();
    vm.load_program(&assemble(src)).expect("program load failed");
    vm
}

/// Assemble `src`, load it, and run it to a clean halt.
pub fn run_to_halt(src: &str) -> Vm {
    let mut vm = load_vm(src);
    assert_eq!(vm.run().expect("execution failed"), StopReason::Halted);
    vm
}

/// Like [`load_vm`], but with a capturing output sink attached.
pub fn load_vm_with_output(src: &str) -> (Vm, SharedBuf) {
    let sink = SharedBuf::default();
    let mut vm = Vm::new().with_output(Box::new(sink.clone()));
    vm.load_program(&assemble(src)).expect("program load failed");
    (vm, sink)
}
