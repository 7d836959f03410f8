//! Disassembler: the inverse of the decoder, driven by the same size table.

use itertools::Itertools;

use crate::{Cond, DecodeError, Header, Instruction};

/// One disassembled instruction (or data fallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembled {
    /// Address the bytes were read from.
    pub address: u32,
    /// The raw bytes covered by `text`.
    pub bytes: Vec<u8>,
    /// Rendered assembly text; reassembling it reproduces `bytes`.
    pub text: String,
    /// Length of `bytes`.
    pub size: u32,
    /// `address + size`.
    pub next_addr: u32,
}

fn data_fallback(address: u32, bytes: &[u8]) -> Disassembled {
    let text = format!(
        "db {}",
        bytes.iter().map(|b| format!("0x{b:02x}")).join(", ")
    );
    Disassembled {
        address,
        bytes: bytes.to_vec(),
        text,
        size: bytes.len() as u32,
        next_addr: address + bytes.len() as u32,
    }
}

/// Disassemble the instruction at `address`, or `None` past the image end.
///
/// Unknown opcodes and truncated tails render as a `db` line over the header
/// bytes so a caller can keep scanning; `next_addr` always advances.
pub fn disassemble_at(image: &[u8], address: u32) -> Option<Disassembled> {
    let at = address as usize;
    if at >= image.len() {
        return None;
    }
    let slice = &image[at..];

    if slice.len() < 2 {
        return Some(data_fallback(address, slice));
    }

    let header = Header::from_raw(u16::from_le_bytes([slice[0], slice[1]]));
    let instruction = match Instruction::decode(header, &slice[2..]) {
        Ok(instruction) => instruction,
        // fall back over the header bytes only
        Err(DecodeError::InvalidOpcode(_)) | Err(DecodeError::Truncated { .. }) => {
            return Some(data_fallback(address, &slice[..2]));
        }
    };

    let size = instruction.size();
    let text = if header.cond == Cond::Always {
        instruction.to_string()
    } else {
        format!("{} {}", header.cond, instruction)
    };

    Some(Disassembled {
        address,
        bytes: slice[..size as usize].to_vec(),
        text,
        size,
        next_addr: address + size,
    })
}

/// Disassemble `count` instructions starting at `address`.
pub fn disassemble_count(image: &[u8], address: u32, count: usize) -> Vec<Disassembled> {
    let mut out = Vec::with_capacity(count);
    let mut address = address;
    for _ in 0..count {
        let Some(d) = disassemble_at(image, address) else { break };
        if d.size == 0 {
            break; // zero progress would loop forever
        }
        address = d.next_addr;
        out.push(d);
    }
    out
}

/// Render `[start, end)` as a listing with address and byte columns:
///
/// ```text
/// 0004: 50 00 0e 00 00 00    jmp 0xe
/// ```
pub fn format_listing(image: &[u8], start: u32, end: u32) -> String {
    disassemble_range(image, start, end)
        .into_iter()
        .map(|d| {
            let bytes = d.bytes.iter().map(|b| format!("{b:02x}")).join(" ");
            format!("{:04x}: {bytes:<18}   {}", d.address, d.text)
        })
        .join("\n")
}

/// Disassemble every instruction in `[start, end)`.
pub fn disassemble_range(image: &[u8], start: u32, end: u32) -> Vec<Disassembled> {
    let mut out = Vec::new();
    let mut address = start;
    while address < end {
        let Some(d) = disassemble_at(image, address) else { break };
        if d.size == 0 {
            break;
        }
        address = d.next_addr;
        out.push(d);
    }
    out
}
