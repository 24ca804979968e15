//! Textual disassembly of a chunk's instruction stream.
//!
//! Pure formatting: builds a `String`, performs no I/O and never fails.
//! Unknown bytes and truncated trailing operands are rendered inline so a
//! damaged chunk still produces a readable listing.

use crate::bytecode::chunk::{decode_long_index, Chunk, OpCode};

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(feature = "std")]
use std::string::String;

use core::fmt::Write;

/// Produce a multi-line listing of the whole chunk under a `== title ==`
/// header.
pub fn disassemble_chunk(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {title} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// Append one instruction's listing line to `out` and return the offset of
/// the next instruction.
///
/// The line column prints `|` when the source line matches the previous
/// byte's, so instructions from one source line read as a block.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let Some(byte) = chunk.byte(offset) else {
        return chunk.len();
    };

    let _ = write!(out, "{offset:04} ");
    let line = chunk.line_for(offset as u32);
    let prev = offset.checked_sub(1).and_then(|p| chunk.line_for(p as u32));
    match line {
        Some(_) if offset > 0 && prev == line => {
            let _ = write!(out, "   | ");
        }
        Some(l) => {
            let _ = write!(out, "{l:4} ");
        }
        None => {
            let _ = write!(out, "   ? ");
        }
    }

    let Some(op) = OpCode::from_byte(byte) else {
        let _ = writeln!(out, "Unknown(0x{byte:02X})");
        return offset + 1;
    };

    let width = op.operand_width();
    if width == 0 {
        let _ = writeln!(out, "{}", op.mnemonic());
        return offset + 1;
    }

    if offset + width >= chunk.len() {
        let _ = writeln!(out, "{} <truncated operand>", op.mnemonic());
        return chunk.len();
    }

    let index = match op {
        OpCode::Constant => u32::from(chunk.code()[offset + 1]),
        _ => {
            let code = chunk.code();
            decode_long_index([code[offset + 1], code[offset + 2], code[offset + 3]])
        }
    };

    match chunk.constants().get(index) {
        Some(value) => {
            let _ = writeln!(out, "{:<16} {index:4} '{value}'", op.mnemonic());
        }
        None => {
            let _ = writeln!(out, "{:<16} {index:4} <invalid>", op.mnemonic());
        }
    }
    offset + 1 + width
}

/* ─────────────────────────── Tests ─────────────────────────── */
