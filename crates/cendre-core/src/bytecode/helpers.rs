//! Structural validation reused by tooling.
//!
//! The chunk performs no semantic checks while the compiler appends; this
//! helper lets a consumer verify, before executing, that the stream decodes
//! cleanly and never references outside the constant pool.

use crate::{
    bytecode::chunk::{decode_long_index, Chunk, OpCode},
    ChunkError, ChunkResult,
};

#[cfg(not(feature = "std"))]
use alloc::format;

/// Basic structural validation of a chunk.
///
/// Checks that every opcode byte is part of the alphabet, that no operand
/// runs past the end of the stream, that every constant operand indexes
/// inside the pool, and that the line table covers the stream exactly.
pub fn validate_chunk(chunk: &Chunk) -> ChunkResult<()> {
    if chunk.lines().len() as usize != chunk.len() {
        return Err(ChunkError::corrupted(format!(
            "line table covers {} bytes but the stream holds {}",
            chunk.lines().len(),
            chunk.len()
        )));
    }

    let code = chunk.code();
    let const_count = chunk.constants().len();
    let mut offset = 0;
    while offset < code.len() {
        let byte = code[offset];
        let Some(op) = OpCode::from_byte(byte) else {
            return Err(ChunkError::corrupted(format!(
                "unknown opcode 0x{byte:02X} at offset {offset}"
            )));
        };

        let width = op.operand_width();
        if width > 0 && offset + width >= code.len() {
            return Err(ChunkError::corrupted(format!(
                "{} at offset {offset} is missing operand bytes",
                op.mnemonic()
            )));
        }

        let index = match op {
            OpCode::Constant => Some(u32::from(code[offset + 1])),
            OpCode::ConstantLong => {
                Some(decode_long_index([code[offset + 1], code[offset + 2], code[offset + 3]]))
            }
            _ => None,
        };
        if let Some(index) = index {
            if index as usize >= const_count {
                return Err(ChunkError::corrupted(format!(
                    "offset {offset} references const {index} but pool size is {const_count}"
                )));
            }
        }

        offset += 1 + width;
    }

    Ok(())
}

/* ─────────────────────────── Tests ─────────────────────────── */
