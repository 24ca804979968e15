//! Bytecode primitives (chunk structure, disassembly, validation).
//!
//! The compiler front end appends into a [`Chunk`]; the VM and the
//! disassembler read it back by offset. Everything here is append-only and
//! single-owner.

/// Chunk representation: instruction stream, constant pool, line table.
pub mod chunk;
pub mod helpers;
pub mod disasm;

pub use chunk::{
    constant_form, decode_long_index, encode_long_index, Chunk, ConstIter, ConstPool,
    ConstantForm, LineRangeIter, LineTable, OpCode, MAX_LONG_CONSTANT, MAX_SHORT_CONSTANT,
};
