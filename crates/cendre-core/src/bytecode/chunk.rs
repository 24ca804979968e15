//! Core chunk structures: instruction stream, constant pool, line table.
//!
//! A chunk is built append-only by the compiler, then handed by value to its
//! consumer. Constant references are encoded in a narrow (1-byte) or wide
//! (3-byte little-endian) operand form depending on the index.

use crate::{ChunkError, ChunkResult, GrowArray, Value};

use core::{ops::Range, slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest constant index the narrow (`Constant`) operand form can address.
pub const MAX_SHORT_CONSTANT: u32 = u8::MAX as u32;

/// Largest constant index the wide (`ConstantLong`) operand form can address.
pub const MAX_LONG_CONSTANT: u32 = (1 << 24) - 1;

/* ─────────────────────────── OpCode ─────────────────────────── */

/// Single-byte instruction tags.
///
/// The chunk treats these as opaque: operand counts matter for encoding and
/// disassembly, execution semantics belong to the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum OpCode {
    /// Push the constant at a 1-byte pool index.
    Constant = 0x00,
    /// Push the constant at a 3-byte little-endian pool index.
    ConstantLong = 0x01,
    /// Add the two topmost stack values.
    Add = 0x02,
    /// Subtract the top stack value from the one beneath it.
    Subtract = 0x03,
    /// Multiply the two topmost stack values.
    Multiply = 0x04,
    /// Divide the second stack value by the topmost.
    Divide = 0x05,
    /// Negate the top stack value.
    Negate = 0x06,
    /// Return from the current chunk.
    Return = 0x07,
}

impl OpCode {
    /// Encoded byte for this opcode.
    pub const fn to_byte(self) -> u8 { self as u8 }

    /// Decode a byte back to an opcode, if it is part of the alphabet.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b if b == OpCode::Constant as u8 => Some(OpCode::Constant),
            b if b == OpCode::ConstantLong as u8 => Some(OpCode::ConstantLong),
            b if b == OpCode::Add as u8 => Some(OpCode::Add),
            b if b == OpCode::Subtract as u8 => Some(OpCode::Subtract),
            b if b == OpCode::Multiply as u8 => Some(OpCode::Multiply),
            b if b == OpCode::Divide as u8 => Some(OpCode::Divide),
            b if b == OpCode::Negate as u8 => Some(OpCode::Negate),
            b if b == OpCode::Return as u8 => Some(OpCode::Return),
            _ => None,
        }
    }

    /// Number of operand bytes following the opcode byte.
    pub const fn operand_width(self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantLong => 3,
            _ => 0,
        }
    }

    /// Printable name used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantLong => "CONSTANT_LONG",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Negate => "NEGATE",
            OpCode::Return => "RETURN",
        }
    }
}

/* ─────────────────────────── Wide operand codec ─────────────────────────── */

/// Encode a constant index into the wide 3-byte little-endian operand.
pub const fn encode_long_index(index: u32) -> [u8; 3] {
    let [a, b, c, _] = index.to_le_bytes();
    [a, b, c]
}

/// Decode the wide 3-byte little-endian operand back to a constant index.
pub const fn decode_long_index(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Operand form a constant index is encoded with, if it is addressable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantForm {
    /// 1-byte operand (`Constant`).
    Short,
    /// 3-byte operand (`ConstantLong`).
    Long,
}

/// Pick the operand form for a constant index. `None` means the index is
/// beyond what even the wide form can address.
pub const fn constant_form(index: u32) -> Option<ConstantForm> {
    if index <= MAX_SHORT_CONSTANT {
        Some(ConstantForm::Short)
    } else if index <= MAX_LONG_CONSTANT {
        Some(ConstantForm::Long)
    } else {
        None
    }
}

/* ─────────────────────────── ConstPool ─────────────────────────── */

/// Constant pool with stable indices (0-based).
///
/// Re-adding an equal value yields a fresh index; nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct ConstPool {
    values: GrowArray<Value>,
}

impl ConstPool {
    /// Create an empty pool.
    pub const fn new() -> Self { Self { values: GrowArray::new() } }

    /// Number of stored constants.
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Iterate as `(index, Value)`.
    pub fn iter(&self) -> ConstIter<'_> { ConstIter { inner: self.values.as_slice().iter().enumerate() } }

    /// Appends a value and returns its index.
    pub fn add(&mut self, value: Value) -> ChunkResult<u32> {
        let index = self.values.push(value)?;
        Ok(index as u32)
    }

    /// Lookup a constant by index. Values are handed back by copy.
    pub fn get(&self, index: u32) -> Option<Value> { self.values.get(index as usize).copied() }
}

/// Iterator returned by [`ConstPool::iter`].
pub struct ConstIter<'a> {
    inner: core::iter::Enumerate<slice::Iter<'a, Value>>,
}

impl<'a> Iterator for ConstIter<'a> {
    type Item = (u32, Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(index, value)| (index as u32, *value))
    }
}

impl<'a> IntoIterator for &'a ConstPool {
    type Item = (u32, Value);
    type IntoIter = ConstIter<'a>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

/* ─────────────────────────── LineTable ─────────────────────────── */

/// One run of consecutive instruction-stream bytes sharing a source line.
#[derive(Debug, Clone, Copy)]
struct LineRun {
    start: u32,
    line: u32,
}

/// Offset → source line map, run-length encoded.
///
/// One entry is recorded per instruction-stream byte, so the operand bytes of
/// a multi-byte instruction share their opcode's line. Runs are keyed by
/// starting offset; lookup is a binary search.
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    runs: GrowArray<LineRun>,
    len: u32,
}

impl LineTable {
    /// Create an empty line table.
    pub const fn new() -> Self { Self { runs: GrowArray::new(), len: 0 } }

    /// Number of instruction-stream bytes covered.
    pub const fn len(&self) -> u32 { self.len }

    /// Whether nothing has been recorded yet.
    pub const fn is_empty(&self) -> bool { self.len == 0 }

    /// Record the source line of the next instruction-stream byte.
    pub fn record(&mut self, line: u32) -> ChunkResult<()> {
        let extends_last = self.runs.as_slice().last().is_some_and(|run| run.line == line);
        if !extends_last {
            self.runs.push(LineRun { start: self.len, line })?;
        }
        self.len += 1;
        Ok(())
    }

    /// Resolve the source line of an instruction-stream byte offset.
    pub fn line_for(&self, offset: u32) -> Option<u32> {
        if offset >= self.len {
            return None;
        }
        let runs = self.runs.as_slice();
        let idx = runs.partition_point(|run| run.start <= offset);
        Some(runs[idx - 1].line)
    }

    /// Iterate over contiguous ranges of the same line number.
    pub fn iter_ranges(&self) -> LineRangeIter<'_> {
        LineRangeIter { runs: self.runs.as_slice(), len: self.len, index: 0 }
    }
}

/// Iterator yielding contiguous line ranges `(start..end, line)`.
pub struct LineRangeIter<'a> {
    runs: &'a [LineRun],
    len: u32,
    index: usize,
}

impl<'a> Iterator for LineRangeIter<'a> {
    type Item = (Range<u32>, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.get(self.index)?;
        let end = self.runs.get(self.index + 1).map_or(self.len, |next| next.start);
        self.index += 1;
        Some((run.start..end, run.line))
    }
}

/* ─────────────────────────── Chunk ─────────────────────────── */

/// Bytecode chunk: instruction stream, constant pool and line table.
///
/// Exclusive owner of all three buffers. Construction goes through `&mut self`
/// appends; hand-off to the VM or disassembler moves the chunk (or lends
/// `&self`), so readers and the writer are statically exclusive. Dropping the
/// chunk releases everything.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: GrowArray<u8>,
    constants: ConstPool,
    lines: LineTable,
}

impl Chunk {
    /// Create an empty chunk.
    pub const fn new() -> Self {
        Self { code: GrowArray::new(), constants: ConstPool::new(), lines: LineTable::new() }
    }

    /// Instruction stream length in bytes.
    pub fn len(&self) -> usize { self.code.len() }

    /// Whether no instruction has been written yet.
    pub fn is_empty(&self) -> bool { self.code.is_empty() }

    /// Read-only view of the instruction stream.
    pub fn code(&self) -> &[u8] { self.code.as_slice() }

    /// Single instruction-stream byte, if the offset is in range.
    pub fn byte(&self, offset: usize) -> Option<u8> { self.code.get(offset).copied() }

    /// The chunk's constant pool.
    pub const fn constants(&self) -> &ConstPool { &self.constants }

    /// The chunk's line table.
    pub const fn lines(&self) -> &LineTable { &self.lines }

    /// Source line of the instruction-stream byte at `offset`.
    pub fn line_for(&self, offset: u32) -> Option<u32> { self.lines.line_for(offset) }

    /// Append one opcode byte, recording its source line.
    pub fn write(&mut self, op: OpCode, line: u32) -> ChunkResult<()> {
        self.write_byte(op.to_byte(), line)
    }

    /// Append one raw byte (an operand), recording its source line.
    pub fn write_byte(&mut self, byte: u8, line: u32) -> ChunkResult<()> {
        self.code.push(byte)?;
        self.lines.record(line)
    }

    /// Append a constant to the pool and return its index. Touches neither
    /// the instruction stream nor the line table.
    pub fn add_constant(&mut self, value: Value) -> ChunkResult<u32> {
        self.constants.add(value)
    }

    /// Append a constant and emit the instruction loading it, choosing the
    /// narrow or wide operand form from the new index.
    ///
    /// Every byte of the emitted instruction records the same `line`. If the
    /// index would not fit even the wide form, fails with
    /// [`ChunkError::TooManyConstants`] and leaves the chunk untouched.
    pub fn write_constant(&mut self, value: Value, line: u32) -> ChunkResult<u32> {
        let next = self.constants.len();
        let form = match u32::try_from(next).ok().and_then(constant_form) {
            Some(form) => form,
            None => return Err(ChunkError::TooManyConstants { index: next as u32 }),
        };
        let index = self.constants.add(value)?;
        match form {
            ConstantForm::Short => {
                self.write(OpCode::Constant, line)?;
                self.write_byte(index as u8, line)?;
            }
            ConstantForm::Long => {
                self.write(OpCode::ConstantLong, line)?;
                for byte in encode_long_index(index) {
                    self.write_byte(byte, line)?;
                }
            }
        }
        Ok(index)
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn opcode_bytes_roundtrip() {
        let all = [
            OpCode::Constant,
            OpCode::ConstantLong,
            OpCode::Add,
            OpCode::Subtract,
            OpCode::Multiply,
            OpCode::Divide,
            OpCode::Negate,
            OpCode::Return,
        ];
        for op in all {
            assert_eq!(OpCode::from_byte(op.to_byte()), Some(op));
        }
        assert_eq!(OpCode::from_byte(0x08), None);
        assert_eq!(OpCode::from_byte(0xFF), None);
    }

    #[test]
    fn write_records_opcode_and_line() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        chunk.write(OpCode::Return, 123)?;
        assert_eq!(chunk.code(), &[OpCode::Return.to_byte()]);
        assert_eq!(chunk.line_for(0), Some(123));
        assert_eq!(chunk.line_for(1), None);
        Ok(())
    }

    #[test]
    fn equal_constants_get_fresh_indices() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.add_constant(Value::new(1.0))?, 0);
        assert_eq!(chunk.add_constant(Value::new(1.0))?, 1);
        assert_eq!(chunk.add_constant(Value::new(1.0))?, 2);
        assert_eq!(chunk.constants().len(), 3);
        assert!(chunk.is_empty(), "add_constant must not emit code");
        Ok(())
    }

    #[test]
    fn narrow_constant_emits_two_bytes() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        let index = chunk.write_constant(Value::new(2.5), 7)?;
        assert_eq!(index, 0);
        assert_eq!(chunk.code(), &[OpCode::Constant.to_byte(), 0]);
        assert_eq!(chunk.constants().get(0), Some(Value::new(2.5)));
        Ok(())
    }

    #[test]
    fn wide_constant_emits_four_bytes_sharing_the_line() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        for i in 0..=MAX_SHORT_CONSTANT {
            chunk.add_constant(Value::new(f64::from(i)))?;
        }
        let start = chunk.len();
        let index = chunk.write_constant(Value::new(-1.0), 42)?;
        assert_eq!(index, 256);
        assert_eq!(
            &chunk.code()[start..],
            &[OpCode::ConstantLong.to_byte(), 0x00, 0x01, 0x00]
        );
        for offset in start..chunk.len() {
            assert_eq!(chunk.line_for(offset as u32), Some(42));
        }
        Ok(())
    }

    #[test]
    fn form_switches_exactly_at_the_narrow_limit() {
        assert_eq!(constant_form(0), Some(ConstantForm::Short));
        assert_eq!(constant_form(MAX_SHORT_CONSTANT), Some(ConstantForm::Short));
        assert_eq!(constant_form(MAX_SHORT_CONSTANT + 1), Some(ConstantForm::Long));
        assert_eq!(constant_form(MAX_LONG_CONSTANT), Some(ConstantForm::Long));
        assert_eq!(constant_form(MAX_LONG_CONSTANT + 1), None);
    }

    #[test]
    fn three_hundred_constants_then_return() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        for i in 0..300 {
            chunk.write_constant(Value::new(f64::from(i)), 0)?;
        }
        chunk.write(OpCode::Return, 0)?;

        assert_eq!(chunk.constants().len(), 300);
        assert_eq!(chunk.len(), 256 * 2 + 44 * 4 + 1);
        // First instruction: narrow form of index 0.
        assert_eq!(&chunk.code()[..2], &[OpCode::Constant.to_byte(), 0]);
        // First wide instruction sits right after the 256 narrow ones.
        assert_eq!(
            &chunk.code()[512..516],
            &[OpCode::ConstantLong.to_byte(), 0x00, 0x01, 0x00]
        );
        for offset in 0..chunk.len() {
            assert_eq!(chunk.line_for(offset as u32), Some(0));
        }
        Ok(())
    }

    #[test]
    fn line_table_runs_follow_instruction_lines() -> ChunkResult<()> {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::new(1.0), 1)?;
        chunk.write(OpCode::Negate, 1)?;
        chunk.write(OpCode::Return, 2)?;

        assert_eq!(chunk.line_for(0), Some(1));
        assert_eq!(chunk.line_for(1), Some(1));
        assert_eq!(chunk.line_for(2), Some(1));
        assert_eq!(chunk.line_for(3), Some(2));

        let ranges: Vec<_> = chunk.lines().iter_ranges().collect();
        assert_eq!(ranges, vec![(0..3, 1), (3..4, 2)]);
        Ok(())
    }

    #[test]
    fn const_pool_iterates_in_insertion_order() -> ChunkResult<()> {
        let mut pool = ConstPool::new();
        pool.add(Value::new(1.0))?;
        pool.add(Value::new(2.0))?;
        let collected: Vec<_> = (&pool).into_iter().collect();
        assert_eq!(collected, vec![(0, Value::new(1.0)), (1, Value::new(2.0))]);
        Ok(())
    }

    proptest! {
        #[test]
        fn long_operand_roundtrips(index in 0u32..=MAX_LONG_CONSTANT) {
            prop_assert_eq!(decode_long_index(encode_long_index(index)), index);
        }

        #[test]
        fn constant_indices_are_dense(values in proptest::collection::vec(-1e9f64..1e9, 1..64)) {
            let mut chunk = Chunk::new();
            for (i, v) in values.iter().enumerate() {
                prop_assert_eq!(chunk.add_constant(Value::new(*v)).unwrap(), i as u32);
            }
        }

        #[test]
        fn every_emitted_byte_resolves_to_its_line(lines in proptest::collection::vec(1u32..10_000, 1..32)) {
            let mut chunk = Chunk::new();
            let mut expected = Vec::new();
            for (i, &line) in lines.iter().enumerate() {
                if i % 2 == 0 {
                    chunk.write_constant(Value::new(i as f64), line).unwrap();
                    expected.extend([line, line]);
                } else {
                    chunk.write(OpCode::Add, line).unwrap();
                    expected.push(line);
                }
            }
            for (offset, &line) in expected.iter().enumerate() {
                prop_assert_eq!(chunk.line_for(offset as u32), Some(line));
            }
            prop_assert_eq!(chunk.lines().len(), expected.len() as u32);
        }
    }
}
