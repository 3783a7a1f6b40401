//! Variable-length instruction decoder
//!
//! The decoder walks a raw method body and yields one structured
//! instruction per step. It is a finite, non-restartable iterator: a read
//! that would run past the end of the buffer truncates the stream instead
//! of yielding a partial record. Decoding never fails: bytes that do not
//! match any catalog entry come back as [`InstKind::Unknown`] with a
//! size-inferred operand tail so the walk keeps progressing.

use crate::opcodes::{
    CallRuntimeOpcode, DeprecatedOpcode, OpFlags, Opcode, OperandFormat, ThrowOpcode, WideOpcode,
    PREFIX_CALLRUNTIME, PREFIX_DEPRECATED, PREFIX_THROW, PREFIX_WIDE,
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Which namespace an instruction was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prefix {
    None,
    Wide,
    Deprecated,
    Throw,
    CallRuntime,
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::None => write!(f, "std"),
            Prefix::Wide => write!(f, "wide"),
            Prefix::Deprecated => write!(f, "deprecated"),
            Prefix::Throw => write!(f, "throw"),
            Prefix::CallRuntime => write!(f, "callruntime"),
        }
    }
}

/// A typed operand read according to the opcode's [`OperandFormat`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Imm8(u8),
    Imm16(u16),
    Imm32(u32),
    Imm64(u64),
    Reg(u16),
    StringId(u16),
    MethodId(u16),
    LiteralId(u16),
    /// Signed displacement relative to the instruction start
    Jump(i32),
}

impl Operand {
    pub fn as_reg(&self) -> Option<u16> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_imm(&self) -> Option<u64> {
        match self {
            Operand::Imm8(v) => Some(u64::from(*v)),
            Operand::Imm16(v) => Some(u64::from(*v)),
            Operand::Imm32(v) => Some(u64::from(*v)),
            Operand::Imm64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string_id(&self) -> Option<u16> {
        match self {
            Operand::StringId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_method_id(&self) -> Option<u16> {
        match self {
            Operand::MethodId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_literal_id(&self) -> Option<u16> {
        match self {
            Operand::LiteralId(id) => Some(*id),
            _ => None,
        }
    }
}

/// Namespaced opcode of a decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    Std(Opcode),
    Wide(WideOpcode),
    Deprecated(DeprecatedOpcode),
    Throw(ThrowOpcode),
    CallRuntime(CallRuntimeOpcode),
    /// Unrecognized opcode byte; operands were skipped heuristically
    Unknown { prefix: Prefix, byte: u8 },
}

impl InstKind {
    pub fn prefix(&self) -> Prefix {
        match self {
            InstKind::Std(_) => Prefix::None,
            InstKind::Wide(_) => Prefix::Wide,
            InstKind::Deprecated(_) => Prefix::Deprecated,
            InstKind::Throw(_) => Prefix::Throw,
            InstKind::CallRuntime(_) => Prefix::CallRuntime,
            InstKind::Unknown { prefix, .. } => *prefix,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::Std(op) => op.mnemonic(),
            InstKind::Wide(op) => op.mnemonic(),
            InstKind::Deprecated(op) => op.mnemonic(),
            InstKind::Throw(op) => op.mnemonic(),
            InstKind::CallRuntime(op) => op.mnemonic(),
            InstKind::Unknown { .. } => "unknown",
        }
    }

    pub fn flags(&self) -> OpFlags {
        match self {
            InstKind::Std(op) => op.flags(),
            InstKind::Wide(op) => op.flags(),
            InstKind::Deprecated(op) => op.flags(),
            InstKind::Throw(op) => op.flags(),
            InstKind::CallRuntime(op) => op.flags(),
            InstKind::Unknown { .. } => OpFlags::empty(),
        }
    }
}

/// One decoded instruction with its position and raw encoding
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    /// Byte offset of the instruction start within the method body
    pub offset: usize,
    pub kind: InstKind,
    pub operands: SmallVec<[Operand; 4]>,
    /// The exact bytes this instruction was decoded from
    pub raw: SmallVec<[u8; 10]>,
}

impl Inst {
    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Offset of the byte immediately after this instruction
    pub fn end_offset(&self) -> usize {
        self.offset + self.raw.len()
    }

    pub fn flags(&self) -> OpFlags {
        self.kind.flags()
    }

    /// Absolute jump target: instruction start plus the signed
    /// displacement. Displacements are relative to the instruction start,
    /// not to the byte after the operands.
    pub fn jump_target(&self) -> Option<i64> {
        if !self.flags().is_jump() {
            return None;
        }
        self.operands.iter().find_map(|op| match op {
            Operand::Jump(disp) => Some(self.offset as i64 + i64::from(*disp)),
            _ => None,
        })
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: {}", self.offset, self.kind.mnemonic())?;
        for (i, op) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            match op {
                Operand::Imm8(v) => write!(f, "{}{}", sep, v)?,
                Operand::Imm16(v) => write!(f, "{}{}", sep, v)?,
                Operand::Imm32(v) => write!(f, "{}{}", sep, v)?,
                Operand::Imm64(v) => write!(f, "{}{}", sep, v)?,
                Operand::Reg(r) => write!(f, "{}v{}", sep, r)?,
                Operand::StringId(id) => write!(f, "{}str_{}", sep, id)?,
                Operand::MethodId(id) => write!(f, "{}method_{}", sep, id)?,
                Operand::LiteralId(id) => write!(f, "{}lit_{}", sep, id)?,
                Operand::Jump(d) => write!(f, "{}{:+}", sep, d)?,
            }
        }
        Ok(())
    }
}

/// Streaming decoder over a raw method body
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            finished: false,
        }
    }

    /// Decode the whole body into a vector
    pub fn decode_all(bytes: &'a [u8]) -> Vec<Inst> {
        Decoder::new(bytes).collect()
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_u16(&mut self) -> Option<u16> {
        if self.remaining() < 2 {
            return None;
        }
        let v = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        Some(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + 8]);
        self.pos += 8;
        Some(u64::from_le_bytes(buf))
    }

    fn read_operands(
        &mut self,
        format: OperandFormat,
        out: &mut SmallVec<[Operand; 4]>,
    ) -> Option<()> {
        use OperandFormat as F;
        match format {
            F::None => {}
            F::Imm8 => out.push(Operand::Imm8(self.read_u8()?)),
            F::Imm16 => out.push(Operand::Imm16(self.read_u16()?)),
            F::Imm32 => out.push(Operand::Imm32(self.read_u32()?)),
            F::Imm64 => out.push(Operand::Imm64(self.read_u64()?)),
            F::Reg8 => out.push(Operand::Reg(u16::from(self.read_u8()?))),
            F::Reg16 => out.push(Operand::Reg(self.read_u16()?)),
            F::Reg8Reg8 => {
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Reg16Reg16 => {
                out.push(Operand::Reg(self.read_u16()?));
                out.push(Operand::Reg(self.read_u16()?));
            }
            F::Imm8Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Imm8Reg8Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Imm8Reg8Reg8Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                for _ in 0..3 {
                    out.push(Operand::Reg(u16::from(self.read_u8()?)));
                }
            }
            F::Imm8Reg8Reg8Reg8Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                for _ in 0..4 {
                    out.push(Operand::Reg(u16::from(self.read_u8()?)));
                }
            }
            F::Imm8Imm8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::Imm8(self.read_u8()?));
            }
            F::Imm8Imm8Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Imm16Imm16 => {
                out.push(Operand::Imm16(self.read_u16()?));
                out.push(Operand::Imm16(self.read_u16()?));
            }
            F::Imm16Reg16 => {
                out.push(Operand::Imm16(self.read_u16()?));
                out.push(Operand::Reg(self.read_u16()?));
            }
            F::StrId16 => out.push(Operand::StringId(self.read_u16()?)),
            F::Imm8StrId16 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::StringId(self.read_u16()?));
            }
            F::Imm16StrId16 => {
                out.push(Operand::Imm16(self.read_u16()?));
                out.push(Operand::StringId(self.read_u16()?));
            }
            F::Imm8StrId16Reg8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::StringId(self.read_u16()?));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Imm8StrId16Imm8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::StringId(self.read_u16()?));
                out.push(Operand::Imm8(self.read_u8()?));
            }
            F::Imm8MethodId16Imm8 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::MethodId(self.read_u16()?));
                out.push(Operand::Imm8(self.read_u8()?));
            }
            F::Imm8LitId16 => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::LiteralId(self.read_u16()?));
            }
            F::ClassDef => {
                out.push(Operand::Imm8(self.read_u8()?));
                out.push(Operand::MethodId(self.read_u16()?));
                out.push(Operand::LiteralId(self.read_u16()?));
                out.push(Operand::Imm16(self.read_u16()?));
                out.push(Operand::Reg(u16::from(self.read_u8()?)));
            }
            F::Jump8 => out.push(Operand::Jump(i32::from(self.read_u8()? as i8))),
            F::Jump16 => out.push(Operand::Jump(i32::from(self.read_u16()? as i16))),
            F::Jump32 => out.push(Operand::Jump(self.read_u32()? as i32)),
        }
        Some(())
    }

    /// Skip over operands of an unrecognized opcode: consume the largest
    /// of 1/2/4/8 bytes that still fits in the remaining buffer, so the
    /// stream keeps progressing past extensions the catalog does not know.
    fn skip_unknown_tail(&mut self) {
        let rem = self.remaining();
        let skip = if rem >= 8 {
            8
        } else if rem >= 4 {
            4
        } else if rem >= 2 {
            2
        } else {
            rem
        };
        self.pos += skip;
    }

    fn decode_one(&mut self) -> Option<Inst> {
        let start = self.pos;
        let lead = self.read_u8()?;

        let kind = match lead {
            PREFIX_WIDE => {
                let byte = self.read_u8()?;
                match WideOpcode::try_from(byte) {
                    Ok(op) => InstKind::Wide(op),
                    Err(_) => InstKind::Unknown {
                        prefix: Prefix::Wide,
                        byte,
                    },
                }
            }
            PREFIX_DEPRECATED => {
                let byte = self.read_u8()?;
                match DeprecatedOpcode::try_from(byte) {
                    Ok(op) => InstKind::Deprecated(op),
                    Err(_) => InstKind::Unknown {
                        prefix: Prefix::Deprecated,
                        byte,
                    },
                }
            }
            PREFIX_THROW => {
                let byte = self.read_u8()?;
                match ThrowOpcode::try_from(byte) {
                    Ok(op) => InstKind::Throw(op),
                    Err(_) => InstKind::Unknown {
                        prefix: Prefix::Throw,
                        byte,
                    },
                }
            }
            PREFIX_CALLRUNTIME => {
                let byte = self.read_u8()?;
                match CallRuntimeOpcode::try_from(byte) {
                    Ok(op) => InstKind::CallRuntime(op),
                    Err(_) => InstKind::Unknown {
                        prefix: Prefix::CallRuntime,
                        byte,
                    },
                }
            }
            byte => match Opcode::try_from(byte) {
                Ok(op) => InstKind::Std(op),
                Err(_) => InstKind::Unknown {
                    prefix: Prefix::None,
                    byte,
                },
            },
        };

        let mut operands = SmallVec::new();
        match kind {
            InstKind::Std(op) => self.read_operands(op.format(), &mut operands)?,
            InstKind::Wide(op) => self.read_operands(op.format(), &mut operands)?,
            InstKind::Deprecated(op) => self.read_operands(op.format(), &mut operands)?,
            InstKind::Throw(op) => self.read_operands(op.format(), &mut operands)?,
            InstKind::CallRuntime(op) => self.read_operands(op.format(), &mut operands)?,
            InstKind::Unknown { .. } => {
                log::trace!("unknown opcode at offset {}, skipping heuristic tail", start);
                self.skip_unknown_tail();
            }
        }

        let raw = SmallVec::from_slice(&self.bytes[start..self.pos]);
        Some(Inst {
            offset: start,
            kind,
            operands,
            raw,
        })
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Inst;

    fn next(&mut self) -> Option<Inst> {
        if self.finished || self.pos >= self.bytes.len() {
            return None;
        }
        match self.decode_one() {
            Some(inst) => Some(inst),
            None => {
                // A read ran past the end of the buffer; the stream is
                // truncated rather than yielding a partial record.
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_empty_body() {
        assert!(Decoder::decode_all(&[]).is_empty());
    }

    #[test]
    fn test_decode_constant_load() {
        // ldai 3 ; sta v0 ; return
        let bytes = [0x07, 3, 0, 0, 0, 0x0a, 0, 0x60];
        let insts = Decoder::decode_all(&bytes);
        assert_eq!(insts.len(), 3);
        assert_eq!(insts[0].kind, InstKind::Std(Opcode::Ldai));
        assert_eq!(insts[0].operands[0], Operand::Imm32(3));
        assert_eq!(insts[1].kind, InstKind::Std(Opcode::Sta));
        assert_eq!(insts[1].operands[0], Operand::Reg(0));
        assert_eq!(insts[1].offset, 5);
        assert_eq!(insts[2].kind, InstKind::Std(Opcode::Return));
        assert_eq!(insts[2].offset, 7);
    }

    #[test]
    fn test_prefix_namespaces() {
        let bytes = [
            PREFIX_THROW,
            0x00, // throw
            PREFIX_WIDE,
            0x01,
            0x34,
            0x12, // wide.lda v0x1234
            PREFIX_DEPRECATED,
            0x04, // deprecated.return
        ];
        let insts = Decoder::decode_all(&bytes);
        assert_eq!(insts.len(), 3);
        assert_eq!(insts[0].kind, InstKind::Throw(ThrowOpcode::Throw));
        assert_eq!(insts[1].kind, InstKind::Wide(WideOpcode::Lda));
        assert_eq!(insts[1].operands[0], Operand::Reg(0x1234));
        assert_eq!(
            insts[2].kind,
            InstKind::Deprecated(DeprecatedOpcode::Return)
        );
    }

    #[rstest]
    #[case(&[0x4d, 0x02][..], 0, 2)] // jmp +2 at offset 0
    #[case(&[0x00, 0x4d, 0xfe][..], 1, -1)] // jmp -2 at offset 1 targets -1
    fn test_signed_jump_displacement(
        #[case] bytes: &[u8],
        #[case] jump_index: usize,
        #[case] target: i64,
    ) {
        let insts = Decoder::decode_all(bytes);
        let jump = insts.iter().find(|i| i.offset == jump_index).unwrap();
        assert_eq!(jump.jump_target(), Some(target));
    }

    #[test]
    fn test_jump_target_is_relative_to_instruction_start() {
        // Padding so the jump sits at offset 10; a two-byte `jmp +2`
        // then targets offset 12, not 12 + operand size.
        let mut bytes = vec![0x00; 10];
        bytes.extend_from_slice(&[0x4d, 0x02]);
        let insts = Decoder::decode_all(&bytes);
        let jump = insts.last().unwrap();
        assert_eq!(jump.offset, 10);
        assert_eq!(jump.jump_target(), Some(12));
    }

    #[test]
    fn test_truncated_operand_ends_stream() {
        // ldai needs four immediate bytes; only two are present
        let bytes = [0x07, 1, 0];
        let insts = Decoder::decode_all(&bytes);
        assert!(insts.is_empty());
    }

    #[test]
    fn test_unknown_opcode_skips_heuristic_tail() {
        // 0xef is not in the catalog; nine remaining bytes mean an
        // eight-byte tail is consumed and decoding resumes after it.
        let mut bytes = vec![0xef];
        bytes.extend_from_slice(&[0; 8]);
        bytes.push(0x60); // return
        let insts = Decoder::decode_all(&bytes);
        assert_eq!(insts.len(), 2);
        assert!(matches!(
            insts[0].kind,
            InstKind::Unknown {
                prefix: Prefix::None,
                byte: 0xef
            }
        ));
        assert_eq!(insts[0].size(), 9);
        assert_eq!(insts[1].kind, InstKind::Std(Opcode::Return));
    }

    #[test]
    fn test_raw_bytes_concatenation_round_trip() {
        let bytes = [
            0x07, 3, 0, 0, 0, // ldai 3
            0x0a, 0, // sta v0
            0x07, 4, 0, 0, 0, // ldai 4
            0x10, 0, 0, // add2 v0
            0x60, // return
        ];
        let insts = Decoder::decode_all(&bytes);
        let concat: Vec<u8> = insts.iter().flat_map(|i| i.raw.iter().copied()).collect();
        assert_eq!(concat, bytes);
    }

    proptest! {
        /// The concatenated raw bytes of the decoded stream always equal
        /// the consumed prefix of the input buffer.
        #[test]
        fn prop_raw_bytes_are_a_prefix(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let insts = Decoder::decode_all(&bytes);
            let concat: Vec<u8> = insts.iter().flat_map(|i| i.raw.iter().copied()).collect();
            prop_assert!(concat.len() <= bytes.len());
            prop_assert_eq!(&concat[..], &bytes[..concat.len()]);
        }

        /// Offsets are strictly increasing and contiguous with sizes.
        #[test]
        fn prop_offsets_are_contiguous(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let insts = Decoder::decode_all(&bytes);
            let mut expected = 0usize;
            for inst in &insts {
                prop_assert_eq!(inst.offset, expected);
                prop_assert!(inst.size() > 0);
                expected += inst.size();
            }
        }
    }
}
