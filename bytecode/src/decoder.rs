use core::fmt;

use crate::instruction::Instruction;
use crate::op::Op;

/// Malformed bytecode encountered while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte at `offset` is not an opcode this decoder understands.
    UnknownOpcode { offset: usize, byte: u8 },
    /// `wide` was followed by an opcode without a local index.
    InvalidWide { offset: usize, op: Op },
    /// The stream ended in the middle of an instruction.
    Truncated { offset: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { offset, byte } => {
                write!(f, "unknown opcode 0x{byte:02x} at {offset}")
            }
            Self::InvalidWide { offset, op } => {
                write!(f, "`wide` cannot prefix {op} at {offset}")
            }
            Self::Truncated { offset } => {
                write!(f, "truncated instruction at {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Unlike the builder, the decoder does not trust its input: anything it
/// cannot decode is reported as a [`DecodeError`] and ends iteration.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether the decoder has reached the end of the bytecode.
    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    pub fn decode_next(&mut self) -> Option<Result<Instruction, DecodeError>> {
        if self.is_at_end() || self.failed {
            return None;
        }
        let result = self.decode();
        self.failed = result.is_err();
        Some(result)
    }

    fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let start = self.pos;
        let byte = self.read_u8()?;
        let op = Op::try_from(byte)
            .map_err(|byte| DecodeError::UnknownOpcode { offset: start, byte })?;

        if op == Op::Wide {
            let next_byte = self.read_u8()?;
            let next = Op::try_from(next_byte).map_err(|byte| {
                DecodeError::UnknownOpcode {
                    offset: start + 1,
                    byte,
                }
            })?;
            if !next.has_scalable_operands() {
                return Err(DecodeError::InvalidWide {
                    offset: start,
                    op: next,
                });
            }
            return self.decode_op(next, true);
        }
        self.decode_op(op, false)
    }

    fn decode_op(&mut self, op: Op, wide: bool) -> Result<Instruction, DecodeError> {
        let instruction = match op {
            Op::IConst0 => Instruction::IConst { value: 0 },
            Op::IConst1 => Instruction::IConst { value: 1 },
            Op::Ldc => Instruction::Ldc {
                idx: self.read_u8()? as u16,
            },
            Op::LdcW => Instruction::Ldc {
                idx: self.read_u16()?,
            },
            Op::ILoad
            | Op::LLoad
            | Op::FLoad
            | Op::DLoad
            | Op::ALoad
            | Op::IStore
            | Op::LStore
            | Op::FStore
            | Op::DStore
            | Op::AStore => {
                let at = self.pos - 1;
                let Some(kind) = op.value_kind() else {
                    return Err(DecodeError::UnknownOpcode {
                        offset: at,
                        byte: op as u8,
                    });
                };
                let slot = self.read_local(wide)?;
                if op.is_load() {
                    Instruction::Load { kind, slot }
                } else {
                    Instruction::Store { kind, slot }
                }
            }
            Op::LCmp => Instruction::LCmp,
            Op::FCmpL => Instruction::FCmpL,
            Op::DCmpL => Instruction::DCmpL,
            Op::IfNe => Instruction::IfNe {
                offset: self.read_i16()?,
            },
            Op::IfICmpNe => Instruction::IfICmpNe {
                offset: self.read_i16()?,
            },
            Op::Goto => Instruction::Goto {
                offset: self.read_i16()?,
            },
            Op::IReturn
            | Op::LReturn
            | Op::FReturn
            | Op::DReturn
            | Op::AReturn
            | Op::Return => Instruction::Return {
                kind: op.value_kind(),
            },
            Op::InvokeVirtual => Instruction::InvokeVirtual {
                method_idx: self.read_u16()?,
            },
            Op::InvokeStatic => Instruction::InvokeStatic {
                method_idx: self.read_u16()?,
            },
            Op::Wide => {
                return Err(DecodeError::InvalidWide {
                    offset: self.pos - 1,
                    op,
                });
            }
        };
        Ok(instruction)
    }

    fn read_local(&mut self, wide: bool) -> Result<u16, DecodeError> {
        if wide {
            self.read_u16()
        } else {
            self.read_u8().map(u16::from)
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let v = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(v)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read_u16().map(|v| v as i16)
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}
