use core::fmt;

use crate::op::ValueKind;

/// A decoded instruction with all operands resolved to their widest types.
///
/// Local indices are always `u16` regardless of whether the instruction
/// was encoded in narrow or wide form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    IConst {
        value: i8,
    },
    Ldc {
        idx: u16,
    },
    Load {
        kind: ValueKind,
        slot: u16,
    },
    Store {
        kind: ValueKind,
        slot: u16,
    },
    LCmp,
    FCmpL,
    DCmpL,
    IfNe {
        offset: i16,
    },
    IfICmpNe {
        offset: i16,
    },
    Goto {
        offset: i16,
    },
    /// Typed return; `None` is a `void` return.
    Return {
        kind: Option<ValueKind>,
    },
    InvokeVirtual {
        method_idx: u16,
    },
    InvokeStatic {
        method_idx: u16,
    },
}

impl Instruction {
    /// Constant pool index referenced by this instruction, if any.
    pub fn constant_index(&self) -> Option<u16> {
        match *self {
            Self::Ldc { idx } => Some(idx),
            Self::InvokeVirtual { method_idx }
            | Self::InvokeStatic { method_idx } => Some(method_idx),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IConst { value } => write!(f, "iconst_{value}"),
            Self::Ldc { idx } => write!(f, "ldc #{idx}"),
            Self::Load { kind, slot } => {
                write!(f, "{}load {slot}", kind.prefix())
            }
            Self::Store { kind, slot } => {
                write!(f, "{}store {slot}", kind.prefix())
            }
            Self::LCmp => write!(f, "lcmp"),
            Self::FCmpL => write!(f, "fcmpl"),
            Self::DCmpL => write!(f, "dcmpl"),
            Self::IfNe { offset } => write!(f, "ifne {offset:+}"),
            Self::IfICmpNe { offset } => write!(f, "if_icmpne {offset:+}"),
            Self::Goto { offset } => write!(f, "goto {offset:+}"),
            Self::Return { kind: Some(kind) } => {
                write!(f, "{}return", kind.prefix())
            }
            Self::Return { kind: None } => write!(f, "return"),
            Self::InvokeVirtual { method_idx } => {
                write!(f, "invokevirtual #{method_idx}")
            }
            Self::InvokeStatic { method_idx } => {
                write!(f, "invokestatic #{method_idx}")
            }
        }
    }
}
