/// JVM opcodes used by synthesized experiment methods.
///
/// Local-variable operands are 8-bit by default. The [`Wide`](Op::Wide)
/// prefix promotes them to 16-bit. Constant pool indices are 8-bit for
/// [`Ldc`](Op::Ldc) and 16-bit everywhere else. Branch offsets are signed
/// 16-bit and relative to the start of the branch instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Push int constant `0`.
    IConst0 = 0x03,
    /// Push int constant `1`.
    IConst1 = 0x04,

    /// Push a constant pool entry.
    /// Operands: `idx:u8`
    Ldc = 0x12,
    /// Push a constant pool entry.
    /// Operands: `idx:u16`
    LdcW = 0x13,

    /// Load a local. Operands: `slot:u8` (wide: `u16`)
    ILoad = 0x15,
    LLoad = 0x16,
    FLoad = 0x17,
    DLoad = 0x18,
    ALoad = 0x19,

    /// Store into a local. Operands: `slot:u8` (wide: `u16`)
    IStore = 0x36,
    LStore = 0x37,
    FStore = 0x38,
    DStore = 0x39,
    AStore = 0x3a,

    /// Compare two longs, pushing `-1`, `0` or `1`.
    LCmp = 0x94,
    /// Compare two floats, `NaN` yields `-1`.
    FCmpL = 0x95,
    /// Compare two doubles, `NaN` yields `-1`.
    DCmpL = 0x97,

    /// Branch if the int on top of the stack is non-zero.
    /// Operands: `offset:i16`
    IfNe = 0x9a,
    /// Branch if the two ints on top of the stack differ.
    /// Operands: `offset:i16`
    IfICmpNe = 0xa0,
    /// Unconditional branch.
    /// Operands: `offset:i16`
    Goto = 0xa7,

    IReturn = 0xac,
    LReturn = 0xad,
    FReturn = 0xae,
    DReturn = 0xaf,
    AReturn = 0xb0,
    /// Return from a `void` method.
    Return = 0xb1,

    /// Operands: `method_ref:u16`
    InvokeVirtual = 0xb6,
    /// Operands: `method_ref:u16`
    InvokeStatic = 0xb8,

    /// Prefix: the next load/store uses a 16-bit local index.
    Wide = 0xc4,
}

/// The JVM computational type an instruction operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    /// Number of local/operand-stack slots a value of this kind occupies.
    pub const fn width(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    /// The mnemonic prefix (`i`, `l`, `f`, `d`, `a`).
    pub const fn prefix(self) -> char {
        match self {
            ValueKind::Int => 'i',
            ValueKind::Long => 'l',
            ValueKind::Float => 'f',
            ValueKind::Double => 'd',
            ValueKind::Reference => 'a',
        }
    }
}

impl Op {
    pub const fn load(kind: ValueKind) -> Op {
        match kind {
            ValueKind::Int => Op::ILoad,
            ValueKind::Long => Op::LLoad,
            ValueKind::Float => Op::FLoad,
            ValueKind::Double => Op::DLoad,
            ValueKind::Reference => Op::ALoad,
        }
    }

    pub const fn store(kind: ValueKind) -> Op {
        match kind {
            ValueKind::Int => Op::IStore,
            ValueKind::Long => Op::LStore,
            ValueKind::Float => Op::FStore,
            ValueKind::Double => Op::DStore,
            ValueKind::Reference => Op::AStore,
        }
    }

    /// The typed return for `kind`, or plain [`Return`](Op::Return) for `void`.
    pub const fn return_for(kind: Option<ValueKind>) -> Op {
        match kind {
            Some(ValueKind::Int) => Op::IReturn,
            Some(ValueKind::Long) => Op::LReturn,
            Some(ValueKind::Float) => Op::FReturn,
            Some(ValueKind::Double) => Op::DReturn,
            Some(ValueKind::Reference) => Op::AReturn,
            None => Op::Return,
        }
    }

    pub const fn is_load(self) -> bool {
        matches!(self, Op::ILoad | Op::LLoad | Op::FLoad | Op::DLoad | Op::ALoad)
    }

    pub const fn is_store(self) -> bool {
        matches!(
            self,
            Op::IStore | Op::LStore | Op::FStore | Op::DStore | Op::AStore
        )
    }

    pub const fn is_return(self) -> bool {
        matches!(
            self,
            Op::IReturn
                | Op::LReturn
                | Op::FReturn
                | Op::DReturn
                | Op::AReturn
                | Op::Return
        )
    }

    pub const fn is_invoke(self) -> bool {
        matches!(self, Op::InvokeVirtual | Op::InvokeStatic)
    }

    /// The value kind moved by a load, store or typed return.
    pub const fn value_kind(self) -> Option<ValueKind> {
        match self {
            Op::ILoad | Op::IStore | Op::IReturn => Some(ValueKind::Int),
            Op::LLoad | Op::LStore | Op::LReturn => Some(ValueKind::Long),
            Op::FLoad | Op::FStore | Op::FReturn => Some(ValueKind::Float),
            Op::DLoad | Op::DStore | Op::DReturn => Some(ValueKind::Double),
            Op::ALoad | Op::AStore | Op::AReturn => Some(ValueKind::Reference),
            _ => None,
        }
    }

    /// Whether this opcode has a local index affected by the `Wide` prefix.
    pub const fn has_scalable_operands(self) -> bool {
        self.is_load() || self.is_store()
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::IConst0 => "iconst_0",
            Op::IConst1 => "iconst_1",
            Op::Ldc => "ldc",
            Op::LdcW => "ldc_w",
            Op::ILoad => "iload",
            Op::LLoad => "lload",
            Op::FLoad => "fload",
            Op::DLoad => "dload",
            Op::ALoad => "aload",
            Op::IStore => "istore",
            Op::LStore => "lstore",
            Op::FStore => "fstore",
            Op::DStore => "dstore",
            Op::AStore => "astore",
            Op::LCmp => "lcmp",
            Op::FCmpL => "fcmpl",
            Op::DCmpL => "dcmpl",
            Op::IfNe => "ifne",
            Op::IfICmpNe => "if_icmpne",
            Op::Goto => "goto",
            Op::IReturn => "ireturn",
            Op::LReturn => "lreturn",
            Op::FReturn => "freturn",
            Op::DReturn => "dreturn",
            Op::AReturn => "areturn",
            Op::Return => "return",
            Op::InvokeVirtual => "invokevirtual",
            Op::InvokeStatic => "invokestatic",
            Op::Wide => "wide",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        let op = match byte {
            0x03 => Op::IConst0,
            0x04 => Op::IConst1,
            0x12 => Op::Ldc,
            0x13 => Op::LdcW,
            0x15 => Op::ILoad,
            0x16 => Op::LLoad,
            0x17 => Op::FLoad,
            0x18 => Op::DLoad,
            0x19 => Op::ALoad,
            0x36 => Op::IStore,
            0x37 => Op::LStore,
            0x38 => Op::FStore,
            0x39 => Op::DStore,
            0x3a => Op::AStore,
            0x94 => Op::LCmp,
            0x95 => Op::FCmpL,
            0x97 => Op::DCmpL,
            0x9a => Op::IfNe,
            0xa0 => Op::IfICmpNe,
            0xa7 => Op::Goto,
            0xac => Op::IReturn,
            0xad => Op::LReturn,
            0xae => Op::FReturn,
            0xaf => Op::DReturn,
            0xb0 => Op::AReturn,
            0xb1 => Op::Return,
            0xb6 => Op::InvokeVirtual,
            0xb8 => Op::InvokeStatic,
            0xc4 => Op::Wide,
            _ => return Err(byte),
        };
        Ok(op)
    }
}

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Method access flags (JVMS §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const SYNTHETIC: AccessFlags = AccessFlags(0x1000);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | other.0)
    }

    pub const fn difference(self, other: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 & !other.0)
    }
}

impl core::ops::BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        self.union(rhs)
    }
}

impl core::fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        const NAMES: [(AccessFlags, &str); 5] = [
            (AccessFlags::PUBLIC, "public"),
            (AccessFlags::PRIVATE, "private"),
            (AccessFlags::STATIC, "static"),
            (AccessFlags::FINAL, "final"),
            (AccessFlags::SYNTHETIC, "synthetic"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
