use std::fmt;

use bytecode::{Op, ValueKind};

/// Element type of an array, or the type behind a non-array tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int32,
    Int64,
    Float32,
    Float64,
    Reference,
}

impl BaseType {
    pub const fn value_kind(self) -> ValueKind {
        match self {
            BaseType::Int32 => ValueKind::Int,
            BaseType::Int64 => ValueKind::Long,
            BaseType::Float32 => ValueKind::Float,
            BaseType::Float64 => ValueKind::Double,
            BaseType::Reference => ValueKind::Reference,
        }
    }

    /// Maps a field type code to its base type. `Z`, `B`, `C` and `S` share
    /// the int computational type with `I`.
    pub const fn from_code(code: u8) -> Option<BaseType> {
        match code {
            b'Z' | b'B' | b'C' | b'S' | b'I' => Some(BaseType::Int32),
            b'J' => Some(BaseType::Int64),
            b'F' => Some(BaseType::Float32),
            b'D' => Some(BaseType::Float64),
            b'L' => Some(BaseType::Reference),
            _ => None,
        }
    }
}

/// Type classification of a parameter or return slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int32,
    Int64,
    Float32,
    Float64,
    Reference,
    Array { depth: u8, element: BaseType },
    Void,
}

impl TypeTag {
    /// Builds the tag for a base type nested in `depth` array dimensions.
    pub const fn new(base: BaseType, depth: u8) -> TypeTag {
        if depth > 0 {
            return TypeTag::Array {
                depth,
                element: base,
            };
        }
        match base {
            BaseType::Int32 => TypeTag::Int32,
            BaseType::Int64 => TypeTag::Int64,
            BaseType::Float32 => TypeTag::Float32,
            BaseType::Float64 => TypeTag::Float64,
            BaseType::Reference => TypeTag::Reference,
        }
    }

    /// Local-variable slots occupied by a value of this type. `Void` has no
    /// value and occupies none.
    pub const fn width(self) -> u16 {
        match self {
            TypeTag::Int64 | TypeTag::Float64 => 2,
            TypeTag::Void => 0,
            _ => 1,
        }
    }

    /// The JVM computational type; arrays are references.
    pub const fn value_kind(self) -> Option<ValueKind> {
        match self {
            TypeTag::Int32 => Some(ValueKind::Int),
            TypeTag::Int64 => Some(ValueKind::Long),
            TypeTag::Float32 => Some(ValueKind::Float),
            TypeTag::Float64 => Some(ValueKind::Double),
            TypeTag::Reference | TypeTag::Array { .. } => {
                Some(ValueKind::Reference)
            }
            TypeTag::Void => None,
        }
    }

    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            TypeTag::Int32 | TypeTag::Int64 | TypeTag::Float32 | TypeTag::Float64
        )
    }

    pub const fn is_reference(self) -> bool {
        matches!(self, TypeTag::Reference | TypeTag::Array { .. })
    }

    pub const fn array_depth(self) -> u8 {
        match self {
            TypeTag::Array { depth, .. } => depth,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Store,
    Return,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Load => write!(f, "load"),
            Operation::Store => write!(f, "store"),
            Operation::Return => write!(f, "return"),
        }
    }
}

/// An instruction was requested for a type that has none in that position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOperation {
    pub operation: Operation,
    pub field_type: String,
}

impl fmt::Display for InvalidOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no {} instruction exists for type `{}`",
            self.operation, self.field_type
        )
    }
}

impl std::error::Error for InvalidOperation {}

/// One formal parameter, or the return slot, of a [`Descriptor`].
///
/// Instruction selection is a pure function of [`TypeTag`]; the textual
/// field type (`I`, `[[J`, `Ljava/lang/String;`) is kept for diagnostics and
/// for building call descriptors.
///
/// [`Descriptor`]: crate::Descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    tag: TypeTag,
    slot: u16,
    field_type: String,
}

impl Param {
    pub fn new(tag: TypeTag, slot: u16, field_type: impl Into<String>) -> Self {
        Self {
            tag,
            slot,
            field_type: field_type.into(),
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Local slot relative to the first parameter. Meaningless for the
    /// return slot, which is always `0`.
    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn width(&self) -> u16 {
        self.tag.width()
    }

    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    pub fn is_void(&self) -> bool {
        self.tag == TypeTag::Void
    }

    pub fn load_op(&self) -> Result<Op, InvalidOperation> {
        self.tag
            .value_kind()
            .map(Op::load)
            .ok_or_else(|| self.invalid(Operation::Load))
    }

    pub fn store_op(&self) -> Result<Op, InvalidOperation> {
        self.tag
            .value_kind()
            .map(Op::store)
            .ok_or_else(|| self.invalid(Operation::Store))
    }

    /// Every type can be returned; `Void` uses the plain `return`.
    pub fn return_op(&self) -> Op {
        Op::return_for(self.tag.value_kind())
    }

    fn invalid(&self, operation: Operation) -> InvalidOperation {
        InvalidOperation {
            operation,
            field_type: self.field_type.clone(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field_type)
    }
}
