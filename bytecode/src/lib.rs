mod builder;
mod constant_pool;
mod decoder;
mod instruction;
mod op;

pub use builder::{BytecodeBuilder, Label};
pub use constant_pool::{Constant, ConstantPool, MethodRef, PoolOverflow};
pub use decoder::{BytecodeDecoder, DecodeError};
pub use instruction::Instruction;
pub use op::{AccessFlags, Op, ValueKind};
